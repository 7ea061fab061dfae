//! Simulation snapshots saved as JSON documents
//!
//! A [`Snapshot`] carries the raw bytes of all twelve channels: the six grid
//! channels and the six particle channels. Each channel is stored with its
//! format tag and dimensions, packed at the precision the format holds
//! (bytes, binary16 or binary32 per component). Documents are written to a
//! path built from a file name template whose `{0}` is replaced by the
//! simulation name.

use super::flow_simulation::FlowSimulation;
use crate::core_types::Texel;
use crate::solver::{Channel, ChannelBuffer, ComponentKind, ParticlePool, TextureFormat};
use half::f16;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name template used when the caller has none
pub const DEFAULT_FILE_TEMPLATE: &str = "Flow{0}.json";

/// Path of a simulation's snapshot: `dir` joined with `template`, `{0}` replaced by `name`
#[must_use]
pub fn snapshot_path(dir: &Path, template: &str, name: &str) -> PathBuf {
    dir.join(template.replace("{0}", name))
}

/// Raw pixels of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureData {
    pub format: TextureFormat,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Pack a channel at its format's precision
    #[must_use]
    pub fn from_buffer(buffer: &ChannelBuffer) -> Self {
        let format = buffer.format();
        let components = format.components();
        let values = buffer
            .as_slice()
            .iter()
            .flat_map(|texel| texel.iter().copied().take(components));

        let data = match format.kind() {
            ComponentKind::Byte => values.map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8).collect(),
            ComponentKind::Half => {
                let bits: Vec<u16> = values.map(|v| f16::from_f32(v).to_bits()).collect();
                bytemuck::cast_slice(&bits).to_vec()
            }
            ComponentKind::Float => {
                let floats: Vec<f32> = values.collect();
                bytemuck::cast_slice(&floats).to_vec()
            }
        };

        Self {
            format,
            width: buffer.width(),
            height: buffer.height(),
            data,
        }
    }

    /// Whether the byte count agrees with the format and dimensions
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.width * self.height * self.format.bytes_per_texel()
    }

    /// Unpack into a channel, or `None` when the bytes disagree with the header
    #[must_use]
    pub fn to_buffer(&self) -> Option<ChannelBuffer> {
        if !self.is_consistent() {
            return None;
        }
        let values: Vec<f32> = match self.format.kind() {
            ComponentKind::Byte => self.data.iter().map(|&b| f32::from(b) / 255.0).collect(),
            ComponentKind::Half => bytemuck::pod_collect_to_vec::<u8, u16>(&self.data)
                .into_iter()
                .map(|bits| f16::from_bits(bits).to_f32())
                .collect(),
            ComponentKind::Float => bytemuck::pod_collect_to_vec::<u8, f32>(&self.data),
        };

        let components = self.format.components();
        let texels = values
            .chunks_exact(components)
            .map(|chunk| {
                let mut texel = Texel::zeros();
                for (i, v) in chunk.iter().enumerate() {
                    texel[i] = *v;
                }
                texel
            })
            .collect();
        Some(ChannelBuffer::from_texels(self.width, self.height, self.format, texels))
    }
}

/// Every channel of a simulation, grid A..F then particles A..F
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub grid: [Option<TextureData>; 6],
    pub particles: [Option<TextureData>; 6],
}

impl Snapshot {
    /// Copy the current channels; channels that do not exist stay `None`
    #[must_use]
    pub fn from_simulation(simulation: &FlowSimulation) -> Self {
        let mut snapshot = Self::default();
        if let Some(store) = simulation.store() {
            for (slot, channel) in snapshot.grid.iter_mut().zip(Channel::ALL) {
                *slot = Some(TextureData::from_buffer(store.channel(channel)));
            }
        }
        if let Some(pool) = simulation.particles() {
            for (slot, channel) in snapshot.particles.iter_mut().zip(Channel::ALL) {
                *slot = Some(TextureData::from_buffer(pool.channel(channel)));
            }
        }
        snapshot
    }

    /// Whether no channel is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grid.iter().chain(&self.particles).all(Option::is_none)
    }

    /// Write the channels into `simulation`, returning how many were restored
    ///
    /// An empty snapshot leaves the simulation untouched. Otherwise the
    /// simulation is activated if needed. Channels whose bytes disagree with
    /// their header are skipped. Every remaining channel is checked before
    /// anything is written: grid channels must match the simulation's grid and
    /// particle channels must share one `limit x 1` layout, else the whole
    /// snapshot is rejected and nothing is restored. A differing format
    /// replaces the channel in the stored format, and a differing particle
    /// count reallocates the pool.
    pub fn apply_to(&self, simulation: &mut FlowSimulation) -> usize {
        if self.is_empty() {
            return 0;
        }
        if !simulation.is_activated() && !simulation.activate() {
            warn!("Snapshot for '{}' skipped: simulation cannot activate", simulation.name());
            return 0;
        }

        let grid = decode_all(&self.grid);
        let particles = decode_all(&self.particles);
        let Some(grid_size) = simulation.store().map(|store| (store.width(), store.height())) else {
            return 0;
        };
        if let Some(problem) = layout_problem(grid_size, &grid, &particles) {
            warn!("Snapshot for '{}' rejected: {}", simulation.name(), problem);
            return 0;
        }

        if let Some((_, first)) = particles.first() {
            let limit = first.width();
            if simulation.particles().is_none_or(|pool| pool.limit() != limit) {
                let pool = simulation.store().map(|store| ParticlePool::allocate(limit, store));
                simulation.set_particles(pool);
            }
        }

        let mut restored = 0;
        let (store, pool) = simulation.parts_mut();
        if let Some(store) = store {
            for (channel, buffer) in grid {
                store.swap(channel, buffer);
                restored += 1;
            }
        }
        if let Some(pool) = pool {
            for (channel, buffer) in particles {
                pool.swap(channel, buffer);
                restored += 1;
            }
        }
        restored
    }

    /// Serialize as a JSON document
    ///
    /// # Errors
    /// Returns error if the snapshot cannot be serialized
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::SerializeFailed(e.to_string()))
    }

    /// Parse a JSON document; blank text is an empty snapshot
    ///
    /// # Errors
    /// Returns error if the text is not a snapshot document
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| SnapshotError::ParseFailed(e.to_string()))
    }

    /// Save to a file
    ///
    /// # Errors
    /// Returns error if the file cannot be written or the snapshot cannot be serialized
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let contents = self.to_json()?;
        fs::write(path, contents).map_err(|e| SnapshotError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    /// Load from a file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let contents = fs::read_to_string(path).map_err(|e| SnapshotError::LoadFailed(e.to_string()))?;
        Self::from_json(&contents)
    }
}

fn decode_all(channels: &[Option<TextureData>; 6]) -> Vec<(Channel, ChannelBuffer)> {
    Channel::ALL
        .into_iter()
        .zip(channels)
        .filter_map(|(channel, data)| Some((channel, decode(channel, data.as_ref()?)?)))
        .collect()
}

/// Why decoded channels cannot be written into a `grid_size` grid, if they cannot
fn layout_problem(
    grid_size: (usize, usize),
    grid: &[(Channel, ChannelBuffer)],
    particles: &[(Channel, ChannelBuffer)],
) -> Option<String> {
    for (channel, buffer) in grid {
        if (buffer.width(), buffer.height()) != grid_size {
            return Some(format!(
                "grid channel {:?} is {}x{}, expected {}x{}",
                channel,
                buffer.width(),
                buffer.height(),
                grid_size.0,
                grid_size.1
            ));
        }
    }
    let limit = particles.first().map_or(0, |(_, buffer)| buffer.width());
    for (channel, buffer) in particles {
        if limit == 0 || buffer.width() != limit || buffer.height() != 1 {
            return Some(format!(
                "particle channel {:?} is {}x{}, expected {}x1",
                channel,
                buffer.width(),
                buffer.height(),
                limit
            ));
        }
    }
    None
}

fn decode(channel: Channel, data: &TextureData) -> Option<ChannelBuffer> {
    let buffer = data.to_buffer();
    if buffer.is_none() {
        warn!(
            "Channel {:?} has {} bytes, expected {} for {}x{} {:?}; skipped",
            channel,
            data.data.len(),
            data.width * data.height * data.format.bytes_per_texel(),
            data.width,
            data.height,
            data.format
        );
    }
    buffer
}

/// Save `simulation` to `dir` using a file name template
///
/// # Errors
/// Returns error if the document cannot be serialized or written
pub fn save_simulation(simulation: &FlowSimulation, dir: &Path, template: &str) -> Result<PathBuf, SnapshotError> {
    let path = snapshot_path(dir, template, simulation.name());
    Snapshot::from_simulation(simulation).save(&path)?;
    info!("Saved simulation '{}' to {}", simulation.name(), path.display());
    Ok(path)
}

/// Load `simulation` from `dir` using a file name template
///
/// Returns the number of channels restored. On error the simulation is
/// left untouched.
///
/// # Errors
/// Returns error if the file cannot be read or parsed
pub fn load_simulation(simulation: &mut FlowSimulation, dir: &Path, template: &str) -> Result<usize, SnapshotError> {
    let path = snapshot_path(dir, template, simulation.name());
    let snapshot = Snapshot::load(&path)?;
    let restored = snapshot.apply_to(simulation);
    info!(
        "Loaded {} channels into simulation '{}' from {}",
        restored,
        simulation.name(),
        path.display()
    );
    Ok(restored)
}

/// Errors that can occur with snapshot operations
#[derive(Debug)]
pub enum SnapshotError {
    /// Failed to load file
    LoadFailed(String),
    /// Failed to parse file contents
    ParseFailed(String),
    /// Failed to serialize snapshot
    SerializeFailed(String),
    /// Failed to save file
    SaveFailed(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::LoadFailed(msg) => write!(f, "Failed to load: {msg}"),
            SnapshotError::ParseFailed(msg) => write!(f, "Failed to parse: {msg}"),
            SnapshotError::SerializeFailed(msg) => write!(f, "Failed to serialize: {msg}"),
            SnapshotError::SaveFailed(msg) => write!(f, "Failed to save: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}
