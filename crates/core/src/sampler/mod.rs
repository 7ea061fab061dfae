//! Batched, asynchronous sampling of simulation state
//!
//! Requests write their texels into a shared [`SampleAtlas`] as soon as they
//! are made, and are recorded as a reader: an owner plus the atlas pixels it
//! used. [`AsyncSampler::update`] drives one batch at a time:
//!
//! - **Idle**: queued readers and no outstanding batch. The atlas is copied,
//!   a read-back is issued (or the copy is kept for a synchronous read when
//!   the backend has no async path) and the sampler becomes requested.
//! - **Requested**: each update polls the backend. Once the read-back is
//!   ready, or has failed and been replaced by the synchronous copy, every
//!   waiting reader completes in that same update.
//!
//! New requests made while a batch is outstanding queue for the next one.

pub mod area;
pub mod atlas;
pub mod backend;
pub mod kernels;
pub mod point;

pub use area::{AreaQuery, AreaWatcher, CheckType, SampleArea, TriggerArea, TriggerCriteria};
pub use atlas::{SampleAtlas, ATLAS_HEIGHT, ATLAS_WIDTH};
pub use backend::{
    FailingReadback, ImmediateReadback, LatencyReadback, ReadbackBackend, ReadbackStatus, UnsupportedReadback,
};
pub use kernels::{area_column, area_depth, point_texels, AreaShape, POINT_TEXELS};
pub use point::PointSample;

use crate::core_types::{Texel, Transform, Vec3};
use crate::grid::GridLayout;
use crate::simulation::events::{HandlerId, PointSampleId, SampleAreaId, SimulationId};
use crate::solver::ColumnStore;
use std::mem;
use tracing::{debug, warn};

/// Who receives a request's samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleOwner {
    Point(PointSampleId),
    Area(SampleAreaId),
    Handler(HandlerId),
}

/// Receives the samples of caller-made requests
pub trait SampleHandler: Send {
    fn handle_samples(&mut self, simulation: SimulationId, samples: &[Texel]);
}

/// Samples delivered to one owner
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub owner: SampleOwner,
    pub simulation: SimulationId,
    pub samples: Vec<Texel>,
}

/// Where the sampler is in its batch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Requested,
}

#[derive(Debug)]
struct Reader {
    owner: SampleOwner,
    simulation: SimulationId,
    pixels: Vec<(u16, u16)>,
}

/// Single-batch sample scheduler over a read-back backend
pub struct AsyncSampler {
    atlas: SampleAtlas,
    added: Vec<Reader>,
    waiting: Vec<Reader>,
    pool: Vec<Vec<(u16, u16)>>,
    /// Copy of the atlas for the outstanding batch
    batch: Option<Vec<Texel>>,
    request_sent: bool,
    backend: Box<dyn ReadbackBackend>,
}

impl Default for AsyncSampler {
    fn default() -> Self {
        Self::new(Box::new(ImmediateReadback::default()))
    }
}

impl std::fmt::Debug for AsyncSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSampler")
            .field("backend", &self.backend.name())
            .field("added", &self.added.len())
            .field("waiting", &self.waiting.len())
            .field("atlas_used", &self.atlas.used())
            .finish()
    }
}

impl AsyncSampler {
    #[must_use]
    pub fn new(backend: Box<dyn ReadbackBackend>) -> Self {
        Self {
            atlas: SampleAtlas::new(),
            added: Vec::new(),
            waiting: Vec::new(),
            pool: Vec::new(),
            batch: None,
            request_sent: false,
            backend,
        }
    }

    /// True when no batch is outstanding
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.waiting.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> SamplerState {
        if self.waiting.is_empty() {
            SamplerState::Idle
        } else {
            SamplerState::Requested
        }
    }

    /// Requests queued for the next batch
    #[must_use]
    pub fn queued(&self) -> usize {
        self.added.len()
    }

    /// Requests in the outstanding batch
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Queue precomputed texels for `owner`
    ///
    /// Returns `false`, queueing nothing, when the atlas has no room left.
    pub fn request(&mut self, owner: SampleOwner, simulation: SimulationId, values: &[Texel]) -> bool {
        let Some(pixels) = self.atlas.write(values) else {
            debug!("Sample atlas full, dropped {} texels for {:?}", values.len(), owner);
            return false;
        };
        let mut recorded = self.pool.pop().unwrap_or_default();
        recorded.extend(pixels);
        self.added.push(Reader {
            owner,
            simulation,
            pixels: recorded,
        });
        true
    }

    /// Queue a point sample at a world position
    pub fn sample_point(
        &mut self,
        owner: SampleOwner,
        simulation: SimulationId,
        store: &ColumnStore,
        layout: &GridLayout,
        transform: &Transform,
        world: &Vec3,
    ) -> bool {
        let pixel = layout.world_point_to_pixel(world);
        let texels = point_texels(store, layout, transform, pixel.x, pixel.y);
        self.request(owner, simulation, &texels)
    }

    /// Queue one strip texel per column of an area query
    pub fn sample_area(
        &mut self,
        owner: SampleOwner,
        simulation: SimulationId,
        store: &ColumnStore,
        layout: &GridLayout,
        query: &AreaQuery<'_>,
    ) -> bool {
        let rect = query.rect;
        if rect.is_empty() {
            return false;
        }
        let texels: Vec<Texel> = (rect.x..rect.x_max())
            .map(|x| area_column(store, layout, &query.shape, x, rect.y..rect.y_max()))
            .collect();
        self.request(owner, simulation, &texels)
    }

    /// Advance the batch cycle; returns the requests completed this update
    pub fn update(&mut self) -> Vec<Completion> {
        if !self.added.is_empty() && self.waiting.is_empty() {
            self.waiting = mem::take(&mut self.added);
            let batch = self.atlas.take_batch();
            if self.backend.supports_async() {
                self.backend.request(batch.clone());
                self.request_sent = true;
            }
            self.batch = Some(batch);
            debug!("Requested sample batch for {} readers from {}", self.waiting.len(), self.backend.name());
        }

        if self.waiting.is_empty() {
            return Vec::new();
        }

        let texels = if self.request_sent {
            match self.backend.poll() {
                ReadbackStatus::Pending => return Vec::new(),
                ReadbackStatus::Ready(texels) => texels,
                ReadbackStatus::Failed => {
                    warn!("Read-back from {} failed, reading synchronously", self.backend.name());
                    self.batch.take().unwrap_or_default()
                }
            }
        } else {
            self.batch.take().unwrap_or_default()
        };
        self.request_sent = false;
        self.batch = None;

        self.waiting
            .drain(..)
            .map(|mut reader| {
                let samples = reader.pixels.iter().map(|&pixel| atlas::batch_texel(&texels, pixel)).collect();
                reader.pixels.clear();
                self.pool.push(reader.pixels);
                Completion {
                    owner: reader.owner,
                    simulation: reader.simulation,
                    samples,
                }
            })
            .collect()
    }
}
