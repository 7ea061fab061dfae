//! CPU fluid stepper
//!
//! Row-parallel kernels over `Vec<Texel>` using Rayon. Every kernel reads the
//! current channels and writes a new buffer, matching the swap discipline of
//! the [`ColumnStore`](super::ColumnStore).

use super::fields::ChannelBuffer;
use super::r#trait::{FluidStepper, ForceParams, TransportParams, WetnessParams};
use super::store::{ColumnStore, FluidBuffers};
use crate::core_types::Texel;
use crate::simulation::PhysicsModel;
use rayon::prelude::*;

/// Neighbour offsets in flux component order: -x, +x, -z, +z
const DIRECTIONS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Flux component a neighbour in direction `k` uses to send toward us
const OPPOSITE: [usize; 4] = [1, 0, 3, 2];

/// Below this weight a column keeps its previous color and material
const MIX_EPSILON: f32 = 1e-6;

#[inline]
fn neighbour(x: usize, y: usize, k: usize, width: usize, height: usize) -> Option<usize> {
    let (dx, dy) = DIRECTIONS[k];
    let nx = x as isize + dx;
    let ny = y as isize + dy;
    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
        None
    } else {
        Some(ny as usize * width + nx as usize)
    }
}

/// Fraction of last tick's flux kept before the height difference is added
fn retention(params: &ForceParams) -> f32 {
    let kept = match params.model {
        PhysicsModel::Standard | PhysicsModel::InversePeaks => 1.0 - params.damping + params.instability,
        PhysicsModel::Alive => 1.0 - params.damping * 0.25 + params.instability,
        PhysicsModel::Simple => 0.0,
    };
    kept.max(0.0)
}

/// Height difference driving flux from a column toward its neighbour
#[inline]
fn height_difference(model: PhysicsModel, ground: f32, depth: f32, n_ground: f32, n_depth: f32) -> f32 {
    if model == PhysicsModel::InversePeaks && depth > 0.0 && n_depth > 0.0 {
        (ground - depth * 0.5) - (n_ground - n_depth * 0.5)
    } else {
        (ground + depth) - (n_ground + n_depth)
    }
}

/// CPU stepper using Rayon for parallelism
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuStepper;

impl CpuStepper {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl FluidStepper for CpuStepper {
    fn forces(&self, store: &ColumnStore, params: &ForceParams) -> ChannelBuffer {
        let (width, height) = (store.width(), store.height());
        let a = store.a().as_slice();
        let b = store.b().as_slice();
        let c = store.c().as_slice();
        let kept = retention(params);
        let gain = params.spread * 0.25;

        let mut out = vec![Texel::zeros(); width * height];
        out.par_chunks_mut(width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                for (x, flux) in row.iter_mut().enumerate() {
                    let idx = y * width + x;
                    let ground = a[idx].x;
                    let depth = c[idx].x;

                    if !params.overflow && depth <= 0.0 {
                        *flux = Texel::zeros();
                        continue;
                    }

                    let old = b[idx];
                    for k in 0..4 {
                        let Some(n) = neighbour(x, y, k, width, height) else {
                            flux[k] = 0.0;
                            continue;
                        };
                        let diff = height_difference(params.model, ground, depth, a[n].x, c[n].x);
                        let candidate = old[k] * kept + gain * diff;
                        flux[k] = (old[k] + (candidate - old[k]) * params.speed).max(0.0);
                    }
                }
            });

        ChannelBuffer::from_texels(width, height, store.b().format(), out)
    }

    fn transport(&self, store: &ColumnStore, params: &TransportParams) -> FluidBuffers {
        let (width, height) = (store.width(), store.height());
        let b = store.b().as_slice();
        let c = store.c().as_slice();
        let d = store.d().as_slice();
        let e = store.e().as_slice();
        let f = store.f().as_slice();
        let step = params.delta * params.speed;

        // Volume each column sends in each direction this tick
        let outflow: Vec<Texel> = (0..width * height)
            .into_par_iter()
            .map(|idx| {
                let (x, y) = (idx % width, idx / width);
                let mut out = (b[idx] * step).map(|v| v.max(0.0));
                for k in 0..4 {
                    if neighbour(x, y, k, width, height).is_none() {
                        out[k] = 0.0;
                    }
                }
                if !params.overflow {
                    let total = out.sum();
                    let available = c[idx].x.max(0.0);
                    if total > available && total > 0.0 {
                        out *= available / total;
                    }
                }
                out
            })
            .collect();

        let columns: Vec<(Texel, Texel, Texel, Texel)> = (0..width * height)
            .into_par_iter()
            .map(|idx| {
                let (x, y) = (idx % width, idx / width);
                let remaining = c[idx].x - outflow[idx].sum();
                let kept = remaining.max(0.0);

                let mut depth = remaining;
                let mut weight = kept;
                let mut color = d[idx] * kept;
                let mut material = e[idx] * kept;
                let mut foam = f[idx] * kept;

                for k in 0..4 {
                    let Some(n) = neighbour(x, y, k, width, height) else {
                        continue;
                    };
                    let incoming = outflow[n][OPPOSITE[k]];
                    if incoming > 0.0 {
                        depth += incoming;
                        weight += incoming;
                        color += d[n] * incoming;
                        material += e[n] * incoming;
                        foam += f[n] * incoming;
                    }
                }

                if weight > MIX_EPSILON {
                    color /= weight;
                    material /= weight;
                    foam /= weight;
                } else {
                    color = d[idx];
                    material = e[idx];
                    foam = f[idx];
                }
                foam.x = (foam.x - params.foam_decay).max(0.0);
                if !params.overflow {
                    // Rounding in the outflow scale can leave -1 ulp
                    depth = depth.max(0.0);
                }

                (Texel::new(depth, 0.0, 0.0, 0.0), color, material, foam)
            })
            .collect();

        let mut depth = Vec::with_capacity(columns.len());
        let mut color = Vec::with_capacity(columns.len());
        let mut material = Vec::with_capacity(columns.len());
        let mut foam = Vec::with_capacity(columns.len());
        for (c, d, e, f) in columns {
            depth.push(c);
            color.push(d);
            material.push(e);
            foam.push(f);
        }

        FluidBuffers {
            depth: ChannelBuffer::from_texels(width, height, store.c().format(), depth),
            color: ChannelBuffer::from_texels(width, height, store.d().format(), color),
            material: ChannelBuffer::from_texels(width, height, store.e().format(), material),
            foam: ChannelBuffer::from_texels(width, height, store.f().format(), foam),
        }
    }

    fn wetness(&self, store: &ColumnStore, params: &WetnessParams) -> ChannelBuffer {
        let (width, height) = (store.width(), store.height());
        let a = store.a().as_slice();
        let c = store.c().as_slice();
        let drop = params.dry_rate * params.delta;

        let mut out = vec![Texel::zeros(); width * height];
        out.par_chunks_mut(width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                for (x, texel) in row.iter_mut().enumerate() {
                    let idx = y * width + x;
                    let depth = c[idx].x;
                    let wet = if depth > 0.0 {
                        depth
                    } else {
                        (a[idx].y - drop).max(-params.table_depth)
                    };
                    *texel = Texel::new(a[idx].x, wet, 0.0, 0.0);
                }
            });

        ChannelBuffer::from_texels(width, height, store.a().format(), out)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::PixelRect;
    use crate::solver::format::{ChannelFormats, CustomDataType, FloatPrecision, Precision01};
    use crate::solver::store::Channel;

    fn store(width: usize, height: usize) -> ColumnStore {
        ColumnStore::allocate(
            width,
            height,
            &ChannelFormats::from_precisions(
                FloatPrecision::Full,
                FloatPrecision::Full,
                FloatPrecision::Full,
                Precision01::Full,
                Precision01::Full,
                Precision01::Full,
                CustomDataType::None,
            ),
        )
    }

    fn force_params() -> ForceParams {
        ForceParams {
            model: PhysicsModel::Standard,
            instability: 0.0,
            spread: 2.0,
            damping: 0.15,
            speed: 1.0,
            overflow: false,
        }
    }

    fn transport_params() -> TransportParams {
        TransportParams {
            delta: 0.02,
            speed: 10.0,
            foam_decay: 0.0,
            overflow: false,
        }
    }

    fn step(store: &mut ColumnStore, stepper: &CpuStepper) {
        let fluxes = stepper.forces(store, &force_params());
        let _ = store.swap(Channel::B, fluxes);
        let fluids = stepper.transport(store, &transport_params());
        let _ = store.swap_fluids(fluids);
    }

    #[test]
    fn test_flat_fluid_stays_still() {
        let mut store = store(4, 4);
        store.replace_fluids(1.0, Texel::new(1.0, 1.0, 1.0, 1.0), Texel::zeros(), 0.0);
        let fluxes = CpuStepper.forces(&store, &force_params());
        assert!(fluxes.as_slice().iter().all(|t| *t == Texel::zeros()));
    }

    #[test]
    fn test_column_spreads_to_neighbours() {
        let mut store = store(3, 3);
        store.replace_rect(Channel::C, PixelRect::new(1, 1, 1, 1), Texel::new(1.0, 0.0, 0.0, 0.0));
        let fluxes = CpuStepper.forces(&store, &force_params());
        let center = fluxes.get(1, 1);
        assert!(center.iter().all(|&v| v > 0.0));
        // Dry neighbours emit nothing
        assert_eq!(fluxes.get(0, 1), Texel::zeros());

        let _ = store.swap(Channel::B, fluxes);
        let fluids = CpuStepper.transport(&store, &transport_params());
        assert!(fluids.depth.get(1, 1).x < 1.0);
        assert!(fluids.depth.get(0, 1).x > 0.0);
    }

    #[test]
    fn test_transport_conserves_volume() {
        let stepper = CpuStepper::new();
        let mut store = store(8, 6);
        store.replace_rect(Channel::C, PixelRect::new(0, 0, 3, 3), Texel::new(2.0, 0.0, 0.0, 0.0));
        store.replace_rect(Channel::A, PixelRect::new(5, 0, 3, 6), Texel::new(0.5, 0.0, 0.0, 0.0));
        let before = store.total_depth();

        for _ in 0..200 {
            step(&mut store, &stepper);
            assert!(store.c().as_slice().iter().all(|t| t.x >= 0.0));
        }
        assert!((store.total_depth() - before).abs() < 1e-3);
    }

    #[test]
    fn test_outflow_limited_by_depth() {
        let mut store = store(3, 1);
        store.replace_rect(Channel::C, PixelRect::new(1, 0, 1, 1), Texel::new(0.1, 0.0, 0.0, 0.0));
        store.replace_rect(Channel::B, PixelRect::new(1, 0, 1, 1), Texel::new(100.0, 100.0, 0.0, 0.0));
        let fluids = CpuStepper.transport(&store, &transport_params());
        assert!(fluids.depth.get(1, 0).x.abs() < 1e-6);
        assert!((fluids.depth.get(0, 0).x - 0.05).abs() < 1e-6);
        assert!((fluids.depth.get(2, 0).x - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_color_moves_with_fluid() {
        let mut store = store(2, 1);
        store.replace_rect(Channel::C, PixelRect::new(0, 0, 2, 1), Texel::new(1.0, 0.0, 0.0, 0.0));
        store.replace_rect(Channel::D, PixelRect::new(0, 0, 1, 1), Texel::new(1.0, 0.0, 0.0, 1.0));
        store.replace_rect(Channel::D, PixelRect::new(1, 0, 1, 1), Texel::new(0.0, 0.0, 1.0, 1.0));
        store.replace_rect(Channel::B, PixelRect::new(0, 0, 1, 1), Texel::new(0.0, 5.0, 0.0, 0.0));
        let fluids = CpuStepper.transport(&store, &transport_params());
        // Column 1 holds 1.0 blue and receives 1.0 red
        let mixed = fluids.color.get(1, 0);
        assert!((mixed.x - 0.5).abs() < 1e-5);
        assert!((mixed.z - 0.5).abs() < 1e-5);
        assert_eq!(fluids.color.get(0, 0), Texel::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_overflow_allows_dry_outflow() {
        let mut params = force_params();
        params.overflow = true;
        let mut store = store(2, 1);
        store.replace_rect(Channel::A, PixelRect::new(0, 0, 1, 1), Texel::new(1.0, 0.0, 0.0, 0.0));
        let fluxes = CpuStepper.forces(&store, &params);
        assert!(fluxes.get(0, 0).y > 0.0);
    }

    #[test]
    fn test_simple_model_has_no_inertia() {
        let mut params = force_params();
        params.model = PhysicsModel::Simple;
        let mut store = store(2, 1);
        store.replace_fluids(1.0, Texel::zeros(), Texel::zeros(), 0.0);
        store.replace_rect(Channel::B, PixelRect::new(0, 0, 2, 1), Texel::new(3.0, 3.0, 3.0, 3.0));
        let fluxes = CpuStepper.forces(&store, &params);
        assert!(fluxes.as_slice().iter().all(|t| *t == Texel::zeros()));
    }

    #[test]
    fn test_wetness_dries_to_table_depth() {
        let params = WetnessParams {
            delta: 0.5,
            table_depth: 1.0,
            dry_rate: 1.0,
        };
        let mut store = store(2, 1);
        store.replace_heights(0.0, 0.2);
        store.replace_rect(Channel::C, PixelRect::new(1, 0, 1, 1), Texel::new(0.7, 0.0, 0.0, 0.0));

        let a = CpuStepper.wetness(&store, &params);
        assert!((a.get(0, 0).y + 0.3).abs() < 1e-6);
        assert!((a.get(1, 0).y - 0.7).abs() < 1e-6);

        let _ = store.swap(Channel::A, a);
        let a = CpuStepper.wetness(&store, &params);
        let _ = store.swap(Channel::A, a);
        let a = CpuStepper.wetness(&store, &params);
        assert_eq!(a.get(0, 0).y, -1.0);
    }

    #[test]
    fn test_foam_decays_by_given_amount() {
        let mut store = store(2, 1);
        store.replace_fluids(1.0, Texel::zeros(), Texel::zeros(), 0.5);
        let mut params = transport_params();
        params.foam_decay = 0.1;
        let fluids = CpuStepper.transport(&store, &params);
        assert!((fluids.foam.get(0, 0).x - 0.4).abs() < 1e-6);
    }
}
