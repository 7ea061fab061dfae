//! Area samples and the listeners that react to them
//!
//! A [`SampleArea`] measures the fluid over a shaped footprint. One texel is
//! requested per grid column strip of its pixel rectangle, and the strips are
//! reduced to totals and the deepest column when the batch completes.

use super::kernels::AreaShape;
use crate::core_types::{Bounds, Mat4, MaskChannel, PixelRect, ShapeMask, Texel, Transform, Vec3};
use crate::grid::GridLayout;
use crate::simulation::events::{SampleAreaId, SimulationId};
use crate::simulation::FlowEvent;

/// When an area measures itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckType {
    /// Only after [`SampleArea::prime`]
    Manually,
    /// Once after creation, then manually
    Once,
    /// Every `check_interval` seconds
    #[default]
    Continuously,
}

/// A reduced area request ready to be sent to the sampler
#[derive(Debug, Clone, Copy)]
pub struct AreaQuery<'a> {
    pub rect: PixelRect,
    pub shape: AreaShape<'a>,
}

/// Measures total and deepest fluid over a footprint
#[derive(Debug, Clone, PartialEq)]
pub struct SampleArea {
    pub transform: Transform,
    /// Footprint size; y is ignored
    pub size: Vec3,
    pub shape: Option<ShapeMask>,
    pub shape_channel: MaskChannel,
    pub center: bool,
    pub check: CheckType,
    /// Seconds between continuous checks
    pub check_interval: f32,
    /// Sample this simulation instead of the nearest one
    pub simulation: Option<SimulationId>,
    pub watchers: Vec<AreaWatcher>,
    total_depth: f32,
    total_volume: f32,
    deepest_column: (usize, usize),
    deepest_depth: f32,
    deepest_ground_position: Vec3,
    deepest_fluid_position: Vec3,
    sampled: bool,
    primed: bool,
    counter: f32,
    in_flight: bool,
    reader_rect: PixelRect,
}

impl Default for SampleArea {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            size: Vec3::new(1.0, 0.0, 1.0),
            shape: None,
            shape_channel: MaskChannel::Alpha,
            center: true,
            check: CheckType::Continuously,
            check_interval: 1.0,
            simulation: None,
            watchers: Vec::new(),
            total_depth: 0.0,
            total_volume: 0.0,
            deepest_column: (0, 0),
            deepest_depth: 0.0,
            deepest_ground_position: Vec3::zeros(),
            deepest_fluid_position: Vec3::zeros(),
            sampled: false,
            primed: true,
            counter: 0.0,
            in_flight: false,
            reader_rect: PixelRect::default(),
        }
    }
}

impl SampleArea {
    #[must_use]
    pub fn new(transform: Transform, size_x: f32, size_z: f32) -> Self {
        Self {
            transform,
            size: Vec3::new(size_x, 0.0, size_z),
            ..Self::default()
        }
    }

    pub fn with_check(mut self, check: CheckType, interval: f32) -> Self {
        self.check = check;
        self.check_interval = interval;
        self
    }

    pub fn with_watcher(mut self, watcher: AreaWatcher) -> Self {
        self.watchers.push(watcher);
        self
    }

    #[must_use]
    pub fn total_depth(&self) -> f32 {
        self.total_depth
    }

    #[must_use]
    pub fn total_volume(&self) -> f32 {
        self.total_volume
    }

    #[must_use]
    pub fn deepest_column(&self) -> (usize, usize) {
        self.deepest_column
    }

    #[must_use]
    pub fn deepest_depth(&self) -> f32 {
        self.deepest_depth
    }

    #[must_use]
    pub fn deepest_ground_position(&self) -> Vec3 {
        self.deepest_ground_position
    }

    #[must_use]
    pub fn deepest_fluid_position(&self) -> Vec3 {
        self.deepest_fluid_position
    }

    #[must_use]
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// Whether a request is waiting for its batch
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Ask for a check on the next frame update
    pub fn prime(&mut self) {
        self.primed = true;
    }

    #[must_use]
    pub fn local_bounds(&self) -> Bounds {
        let size = Vec3::new(self.size.x, 0.0, self.size.z);
        let mut center = Vec3::zeros();
        if !self.center {
            center.x = size.x * 0.5;
            center.z = size.z * 0.5;
        }
        Bounds::from_center_size(center, size)
    }

    /// Advance the check timer; returns whether a check is due
    pub fn tick(&mut self, delta: f32) -> bool {
        if self.check == CheckType::Continuously {
            self.counter += delta;
            if self.counter >= self.check_interval {
                self.primed = true;
            }
        }
        self.primed
    }

    /// Start a check against `layout`, or `None` when one is in flight or nothing overlaps
    pub fn begin_check(&mut self, layout: &GridLayout) -> Option<AreaQuery<'_>> {
        if self.in_flight {
            return None;
        }
        let local = self.local_bounds();
        let size = local.size();
        if size.x <= 0.0 || size.z <= 0.0 {
            return None;
        }
        let rect = layout.pixel_rect(&Bounds::world_from_local(&self.transform, &local));
        if rect.is_empty() {
            return None;
        }

        let min = local.min();
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(1.0 / size.x, 1.0, 1.0 / size.z))
            * Mat4::new_translation(&Vec3::new(-min.x, 0.0, -min.z))
            * self.transform.world_to_local();

        self.primed = false;
        self.counter = if self.check_interval > 0.0 {
            self.counter % self.check_interval
        } else {
            0.0
        };
        self.in_flight = true;
        self.reader_rect = rect;

        Some(AreaQuery {
            rect,
            shape: AreaShape {
                matrix,
                mask: self.shape.as_ref(),
                channel: self.shape_channel,
                plane_normal: self.transform.up(),
                plane_point: self.transform.position,
            },
        })
    }

    /// Drop a started check whose request was rejected; it retries next frame
    pub fn cancel_check(&mut self) {
        self.in_flight = false;
        self.primed = true;
    }

    /// Reduce the per-strip texels of a completed request
    pub fn handle_samples(&mut self, samples: &[Texel], layout: &GridLayout) {
        self.in_flight = false;
        self.total_depth = 0.0;
        self.deepest_depth = 0.0;
        let mut deepest_ground = 0.0;

        for (x, sample) in samples.iter().enumerate() {
            self.total_depth += sample.x;
            if sample.y > self.deepest_depth {
                self.deepest_depth = sample.y;
                deepest_ground = sample.w;
                self.deepest_column = (self.reader_rect.x + x, sample.z as usize);
            }
        }

        let (column_x, column_y) = self.deepest_column;
        self.deepest_ground_position = layout.column_world_position(column_x as f32, column_y as f32, deepest_ground);
        self.deepest_fluid_position = self.deepest_ground_position;
        self.deepest_fluid_position.y += self.deepest_depth;
        self.total_volume = self.total_depth * layout.volume_per_column();
        self.sampled = true;
    }
}

/// Reaction to a completed area sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaWatcher {
    /// Report the total volume
    Volume,
    /// Report the deepest column's ground and surface, when at least `minimum_depth` deep
    Deepest { minimum_depth: f32 },
}

impl AreaWatcher {
    #[must_use]
    pub fn event(&self, id: SampleAreaId, area: &SampleArea) -> Option<FlowEvent> {
        match *self {
            Self::Volume => Some(FlowEvent::AreaVolume {
                area: id,
                volume: area.total_volume(),
            }),
            Self::Deepest { minimum_depth } => (area.deepest_depth() >= minimum_depth).then(|| FlowEvent::AreaDeepest {
                area: id,
                ground: area.deepest_ground_position(),
                surface: area.deepest_fluid_position(),
            }),
        }
    }
}

/// Volume condition checked by a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerCriteria {
    /// Volume above `volume_min`
    #[default]
    Above,
    /// Volume below `volume_min`
    Below,
    /// Volume within `volume_min..=volume_max`
    Within,
}

/// Fires met/unmet when an area's volume crosses a condition
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerArea {
    pub area: SampleAreaId,
    pub criteria: TriggerCriteria,
    pub volume_min: f32,
    pub volume_max: f32,
    met: bool,
}

impl TriggerArea {
    #[must_use]
    pub fn new(area: SampleAreaId, criteria: TriggerCriteria) -> Self {
        Self {
            area,
            criteria,
            volume_min: 1.0,
            volume_max: 1.0,
            met: false,
        }
    }

    pub fn with_range(mut self, volume_min: f32, volume_max: f32) -> Self {
        self.volume_min = volume_min;
        self.volume_max = volume_max;
        self
    }

    #[must_use]
    pub fn met(&self) -> bool {
        self.met
    }

    /// Whether the condition holds for `area`; never before it has sampled
    #[must_use]
    pub fn is_met(&self, area: Option<&SampleArea>) -> bool {
        let Some(area) = area.filter(|area| area.sampled()) else {
            return false;
        };
        let volume = area.total_volume();
        match self.criteria {
            TriggerCriteria::Above => volume > self.volume_min,
            TriggerCriteria::Below => volume < self.volume_min,
            TriggerCriteria::Within => volume >= self.volume_min && volume <= self.volume_max,
        }
    }

    /// Re-evaluate; returns the new state when it changed
    pub fn update(&mut self, area: Option<&SampleArea>) -> Option<bool> {
        let met = self.is_met(area);
        if met == self.met {
            return None;
        }
        self.met = met;
        Some(met)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulationConfig;
    use approx::assert_relative_eq;

    fn layout() -> GridLayout {
        GridLayout::new(&SimulationConfig::with_size(3.0, 3.0, 1.0), &Transform::identity()).unwrap()
    }

    #[test]
    fn test_continuous_checks_follow_interval() {
        let mut area = SampleArea::default();
        let layout = layout();
        assert!(area.tick(0.0));
        assert!(area.begin_check(&layout).is_some());
        assert!(area.begin_check(&layout).is_none());
        area.handle_samples(&[], &layout);

        assert!(!area.tick(0.5));
        assert!(area.tick(0.6));
    }

    #[test]
    fn test_manual_checks_need_priming() {
        let mut area = SampleArea::default().with_check(CheckType::Manually, 1.0);
        let layout = layout();
        assert!(area.tick(5.0));
        area.begin_check(&layout);
        area.handle_samples(&[], &layout);
        assert!(!area.tick(5.0));
        area.prime();
        assert!(area.tick(0.0));
    }

    #[test]
    fn test_reduce_strips() {
        let layout = layout();
        let mut area = SampleArea::new(Transform::from_position(Vec3::new(1.5, 0.0, 1.5)), 2.0, 2.0);
        let query = area.begin_check(&layout).unwrap();
        assert_eq!(query.rect, PixelRect::new(0, 0, 3, 3));

        area.handle_samples(
            &[
                Texel::new(0.5, 0.5, 1.0, 0.0),
                Texel::new(2.0, 1.5, 2.0, -1.0),
                Texel::new(0.0, 0.0, 0.0, 0.0),
            ],
            &layout,
        );
        assert!(area.sampled());
        assert_relative_eq!(area.total_depth(), 2.5);
        assert_relative_eq!(area.total_volume(), 2.5);
        assert_eq!(area.deepest_column(), (1, 2));
        assert_relative_eq!(area.deepest_ground_position(), Vec3::new(1.0, -1.0, 2.0), epsilon = 1.0e-5);
        assert_relative_eq!(area.deepest_fluid_position().y, 0.5, epsilon = 1.0e-5);
    }

    #[test]
    fn test_watchers() {
        let layout = layout();
        let mut area = SampleArea::default();
        area.begin_check(&layout);
        area.handle_samples(&[Texel::new(0.2, 0.2, 0.0, 0.0)], &layout);
        let id = SampleAreaId(4);
        assert!(matches!(AreaWatcher::Volume.event(id, &area), Some(FlowEvent::AreaVolume { volume, .. }) if (volume - 0.2).abs() < 1e-6));
        assert!(AreaWatcher::Deepest { minimum_depth: 0.5 }.event(id, &area).is_none());
        assert!(AreaWatcher::Deepest { minimum_depth: 0.1 }.event(id, &area).is_some());
    }

    #[test]
    fn test_trigger_transitions() {
        let layout = layout();
        let mut area = SampleArea::default();
        let mut trigger = TriggerArea::new(SampleAreaId(0), TriggerCriteria::Above);
        assert_eq!(trigger.update(Some(&area)), None);

        area.begin_check(&layout);
        area.handle_samples(&[Texel::new(3.0, 3.0, 0.0, 0.0)], &layout);
        assert_eq!(trigger.update(Some(&area)), Some(true));
        assert_eq!(trigger.update(Some(&area)), None);
        assert_eq!(trigger.update(None), Some(false));

        let within = TriggerArea::new(SampleAreaId(0), TriggerCriteria::Within).with_range(2.0, 4.0);
        assert!(within.is_met(Some(&area)));
    }
}
