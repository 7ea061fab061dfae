//! Registry identifiers and the events a world reports
//!
//! Every registry entry is addressed by a typed id. Events are queued in the
//! order they happen and drained by the caller.

use crate::core_types::Vec3;
use std::fmt;

macro_rules! registry_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }
    };
}

registry_id!(
    /// Identifies a simulation grid within a world
    SimulationId
);
registry_id!(
    /// Identifies a modifier within a world
    ModifierId
);
registry_id!(PointSampleId);
registry_id!(SampleAreaId);
registry_id!(
    /// Identifies a volume trigger watching a sample area
    TriggerId
);
registry_id!(ContainerId);
registry_id!(
    /// Identifies a modifier-to-container link
    LinkId
);
registry_id!(SplashSurfaceId);
registry_id!(
    /// Identifies a caller-supplied sample handler
    HandlerId
);

/// Something that happened during a world update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowEvent {
    /// A simulation allocated its columns
    Activated(SimulationId),
    /// A simulation finished a fixed update
    SimulationUpdated(SimulationId),
    /// A modifier changed a simulation
    Applied {
        modifier: ModifierId,
        simulation: SimulationId,
        multiplier: f32,
    },
    /// Depth sum change of a monitored apply, positive when fluid was removed
    FluidDepthDelta {
        modifier: ModifierId,
        simulation: SimulationId,
        delta: f32,
    },
    /// [`FlowEvent::FluidDepthDelta`] scaled by the column area
    FluidVolumeDelta {
        modifier: ModifierId,
        simulation: SimulationId,
        delta: f32,
    },
    ContainerVolume {
        container: ContainerId,
        volume: f32,
        volume01: f32,
    },
    PointSampled(PointSampleId),
    AreaSampled(SampleAreaId),
    AreaVolume {
        area: SampleAreaId,
        volume: f32,
    },
    AreaDeepest {
        area: SampleAreaId,
        ground: Vec3,
        surface: Vec3,
    },
    TriggerMet(TriggerId),
    TriggerUnmet(TriggerId),
    /// A splash modifier changed a simulation
    SplashApplied {
        surface: Option<SplashSurfaceId>,
        simulation: SimulationId,
        strength: f32,
    },
    /// A splash fired at `position`
    Splash {
        surface: Option<SplashSurfaceId>,
        position: Vec3,
        strength: f32,
    },
}
