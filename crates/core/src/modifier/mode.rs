//! Modifier modes and their per-pixel operations
//!
//! Every mode maps to one pure function over a column's texels. The numeric
//! values are stable and used when modes are serialized as numbers.

use super::ops::{self, PixelOp};
use crate::solver::Channel;
use serde::{Deserialize, Serialize};

/// How a modifier changes the columns under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModifierMode {
    #[default]
    AddFluid = 10,
    /// Fill only up to the modifier plane
    AddFluidClip = 11,
    /// Add only where the ground is above the modifier plane
    AddFluidClipInv = 12,
    /// Add only where the surface is below the modifier plane
    AddFluidBelow = 13,
    RemoveFluid = 20,
    /// Remove only where the ground is below the modifier plane
    RemoveFluidClip = 21,
    /// Remove where the surface is above the modifier plane
    RemoveFluidAbove = 22,
    /// Remove only the part of the fluid above the modifier plane
    RemoveFluidAboveClip = 23,
    /// Push fluid along a direction mask (or outward without one)
    AddForce = 30,
    /// Push fluid along the modifier's forward axis rotated by `angle`
    AddForceUniform = 31,
    DampenForce = 40,
    AddFoam = 50,
    /// Raise foam to at least the modifier strength
    AddFoamMax = 51,
    RemoveFoam = 60,
    ChangeColor = 70,
    ChangeESMV = 71,

    RangeAddForce = 130,
    RangeAddForceUniform = 131,
    RangeDampenForce = 140,
    RangeAddFoam = 150,
    RangeAddFoamMax = 151,
    RangeRemoveFoam = 160,
    RangeChangeColor = 170,
    RangeChangeESMV = 171,
}

impl ModifierMode {
    pub const ALL: [ModifierMode; 24] = [
        Self::AddFluid,
        Self::AddFluidClip,
        Self::AddFluidClipInv,
        Self::AddFluidBelow,
        Self::RemoveFluid,
        Self::RemoveFluidClip,
        Self::RemoveFluidAbove,
        Self::RemoveFluidAboveClip,
        Self::AddForce,
        Self::AddForceUniform,
        Self::DampenForce,
        Self::AddFoam,
        Self::AddFoamMax,
        Self::RemoveFoam,
        Self::ChangeColor,
        Self::ChangeESMV,
        Self::RangeAddForce,
        Self::RangeAddForceUniform,
        Self::RangeDampenForce,
        Self::RangeAddFoam,
        Self::RangeAddFoamMax,
        Self::RangeRemoveFoam,
        Self::RangeChangeColor,
        Self::RangeChangeESMV,
    ];

    /// Numeric value of the mode
    #[must_use]
    pub const fn value(self) -> u16 {
        self as u16
    }

    /// Mode for a numeric value
    #[must_use]
    pub fn from_value(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.value() == value)
    }

    #[must_use]
    pub const fn adds_fluid(self) -> bool {
        matches!(
            self,
            Self::AddFluid | Self::AddFluidClip | Self::AddFluidClipInv | Self::AddFluidBelow
        )
    }

    #[must_use]
    pub const fn removes_fluid(self) -> bool {
        matches!(
            self,
            Self::RemoveFluid | Self::RemoveFluidClip | Self::RemoveFluidAbove | Self::RemoveFluidAboveClip
        )
    }

    /// Whether the height range gates the effect
    #[must_use]
    pub const fn has_range(self) -> bool {
        matches!(
            self,
            Self::RangeAddForce
                | Self::RangeAddForceUniform
                | Self::RangeDampenForce
                | Self::RangeAddFoam
                | Self::RangeAddFoamMax
                | Self::RangeRemoveFoam
                | Self::RangeChangeColor
                | Self::RangeChangeESMV
        )
    }

    /// Mode with the same effect and no height range
    #[must_use]
    pub const fn without_range(self) -> Self {
        match self {
            Self::RangeAddForce => Self::AddForce,
            Self::RangeAddForceUniform => Self::AddForceUniform,
            Self::RangeDampenForce => Self::DampenForce,
            Self::RangeAddFoam => Self::AddFoam,
            Self::RangeAddFoamMax => Self::AddFoamMax,
            Self::RangeRemoveFoam => Self::RemoveFoam,
            Self::RangeChangeColor => Self::ChangeColor,
            Self::RangeChangeESMV => Self::ChangeESMV,
            other => other,
        }
    }

    /// Multiplier actually used for a caller-supplied one
    ///
    /// Foam ceilings are one-shot and always apply at full multiplier.
    #[must_use]
    pub fn effective_multiplier(self, multiplier: f32) -> f32 {
        match self {
            Self::AddFoamMax | Self::RangeAddFoamMax => 1.0,
            _ => multiplier,
        }
    }

    /// Uses the modifier angle for its force direction
    #[must_use]
    pub const fn is_uniform_force(self) -> bool {
        matches!(self, Self::AddForceUniform | Self::RangeAddForceUniform)
    }

    /// Channels the operation writes
    #[must_use]
    pub const fn targets(self) -> &'static [Channel] {
        match self.without_range() {
            Self::AddFluid | Self::AddFluidClip | Self::AddFluidClipInv | Self::AddFluidBelow => {
                &[Channel::C, Channel::D, Channel::E, Channel::F]
            }
            Self::RemoveFluid | Self::RemoveFluidClip | Self::RemoveFluidAbove | Self::RemoveFluidAboveClip => {
                &[Channel::C]
            }
            Self::AddForce | Self::AddForceUniform | Self::DampenForce => &[Channel::B],
            Self::AddFoam | Self::AddFoamMax | Self::RemoveFoam => &[Channel::F],
            Self::ChangeColor => &[Channel::D],
            _ => &[Channel::E],
        }
    }

    /// Pixel operation for this mode
    #[must_use]
    pub fn operation(self) -> PixelOp {
        match self.without_range() {
            Self::AddFluid => ops::add_fluid,
            Self::AddFluidClip => ops::add_fluid_clip,
            Self::AddFluidClipInv => ops::add_fluid_clip_inv,
            Self::AddFluidBelow => ops::add_fluid_below,
            Self::RemoveFluid => ops::remove_fluid,
            Self::RemoveFluidClip => ops::remove_fluid_clip,
            Self::RemoveFluidAbove => ops::remove_fluid_above,
            Self::RemoveFluidAboveClip => ops::remove_fluid_above_clip,
            Self::AddForce => ops::add_force,
            Self::AddForceUniform => ops::add_force_uniform,
            Self::DampenForce => ops::dampen_force,
            Self::AddFoam => ops::add_foam,
            Self::AddFoamMax => ops::add_foam_max,
            Self::RemoveFoam => ops::remove_foam,
            Self::ChangeColor => ops::change_color,
            _ => ops::change_esmv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_round_trip() {
        for mode in ModifierMode::ALL {
            assert_eq!(ModifierMode::from_value(mode.value()), Some(mode));
        }
        assert_eq!(ModifierMode::RangeChangeESMV.value(), 171);
        assert_eq!(ModifierMode::from_value(99), None);
    }

    #[test]
    fn test_predicates() {
        assert!(ModifierMode::AddFluidBelow.adds_fluid());
        assert!(!ModifierMode::AddFluidBelow.removes_fluid());
        assert!(ModifierMode::RemoveFluidAboveClip.removes_fluid());
        assert!(ModifierMode::RangeAddFoam.has_range());
        assert!(!ModifierMode::AddFoam.has_range());
        assert_eq!(ModifierMode::ALL.iter().filter(|m| m.has_range()).count(), 8);
    }

    #[test]
    fn test_foam_max_forces_full_multiplier() {
        assert_eq!(ModifierMode::AddFoamMax.effective_multiplier(0.2), 1.0);
        assert_eq!(ModifierMode::RangeAddFoamMax.effective_multiplier(0.2), 1.0);
        assert_eq!(ModifierMode::AddFoam.effective_multiplier(0.2), 0.2);
    }

    #[test]
    fn test_targets() {
        assert_eq!(ModifierMode::AddFluid.targets().len(), 4);
        assert_eq!(ModifierMode::RemoveFluid.targets(), &[Channel::C]);
        assert_eq!(ModifierMode::RangeDampenForce.targets(), &[Channel::B]);
        assert_eq!(ModifierMode::RangeChangeESMV.targets(), &[Channel::E]);
    }
}
