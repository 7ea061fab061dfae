//! Volume containers that modifiers fill from or drain into

use super::{Modifier, ModifierMode};

/// Scalar store of fluid volume outside the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    volume: f32,
    pub capacity: f32,
    clamp: bool,
}

impl Default for Container {
    fn default() -> Self {
        Self {
            volume: 0.0,
            capacity: 100.0,
            clamp: false,
        }
    }
}

impl Container {
    #[must_use]
    pub fn new(volume: f32, capacity: f32, clamp: bool) -> Self {
        let mut container = Self {
            volume,
            capacity,
            clamp,
        };
        container.update_clamp();
        container
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Fill fraction, 0 when the capacity is 0
    #[must_use]
    pub fn volume01(&self) -> f32 {
        if self.capacity == 0.0 {
            0.0
        } else {
            (self.volume / self.capacity).clamp(0.0, 1.0)
        }
    }

    #[must_use]
    pub fn clamp(&self) -> bool {
        self.clamp
    }

    pub fn set_clamp(&mut self, clamp: bool) {
        self.clamp = clamp;
        self.update_clamp();
    }

    /// Set the volume; returns whether it changed
    pub fn set_volume(&mut self, volume: f32) -> bool {
        let volume = if self.clamp {
            volume.clamp(0.0, self.capacity)
        } else {
            volume
        };
        if self.volume == volume {
            return false;
        }
        self.volume = volume;
        true
    }

    pub fn add_volume(&mut self, delta: f32) -> bool {
        self.set_volume(self.volume + delta)
    }

    pub fn remove_volume(&mut self, delta: f32) -> bool {
        self.set_volume(self.volume - delta)
    }

    fn update_clamp(&mut self) {
        if self.clamp {
            self.volume = self.volume.clamp(0.0, self.capacity);
        }
    }
}

/// Ties a monitored fluid modifier to a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerLink<M, C> {
    pub modifier: M,
    pub container: C,
}

impl<M, C> ContainerLink<M, C> {
    pub fn new(modifier: M, container: C) -> Self {
        Self { modifier, container }
    }
}

/// Whether a fluid modifier may run given its container's state
///
/// Adding needs volume to give, removing needs room to take. Other modes
/// keep their current state, returned as `None`.
#[must_use]
pub fn gate(mode: ModifierMode, container: Option<&Container>) -> Option<bool> {
    if mode.adds_fluid() {
        Some(container.is_some_and(|c| c.volume() > 0.0))
    } else if mode.removes_fluid() {
        Some(container.is_some_and(|c| c.volume() < c.capacity))
    } else {
        None
    }
}

/// Enable or disable a modifier per [`gate`]
pub fn update_enabled(modifier: &mut Modifier, container: Option<&Container>) {
    if let Some(enabled) = gate(modifier.mode, container) {
        modifier.enabled = enabled;
    }
}

/// Move a monitored volume delta (positive = removed from the grid) into the container
pub fn route(container: &mut Container, volume_delta: f32) -> bool {
    if volume_delta > 0.0 {
        container.add_volume(volume_delta)
    } else if volume_delta < 0.0 {
        container.remove_volume(-volume_delta)
    } else {
        false
    }
}
