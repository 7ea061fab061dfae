//! Foam decay in whole 1/255 steps
//!
//! Foam is usually stored as a byte, so a per-tick decay smaller than 1/255
//! would round away. The counter accumulates the fractional amount and only
//! releases whole steps, carrying the remainder to the next tick.

/// Carries sub-step foam decay across ticks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FoamClearCounter {
    counter: f32,
}

impl FoamClearCounter {
    /// Advance by `rate * delta` (foam units per second) and return the decay to apply now
    ///
    /// The returned value is always a whole multiple of 1/255.
    pub fn advance(&mut self, rate: f32, delta: f32) -> f32 {
        self.counter += 255.0 * rate * delta;
        let steps = self.counter.trunc();
        if steps >= 1.0 {
            self.counter -= steps;
            steps / 255.0
        } else {
            0.0
        }
    }

    /// Fraction of a step carried forward
    #[must_use]
    pub fn remainder(&self) -> f32 {
        self.counter
    }
}
