//! Rotary position tracking.
//!
//! The quadrature decoder (an external collaborator) exposes a free-running
//! position counter. [`EncoderTracker`] keeps the reading that the active
//! screen last consumed and turns new readings into signed deltas. Screens
//! only use the sign, so a burst of detents between two ticks moves a cursor
//! by a single unit.

/// Direction of a unit rotation step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

impl Rotation {
    /// Maps a signed delta onto a direction; zero yields `None`.
    #[must_use]
    pub const fn from_delta(delta: i32) -> Option<Self> {
        if delta > 0 {
            Some(Rotation::Clockwise)
        } else if delta < 0 {
            Some(Rotation::CounterClockwise)
        } else {
            None
        }
    }

    /// `+1` for clockwise, `-1` for counter-clockwise.
    #[must_use]
    pub const fn signum(self) -> i32 {
        match self {
            Rotation::Clockwise => 1,
            Rotation::CounterClockwise => -1,
        }
    }
}

/// Converts absolute encoder readings into deltas against a baseline.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct EncoderTracker {
    baseline: i32,
}

impl EncoderTracker {
    /// Creates a tracker anchored at `position`.
    #[must_use]
    pub const fn new(position: i32) -> Self {
        Self { baseline: position }
    }

    /// Returns the reading the next delta is measured against.
    #[must_use]
    pub const fn baseline(&self) -> i32 {
        self.baseline
    }

    /// Discards any pending movement by anchoring at `position`.
    pub fn rebaseline(&mut self, position: i32) {
        self.baseline = position;
    }

    /// Returns `position - baseline` and moves the baseline to `position`.
    pub fn take_delta(&mut self, position: i32) -> i32 {
        let delta = position.wrapping_sub(self.baseline);
        self.baseline = position;
        delta
    }

    /// Consumes pending movement and reports its direction, if any.
    pub fn take_rotation(&mut self, position: i32) -> Option<Rotation> {
        Rotation::from_delta(self.take_delta(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_measured_against_last_reading() {
        let mut tracker = EncoderTracker::new(10);
        assert_eq!(tracker.take_delta(14), 4);
        assert_eq!(tracker.take_delta(14), 0);
        assert_eq!(tracker.take_delta(11), -3);
        assert_eq!(tracker.baseline(), 11);
    }

    #[test]
    fn rebaseline_discards_pending_motion() {
        let mut tracker = EncoderTracker::new(0);
        tracker.rebaseline(8);
        assert_eq!(tracker.take_rotation(8), None);
        assert_eq!(tracker.take_rotation(9), Some(Rotation::Clockwise));
    }

    #[test]
    fn counter_wraparound_keeps_direction() {
        let mut tracker = EncoderTracker::new(i32::MAX);
        assert_eq!(tracker.take_rotation(i32::MIN), Some(Rotation::Clockwise));
    }
}
