//! Embassy time adapter for the simulator core.

use embassy_time::Instant;
use simulator_core::telemetry::TelemetryInstant;

/// Monotonic timestamp handed to the controller and the telemetry ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        core::time::Duration::from_micros(elapsed.as_micros())
    }
}
