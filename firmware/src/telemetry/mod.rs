//! Mirrors the controller's telemetry ring to the debug log.
//!
//! The ring lives in the core; this module only remembers which records have
//! been printed and formats new ones as they appear.

use simulator_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord, TelemetryRecorder};

use crate::clock::FirmwareInstant;

/// Tracks the next telemetry id to print.
#[derive(Debug, Default)]
pub struct TelemetryLog {
    next: EventId,
}

impl TelemetryLog {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Logs every record added since the previous call; returns how many.
    ///
    /// Records that were overwritten in the ring before they could be printed
    /// are skipped.
    pub fn drain(&mut self, recorder: &TelemetryRecorder<FirmwareInstant>) -> usize {
        let mut printed = 0;
        for record in recorder.since(self.next) {
            emit_record(record);
            printed += 1;
        }
        self.next = recorder.next_id();
        printed
    }
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    let code = record.event.to_raw();
    let timestamp_us = record.timestamp.as_micros();
    if matches!(record.details, TelemetryPayload::None) {
        defmt::info!(
            "telemetry:{} {=u16:#x} {} t={}us",
            record.id,
            code,
            defmt::Display2Format(&record.event),
            timestamp_us
        );
    } else {
        defmt::info!(
            "telemetry:{} {=u16:#x} {} {} t={}us",
            record.id,
            code,
            defmt::Display2Format(&record.event),
            defmt::Display2Format(&record.details),
            timestamp_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord<FirmwareInstant>) {
    let timestamp_us = record.timestamp.as_micros();
    if matches!(record.details, TelemetryPayload::None) {
        println!(
            "telemetry:{} {:#x} {} t={}us",
            record.id,
            record.event.to_raw(),
            record.event,
            timestamp_us
        );
    } else {
        println!(
            "telemetry:{} {:#x} {} {} t={}us",
            record.id,
            record.event.to_raw(),
            record.event,
            record.details,
            timestamp_us
        );
    }
}
