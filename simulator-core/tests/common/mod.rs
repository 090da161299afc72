#![allow(dead_code)]

use core::time::Duration;

use simulator_core::controller::{Controller, ControllerConfig, Display, SerialLink};
use simulator_core::navigation::{ButtonEvent, Screen};
use simulator_core::params::ParameterId;
use simulator_core::registers::RegisterBank;
use simulator_core::screens::ScreenView;
use simulator_core::serial::SerialConfig;
use simulator_core::telemetry::TelemetryInstant;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct MicrosInstant(u64);

impl MicrosInstant {
    pub const fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl TelemetryInstant for MicrosInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Default)]
pub struct MockLink {
    pub reinits: Vec<(SerialConfig, u8)>,
}

impl SerialLink for MockLink {
    fn reinit(&mut self, config: &SerialConfig, slave_id: u8) {
        self.reinits.push((*config, slave_id));
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    pub frames: Vec<(Screen, String)>,
}

impl Display for RecordingDisplay {
    fn render(&mut self, view: &ScreenView<'_>) {
        self.frames.push((view.screen(), view.to_string()));
    }
}

pub type SimController = Controller<RegisterBank, MockLink, RecordingDisplay, MicrosInstant>;

/// Drives a controller with a virtual clock and encoder.
pub struct Harness {
    pub controller: SimController,
    pub now_ms: u64,
    pub position: i32,
}

impl Harness {
    pub fn start() -> Self {
        let mut controller = SimController::new(
            ControllerConfig::default(),
            RegisterBank::new(),
            MockLink::default(),
            RecordingDisplay::default(),
        );
        controller
            .start(MicrosInstant::millis(0), 0)
            .expect("catalog fits the register bank");
        Self {
            controller,
            now_ms: 0,
            position: 0,
        }
    }

    /// Advances the clock by `ms` and runs one tick.
    pub fn tick_after(&mut self, ms: u64, buttons: &[ButtonEvent]) {
        self.now_ms += ms;
        self.controller
            .tick(MicrosInstant::millis(self.now_ms), self.position, buttons);
    }

    pub fn press(&mut self, button: ButtonEvent) {
        self.tick_after(10, &[button]);
    }

    /// Turns the encoder one detent per tick.
    pub fn rotate(&mut self, detents: i32) {
        for _ in 0..detents.unsigned_abs() {
            self.position += detents.signum();
            self.tick_after(10, &[]);
        }
    }

    pub fn remote_write(&mut self, address: u16, raw: u16) {
        use simulator_core::registers::RegisterTable;

        self.controller
            .table_mut()
            .write(address, raw)
            .expect("register is mapped");
    }

    pub fn register(&self, address: u16) -> Option<u16> {
        use simulator_core::registers::RegisterTable;

        self.controller.table().read(address)
    }

    pub fn value(&self, index: usize) -> f32 {
        self.controller.store().value(id(index))
    }

    pub fn frames(&self) -> usize {
        self.controller.display().frames.len()
    }
}

pub fn id(index: usize) -> ParameterId {
    ParameterId::from_index(index).expect("index in range")
}
