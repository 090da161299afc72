//! RS-485 link reinitialisation.
//!
//! The control task owns the [`SerialLink`] side and only publishes the new
//! settings. The link task picks them up, releases the bus, waits out
//! [`REINIT_SETTLE`], reprograms the UART and drops any partial frame. No
//! request is read while it settles; the control and input tasks keep running.

use core::time::Duration as CoreDuration;

use embassy_sync::signal::Signal;
use embassy_time::Duration;
use simulator_core::controller::SerialLink;
use simulator_core::serial::SerialConfig;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type LinkMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type LinkMutex = NoopRawMutex;

/// Quiet time between releasing the old UART settings and applying new ones.
pub const REINIT_SETTLE: Duration = Duration::from_millis(20);

/// Settings the link task applies on its next wake.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkSettings {
    pub serial: SerialConfig,
    pub slave_id: u8,
}

impl LinkSettings {
    /// Inter-frame silence that ends an RTU frame at these settings.
    pub fn frame_gap(&self) -> Duration {
        core_duration_to_embassy(self.serial.rtu_frame_gap())
    }
}

pub type LinkSignal = Signal<LinkMutex, LinkSettings>;

/// Control-side handle implementing the core's link hook.
pub struct FirmwareLink {
    signal: &'static LinkSignal,
    reinits: u32,
}

impl FirmwareLink {
    pub const fn new(signal: &'static LinkSignal) -> Self {
        Self { signal, reinits: 0 }
    }

    pub const fn reinits(&self) -> u32 {
        self.reinits
    }
}

impl SerialLink for FirmwareLink {
    fn reinit(&mut self, config: &SerialConfig, slave_id: u8) {
        self.signal.signal(LinkSettings {
            serial: *config,
            slave_id,
        });
        self.reinits = self.reinits.wrapping_add(1);
    }
}

fn core_duration_to_embassy(duration: CoreDuration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

/// Maps the menu settings onto the STM32 UART configuration.
#[cfg(target_os = "none")]
pub fn uart_config(serial: &SerialConfig) -> embassy_stm32::usart::Config {
    use embassy_stm32::usart::{Config, DataBits, Parity as UartParity, StopBits};
    use simulator_core::serial::{DataBits as Bits, Parity, StopBits as Stop};

    let mut config = Config::default();
    config.baudrate = serial.baud();
    config.data_bits = match serial.data_bits {
        Bits::Seven => DataBits::DataBits7,
        Bits::Eight => DataBits::DataBits8,
    };
    config.parity = match serial.parity {
        Parity::None => UartParity::ParityNone,
        Parity::Even => UartParity::ParityEven,
        Parity::Odd => UartParity::ParityOdd,
    };
    config.stop_bits = match serial.stop_bits {
        Stop::One => StopBits::STOP1,
        Stop::Two => StopBits::STOP2,
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reinit_publishes_latest_settings() {
        let signal: &'static LinkSignal = Box::leak(Box::new(Signal::new()));
        let mut link = FirmwareLink::new(signal);
        let fast = SerialConfig::new().with_baud(19_200).expect("listed rate");

        link.reinit(&SerialConfig::new(), 1);
        link.reinit(&fast, 7);
        assert_eq!(link.reinits(), 2);

        let settings = signal.try_take().expect("pending settings");
        assert_eq!(settings.serial.baud(), 19_200);
        assert_eq!(settings.slave_id, 7);
        assert!(signal.try_take().is_none());
    }

    #[test]
    fn reinit_returns_without_waiting_for_the_link() {
        let signal: &'static LinkSignal = Box::leak(Box::new(Signal::new()));
        let mut link = FirmwareLink::new(signal);

        let started = std::time::Instant::now();
        for _ in 0..10 {
            link.reinit(&SerialConfig::new(), 1);
        }
        let limit = std::time::Duration::from_micros(REINIT_SETTLE.as_micros());
        assert!(started.elapsed() < limit);
        assert!(signal.signaled());
    }

    #[test]
    fn frame_gap_tracks_baud() {
        let settings = LinkSettings {
            serial: SerialConfig::new(),
            slave_id: 1,
        };
        assert_eq!(settings.frame_gap(), Duration::from_micros(3_645));
    }
}
