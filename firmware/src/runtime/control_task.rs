use embassy_time::{Duration, Ticker};
use heapless::Vec;
use portable_atomic::Ordering;
use simulator_core::controller::{Controller, ControllerConfig};
use simulator_core::navigation::ButtonEvent;
use simulator_core::registers::RegisterBank;

use crate::clock::FirmwareInstant;
use crate::display::LogDisplay;
use crate::input::{BUTTON_QUEUE_DEPTH, ButtonChannel, ENCODER_POSITION};
use crate::link::{FirmwareLink, LinkSignal};
use crate::modbus::{Disposition, ModbusQueue, RtuSlave};
use crate::telemetry::TelemetryLog;

/// Control loop period; also bounds Modbus reply latency.
const TICK_PERIOD: Duration = Duration::from_millis(5);

type FirmwareController = Controller<RegisterBank, FirmwareLink, LogDisplay, FirmwareInstant>;

#[embassy_executor::task]
pub async fn run(
    modbus: &'static ModbusQueue,
    link: &'static LinkSignal,
    buttons: &'static ButtonChannel,
) -> ! {
    let config = ControllerConfig::default();
    let mut controller = FirmwareController::new(
        config,
        RegisterBank::new(),
        FirmwareLink::new(link),
        LogDisplay::new(),
    );
    let slave = RtuSlave::new(config.slave_id);
    let mut telemetry = TelemetryLog::new();

    let requests = modbus.requests.receiver();
    let replies = modbus.replies.sender();
    let button_events = buttons.receiver();
    let mut pressed: Vec<ButtonEvent, BUTTON_QUEUE_DEPTH> = Vec::new();

    controller
        .start(
            FirmwareInstant::now(),
            ENCODER_POSITION.load(Ordering::Relaxed),
        )
        .expect("register bank sized for the parameter catalog");
    telemetry.drain(controller.telemetry());

    let mut ticker = Ticker::every(TICK_PERIOD);
    loop {
        ticker.next().await;

        // Transport first, so inbound sync sees this tick's remote writes.
        while let Ok(request) = requests.try_receive() {
            let disposition = slave.handle(&request, controller.table_mut());
            match &disposition {
                Disposition::Ignored(reason) => {
                    defmt::debug!("modbus: ignored frame {}", defmt::Debug2Format(reason));
                }
                Disposition::Broadcast(Some(exception)) => {
                    defmt::warn!(
                        "modbus: broadcast rejected code={}",
                        exception.code()
                    );
                }
                Disposition::Broadcast(None) | Disposition::Reply(_) => {}
            }
            if replies.try_send(disposition.into_reply()).is_err() {
                defmt::warn!("modbus: reply queue full");
            }
        }

        pressed.clear();
        while let Ok(event) = button_events.try_receive() {
            if pressed.push(event).is_err() {
                break;
            }
        }

        let position = ENCODER_POSITION.load(Ordering::Relaxed);
        let report = controller.tick(FirmwareInstant::now(), position, &pressed);
        if let Some(error) = report.register_error {
            defmt::warn!("control: {}", defmt::Display2Format(&error));
        }

        telemetry.drain(controller.telemetry());
    }
}
