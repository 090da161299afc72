use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::input::ButtonChannel;
use crate::link::LinkSignal;
use crate::modbus::ModbusQueue;

mod control_task;
mod input_task;
mod modbus_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static BUTTON_EVENTS: ButtonChannel = Channel::new();
pub(super) static MODBUS_QUEUE: ModbusQueue = ModbusQueue::new();
pub(super) static LINK_SETTINGS: LinkSignal = Signal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA8,
        PA9,
        PA10,
        PB4,
        PB5,
        USART1,
        ..
    } = hal::init(config);

    // Buttons and encoder close to ground; the driver enable idles in receive.
    let select = Input::new(PA0, Pull::Up);
    let back = Input::new(PA1, Pull::Up);
    let encoder_a = Input::new(PB4, Pull::Up);
    let encoder_b = Input::new(PB5, Pull::Up);
    let driver_enable = Output::new(PA8, Level::Low, Speed::Low);

    spawner
        .spawn(input_task::run(
            &BUTTON_EVENTS,
            select,
            back,
            encoder_a,
            encoder_b,
        ))
        .expect("failed to spawn input task");

    spawner
        .spawn(modbus_task::run(
            &MODBUS_QUEUE,
            &LINK_SETTINGS,
            USART1,
            PA9,
            PA10,
            driver_enable,
        ))
        .expect("failed to spawn Modbus link task");

    spawner
        .spawn(control_task::run(
            &MODBUS_QUEUE,
            &LINK_SETTINGS,
            &BUTTON_EVENTS,
        ))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
