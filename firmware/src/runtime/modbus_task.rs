use embassy_futures::select::{Either, select};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::gpio::Output;
use embassy_stm32::usart::BufferedUart;
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::{Read, Write};
use simulator_core::registers::SLAVE_ID;
use simulator_core::serial::SerialConfig;
use static_cell::StaticCell;

use crate::link::{LinkSettings, LinkSignal, REINIT_SETTLE, uart_config};
use crate::modbus::{FrameAssembler, MAX_ADU_SIZE, ModbusQueue};

const UART_BUFFER_SIZE: usize = MAX_ADU_SIZE;

/// How long a request may wait for the control loop to answer.
const REPLY_TIMEOUT: Duration = Duration::from_millis(100);

static UART_TX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART1>;
});

#[embassy_executor::task]
pub async fn run(
    queue: &'static ModbusQueue,
    link: &'static LinkSignal,
    usart: Peri<'static, hal::peripherals::USART1>,
    tx_pin: Peri<'static, hal::peripherals::PA9>,
    rx_pin: Peri<'static, hal::peripherals::PA10>,
    mut driver_enable: Output<'static>,
) -> ! {
    let mut settings = LinkSettings {
        serial: SerialConfig::new(),
        slave_id: SLAVE_ID,
    };

    let mut uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; UART_BUFFER_SIZE]),
        UartIrqs,
        uart_config(&settings.serial),
    )
    .expect("failed to initialize RS-485 UART");

    let requests = queue.requests.sender();
    let replies = queue.replies.receiver();
    let mut assembler = FrameAssembler::new();
    let mut chunk = [0u8; 32];

    loop {
        let first = select(link.wait(), uart.read(&mut chunk)).await;
        match first {
            Either::First(next) => {
                apply_settings(&mut uart, &mut driver_enable, &mut settings, next).await;
                assembler.clear();
                continue;
            }
            Either::Second(Ok(count)) => assembler.extend(&chunk[..count]),
            Either::Second(Err(_)) => {
                defmt::warn!("modbus: UART read error");
                assembler.clear();
                continue;
            }
        }

        // The frame ends once the line stays quiet for t3.5.
        let gap = settings.frame_gap();
        loop {
            match with_timeout(gap, uart.read(&mut chunk)).await {
                Ok(Ok(count)) => assembler.extend(&chunk[..count]),
                Ok(Err(_)) => {
                    defmt::warn!("modbus: UART read error mid-frame");
                    assembler.clear();
                    break;
                }
                Err(_) => break,
            }
        }

        let Some(frame) = assembler.finish() else {
            continue;
        };
        let stale = queue.discard_stale_replies();
        if stale > 0 {
            defmt::debug!("modbus: dropped {} late replies", stale);
        }
        requests.send(frame).await;

        match with_timeout(REPLY_TIMEOUT, replies.receive()).await {
            Ok(reply) if !reply.is_empty() => {
                transmit(&mut uart, &mut driver_enable, &reply).await;
            }
            Ok(_) => {}
            Err(_) => defmt::warn!("modbus: control loop did not answer"),
        }
    }
}

/// Releases the bus, waits out the settle delay, then reprograms the UART.
async fn apply_settings(
    uart: &mut BufferedUart<'static>,
    driver_enable: &mut Output<'static>,
    settings: &mut LinkSettings,
    next: LinkSettings,
) {
    driver_enable.set_low();
    Timer::after(REINIT_SETTLE).await;

    if uart.set_config(&uart_config(&next.serial)).is_err() {
        defmt::warn!(
            "modbus: UART rejected {}, keeping previous settings",
            defmt::Display2Format(&next.serial)
        );
        return;
    }
    *settings = next;
    defmt::info!(
        "modbus: link up {} slave={}",
        defmt::Display2Format(&settings.serial),
        settings.slave_id
    );
}

async fn transmit(uart: &mut BufferedUart<'static>, driver_enable: &mut Output<'static>, frame: &[u8]) {
    driver_enable.set_high();
    if uart.write_all(frame).await.is_err() || uart.flush().await.is_err() {
        defmt::warn!("modbus: UART write error");
    }
    driver_enable.set_low();
}
