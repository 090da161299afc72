use embassy_stm32::gpio::Input;
use embassy_time::{Instant, Ticker};
use portable_atomic::Ordering;

use crate::input::{
    BackButton, ButtonChannel, ENCODER_POSITION, QuadratureDecoder, SAMPLE_PERIOD, SelectButton,
};

#[embassy_executor::task]
pub async fn run(
    buttons: &'static ButtonChannel,
    select_pin: Input<'static>,
    back_pin: Input<'static>,
    encoder_a: Input<'static>,
    encoder_b: Input<'static>,
) -> ! {
    let sender = buttons.sender();
    let mut select = SelectButton::new();
    let mut back = BackButton::new();
    let mut decoder = QuadratureDecoder::new(encoder_a.is_high(), encoder_b.is_high());
    let mut ticker = Ticker::every(SAMPLE_PERIOD);

    loop {
        ticker.next().await;
        let now = Instant::now();

        decoder.update(encoder_a.is_high(), encoder_b.is_high());
        ENCODER_POSITION.store(decoder.detents(), Ordering::Relaxed);

        let events = [
            select.update(select_pin.is_low(), now),
            back.update(back_pin.is_low(), now),
        ];
        for event in events.into_iter().flatten() {
            if sender.try_send(event).is_err() {
                defmt::warn!(
                    "input: button queue full, dropping {}",
                    defmt::Display2Format(&event)
                );
            }
        }
    }
}
