//! Button debouncing and quadrature decoding.
//!
//! The input task samples the pins on a fixed period, turns edges into
//! [`ButtonEvent`]s for the control task, and publishes the encoder position
//! in detents through [`ENCODER_POSITION`].

use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Instant};
use portable_atomic::AtomicI32;
use simulator_core::navigation::ButtonEvent;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type InputMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type InputMutex = NoopRawMutex;

/// Time a raw level must hold before it counts as an edge.
pub const DEBOUNCE: Duration = Duration::from_millis(30);

/// Hold time that turns a Select press into a long press.
pub const LONG_PRESS: Duration = Duration::from_millis(600);

/// Pin sampling period of the input task.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(1);

/// Quadrature counts between two mechanical detents.
pub const COUNTS_PER_DETENT: i32 = 4;

pub const BUTTON_QUEUE_DEPTH: usize = 8;

pub type ButtonChannel = Channel<InputMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;
pub type ButtonSender<'a> = Sender<'a, InputMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;
pub type ButtonReceiver<'a> = Receiver<'a, InputMutex, ButtonEvent, BUTTON_QUEUE_DEPTH>;

/// Encoder position in detents, written by the input task only.
pub static ENCODER_POSITION: AtomicI32 = AtomicI32::new(0);

/// Filters contact bounce out of a raw button level.
#[derive(Copy, Clone, Debug)]
pub struct Debouncer {
    stable: bool,
    candidate: bool,
    changed_at: Instant,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            stable: false,
            candidate: false,
            changed_at: Instant::from_ticks(0),
        }
    }

    /// Feeds one sample; returns the new stable level when an edge is accepted.
    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<bool> {
        if pressed != self.candidate {
            self.candidate = pressed;
            self.changed_at = now;
            return None;
        }

        if self.candidate != self.stable
            && now.saturating_duration_since(self.changed_at) >= DEBOUNCE
        {
            self.stable = self.candidate;
            return Some(self.stable);
        }
        None
    }

    pub const fn is_pressed(&self) -> bool {
        self.stable
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Select button: short press on release, long press once while held.
///
/// A press that reaches [`LONG_PRESS`] reports only the long press.
#[derive(Copy, Clone, Debug, Default)]
pub struct SelectButton {
    debouncer: Debouncer,
    pressed_at: Option<Instant>,
    long_reported: bool,
}

impl SelectButton {
    pub const fn new() -> Self {
        Self {
            debouncer: Debouncer::new(),
            pressed_at: None,
            long_reported: false,
        }
    }

    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        match self.debouncer.update(pressed, now) {
            Some(true) => {
                self.pressed_at = Some(now);
                self.long_reported = false;
                None
            }
            Some(false) => {
                let short = self.pressed_at.take().is_some() && !self.long_reported;
                short.then_some(ButtonEvent::Select)
            }
            None => {
                let held = self.pressed_at?;
                if !self.long_reported && now.saturating_duration_since(held) >= LONG_PRESS {
                    self.long_reported = true;
                    return Some(ButtonEvent::SelectLong);
                }
                None
            }
        }
    }
}

/// Back button: reports on the debounced press edge.
#[derive(Copy, Clone, Debug, Default)]
pub struct BackButton {
    debouncer: Debouncer,
}

impl BackButton {
    pub const fn new() -> Self {
        Self {
            debouncer: Debouncer::new(),
        }
    }

    pub fn update(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        (self.debouncer.update(pressed, now) == Some(true)).then_some(ButtonEvent::Back)
    }
}

/// Gray-code step for `previous << 2 | current`; +1 is clockwise.
const TRANSITIONS: [i8; 16] = [0, 1, -1, 0, -1, 0, 0, 1, 1, 0, 0, -1, 0, -1, 1, 0];

/// Full-resolution decoder for a two-channel rotary encoder.
#[derive(Copy, Clone, Debug)]
pub struct QuadratureDecoder {
    state: u8,
    count: i32,
}

impl QuadratureDecoder {
    /// Starts from the current channel levels so power-up does not count.
    pub fn new(a: bool, b: bool) -> Self {
        Self {
            state: phase(a, b),
            count: 0,
        }
    }

    /// Feeds one sample of both channels; invalid double steps are ignored.
    pub fn update(&mut self, a: bool, b: bool) {
        let next = phase(a, b);
        let step = TRANSITIONS[usize::from((self.state << 2) | next)];
        self.count = self.count.wrapping_add(i32::from(step));
        self.state = next;
    }

    pub const fn count(&self) -> i32 {
        self.count
    }

    /// Position rounded to the nearest detent, so jitter on a detent does not
    /// move it.
    pub const fn detents(&self) -> i32 {
        (self.count + COUNTS_PER_DETENT / 2).div_euclid(COUNTS_PER_DETENT)
    }
}

fn phase(a: bool, b: bool) -> u8 {
    (u8::from(a) << 1) | u8::from(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Instant {
        Instant::from_millis(value)
    }

    /// Samples `pressed` every millisecond over `[from, to)`.
    fn hold<F>(mut feed: F, pressed: bool, from: u64, to: u64) -> Vec<ButtonEvent>
    where
        F: FnMut(bool, Instant) -> Option<ButtonEvent>,
    {
        (from..to).filter_map(|t| feed(pressed, ms(t))).collect()
    }

    #[test]
    fn debouncer_ignores_short_glitches() {
        let mut debouncer = Debouncer::new();
        assert_eq!(debouncer.update(true, ms(0)), None);
        assert_eq!(debouncer.update(false, ms(5)), None);
        assert_eq!(debouncer.update(false, ms(50)), None);
        assert!(!debouncer.is_pressed());

        assert_eq!(debouncer.update(true, ms(100)), None);
        assert_eq!(debouncer.update(true, ms(129)), None);
        assert_eq!(debouncer.update(true, ms(130)), Some(true));
        assert!(debouncer.is_pressed());
    }

    #[test]
    fn short_select_reports_on_release() {
        let mut button = SelectButton::new();
        let mut events = hold(|p, t| button.update(p, t), true, 0, 200);
        assert!(events.is_empty());

        events.extend(hold(|p, t| button.update(p, t), false, 200, 300));
        assert_eq!(events, [ButtonEvent::Select]);
    }

    #[test]
    fn long_select_reports_once_and_suppresses_short() {
        let mut button = SelectButton::new();
        let mut events = hold(|p, t| button.update(p, t), true, 0, 1_500);
        assert_eq!(events, [ButtonEvent::SelectLong]);

        events.extend(hold(|p, t| button.update(p, t), false, 1_500, 1_600));
        assert_eq!(events, [ButtonEvent::SelectLong]);
    }

    #[test]
    fn back_reports_on_press_edge() {
        let mut button = BackButton::new();
        let events = hold(|p, t| button.update(p, t), true, 0, 100);
        assert_eq!(events, [ButtonEvent::Back]);
        assert!(hold(|p, t| button.update(p, t), false, 100, 200).is_empty());
    }

    #[test]
    fn quadrature_counts_full_cycles_as_detents() {
        let clockwise = [(false, true), (true, true), (true, false), (false, false)];
        let mut decoder = QuadratureDecoder::new(false, false);

        for (a, b) in clockwise {
            decoder.update(a, b);
        }
        assert_eq!(decoder.count(), 4);
        assert_eq!(decoder.detents(), 1);

        for (a, b) in clockwise.iter().rev().skip(1).chain([(false, false)].iter()) {
            decoder.update(*a, *b);
        }
        assert_eq!(decoder.count(), 0);
        assert_eq!(decoder.detents(), 0);
    }

    #[test]
    fn quadrature_jitter_on_a_detent_is_ignored() {
        let mut decoder = QuadratureDecoder::new(false, false);
        decoder.update(true, false);
        assert_eq!(decoder.count(), -1);
        assert_eq!(decoder.detents(), 0);
        decoder.update(false, false);
        assert_eq!(decoder.count(), 0);

        // Both channels flipping at once is not a valid step.
        decoder.update(true, true);
        assert_eq!(decoder.count(), 0);
    }
}
