//! RS-485 line settings edited from the serial menu.
//!
//! Every field is backed by a fixed choice set, so the configuration can never
//! hold a value the transport cannot apply. Rotation moves through a choice set
//! according to the field's [`RotationPolicy`].

use core::{fmt, time::Duration};

use crate::encoder::Rotation;

/// Supported line rates, in ascending order.
pub const BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

const DEFAULT_BAUD_INDEX: usize = 3;
const PARITIES: [Parity; 3] = [Parity::None, Parity::Even, Parity::Odd];
const DATA_BITS: [DataBits; 2] = [DataBits::Seven, DataBits::Eight];
const STOP_BITS: [StopBits; 2] = [StopBits::One, StopBits::Two];

/// Fixed inter-frame silence used by Modbus RTU above 19200 baud.
pub const RTU_FAST_FRAME_GAP: Duration = Duration::from_micros(1_750);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

impl Parity {
    /// Single-letter code used in frame format labels.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Even => "Even",
            Parity::Odd => "Odd",
        }
    }

    const fn index(self) -> usize {
        match self {
            Parity::None => 0,
            Parity::Even => 1,
            Parity::Odd => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl DataBits {
    #[must_use]
    pub const fn count(self) -> u32 {
        match self {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }

    const fn index(self) -> usize {
        match self {
            DataBits::Seven => 0,
            DataBits::Eight => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopBits {
    One,
    Two,
}

impl StopBits {
    #[must_use]
    pub const fn count(self) -> u32 {
        match self {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }

    const fn index(self) -> usize {
        match self {
            StopBits::One => 0,
            StopBits::Two => 1,
        }
    }
}

/// How a rotation step moves through a field's choice set.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RotationPolicy {
    /// Step by one, stopping at either end.
    Clamped,
    /// Step by one, wrapping around.
    Cyclic,
    /// Jump to the last choice on clockwise and the first on counter-clockwise.
    BinaryDirect,
}

impl RotationPolicy {
    /// Computes the next index in a choice set of `len` entries.
    #[must_use]
    pub const fn apply(self, index: usize, len: usize, rotation: Rotation) -> usize {
        let last = len.saturating_sub(1);
        match (self, rotation) {
            (RotationPolicy::Clamped, Rotation::Clockwise) => {
                if index < last {
                    index + 1
                } else {
                    last
                }
            }
            (RotationPolicy::Clamped, Rotation::CounterClockwise) => index.saturating_sub(1),
            (RotationPolicy::Cyclic, Rotation::Clockwise) => {
                if index >= last {
                    0
                } else {
                    index + 1
                }
            }
            (RotationPolicy::Cyclic, Rotation::CounterClockwise) => {
                if index == 0 {
                    last
                } else {
                    index - 1
                }
            }
            (RotationPolicy::BinaryDirect, Rotation::Clockwise) => last,
            (RotationPolicy::BinaryDirect, Rotation::CounterClockwise) => 0,
        }
    }
}

/// Editable rows of the serial menu, in display order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SerialField {
    Baud,
    Parity,
    DataBits,
    StopBits,
}

impl SerialField {
    pub const COUNT: usize = 4;
    pub const ALL: [SerialField; Self::COUNT] = [
        SerialField::Baud,
        SerialField::Parity,
        SerialField::DataBits,
        SerialField::StopBits,
    ];

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            SerialField::Baud => 0,
            SerialField::Parity => 1,
            SerialField::DataBits => 2,
            SerialField::StopBits => 3,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SerialField::Baud => "Baud",
            SerialField::Parity => "Parity",
            SerialField::DataBits => "Data bits",
            SerialField::StopBits => "Stop bits",
        }
    }

    /// Rotation behaviour for the field.
    #[must_use]
    pub const fn policy(self) -> RotationPolicy {
        match self {
            SerialField::Baud => RotationPolicy::Clamped,
            SerialField::Parity => RotationPolicy::Cyclic,
            SerialField::DataBits | SerialField::StopBits => RotationPolicy::BinaryDirect,
        }
    }
}

impl fmt::Display for SerialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Line settings for the RS-485 transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SerialConfig {
    baud_index: usize,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl SerialConfig {
    /// 9600 baud, 8 data bits, no parity, 1 stop bit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            baud_index: DEFAULT_BAUD_INDEX,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Returns the configuration at `baud`, or `None` for unsupported rates.
    #[must_use]
    pub fn with_baud(self, baud: u32) -> Option<Self> {
        BAUD_RATES
            .iter()
            .position(|rate| *rate == baud)
            .map(|baud_index| Self { baud_index, ..self })
    }

    #[must_use]
    pub const fn baud(&self) -> u32 {
        BAUD_RATES[self.baud_index]
    }

    /// Moves `field` one step in the rotation direction. Returns `true` when
    /// the configuration changed.
    pub fn rotate(&mut self, field: SerialField, rotation: Rotation) -> bool {
        let before = *self;
        let policy = field.policy();
        match field {
            SerialField::Baud => {
                self.baud_index = policy.apply(self.baud_index, BAUD_RATES.len(), rotation);
            }
            SerialField::Parity => {
                self.parity = PARITIES[policy.apply(self.parity.index(), PARITIES.len(), rotation)];
            }
            SerialField::DataBits => {
                self.data_bits =
                    DATA_BITS[policy.apply(self.data_bits.index(), DATA_BITS.len(), rotation)];
            }
            SerialField::StopBits => {
                self.stop_bits =
                    STOP_BITS[policy.apply(self.stop_bits.index(), STOP_BITS.len(), rotation)];
            }
        }
        *self != before
    }

    /// Returns the displayed value of a single field.
    #[must_use]
    pub const fn field_value(&self, field: SerialField) -> FieldValue {
        match field {
            SerialField::Baud => FieldValue::Number(self.baud()),
            SerialField::Parity => FieldValue::Text(self.parity.label()),
            SerialField::DataBits => FieldValue::Number(self.data_bits.count()),
            SerialField::StopBits => FieldValue::Number(self.stop_bits.count()),
        }
    }

    /// Compact frame label such as `8N1`.
    #[must_use]
    pub const fn frame_format(&self) -> FrameFormat {
        FrameFormat {
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }

    /// Bits on the wire per character, including start and parity bits.
    #[must_use]
    pub const fn bits_per_character(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        1 + self.data_bits.count() + parity + self.stop_bits.count()
    }

    /// Silence that terminates an RTU frame (3.5 character times).
    #[must_use]
    pub fn rtu_frame_gap(&self) -> Duration {
        let baud = self.baud();
        if baud > 19_200 {
            return RTU_FAST_FRAME_GAP;
        }
        let bits = u64::from(self.bits_per_character());
        let micros = 35 * bits * 1_000_000 / (10 * u64::from(baud));
        Duration::from_micros(micros)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SerialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.baud(), self.frame_format())
    }
}

/// Renderable value of a serial field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldValue {
    Number(u32),
    Text(&'static str),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Data bits, parity and stop bits rendered as `8N1`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameFormat {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.data_bits.count(),
            self.parity.code(),
            self.stop_bits.count()
        )
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write;

    use heapless::String;

    use super::*;

    fn render(value: impl fmt::Display) -> String<16> {
        let mut out = String::new();
        write!(out, "{value}").expect("label fits");
        out
    }

    #[test]
    fn baud_steps_are_clamped() {
        let mut config = SerialConfig::new();
        assert_eq!(config.baud(), 9600);
        assert!(config.rotate(SerialField::Baud, Rotation::CounterClockwise));
        assert_eq!(config.baud(), 4800);

        let mut config = SerialConfig::new().with_baud(115_200).expect("supported rate");
        for _ in 0..5 {
            assert!(!config.rotate(SerialField::Baud, Rotation::Clockwise));
        }
        assert_eq!(config.baud(), 115_200);

        let mut config = SerialConfig::new().with_baud(1200).expect("supported rate");
        assert!(!config.rotate(SerialField::Baud, Rotation::CounterClockwise));
        assert_eq!(config.baud(), 1200);
    }

    #[test]
    fn parity_cycles_in_both_directions() {
        let mut config = SerialConfig::new();
        config.rotate(SerialField::Parity, Rotation::CounterClockwise);
        assert_eq!(config.parity, Parity::Odd);
        config.rotate(SerialField::Parity, Rotation::Clockwise);
        assert_eq!(config.parity, Parity::None);
        config.rotate(SerialField::Parity, Rotation::Clockwise);
        assert_eq!(config.parity, Parity::Even);
    }

    #[test]
    fn binary_fields_jump_by_direction() {
        let mut config = SerialConfig::new();
        assert!(!config.rotate(SerialField::DataBits, Rotation::Clockwise));
        assert!(config.rotate(SerialField::DataBits, Rotation::CounterClockwise));
        assert_eq!(config.data_bits, DataBits::Seven);
        assert!(!config.rotate(SerialField::DataBits, Rotation::CounterClockwise));

        assert!(config.rotate(SerialField::StopBits, Rotation::Clockwise));
        assert_eq!(config.stop_bits, StopBits::Two);
        assert!(!config.rotate(SerialField::StopBits, Rotation::Clockwise));
    }

    #[test]
    fn rejects_unsupported_baud() {
        assert!(SerialConfig::new().with_baud(14_400).is_none());
    }

    #[test]
    fn formats_frame_labels() {
        let mut config = SerialConfig::new();
        assert_eq!(render(config), "9600 8N1");

        config.rotate(SerialField::DataBits, Rotation::CounterClockwise);
        config.rotate(SerialField::Parity, Rotation::Clockwise);
        config.rotate(SerialField::StopBits, Rotation::Clockwise);
        assert_eq!(render(config.frame_format()), "7E2");
        assert_eq!(render(config.field_value(SerialField::Parity)), "Even");
        assert_eq!(render(config.field_value(SerialField::Baud)), "9600");
    }

    #[test]
    fn frame_gap_tracks_character_time() {
        let config = SerialConfig::new();
        assert_eq!(config.bits_per_character(), 10);
        // 3.5 * 10 bits at 9600 baud.
        assert_eq!(config.rtu_frame_gap(), Duration::from_micros(3_645));

        let fast = config.with_baud(38_400).expect("supported rate");
        assert_eq!(fast.rtu_frame_gap(), RTU_FAST_FRAME_GAP);
    }
}
