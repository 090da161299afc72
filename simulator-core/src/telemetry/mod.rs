//! Telemetry event catalog and the in-memory ring that records it.
//!
//! Events serialize to compact numeric codes so the firmware can forward them
//! over `defmt` and the emulator can print them from the `log` command. Payloads
//! carry the register or serial details that explain each event while staying
//! `no_std` and allocation free.

use core::{convert::TryFrom, fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::navigation::Screen;
use crate::params::ParameterId;
use crate::serial::SerialConfig;

/// Monotonic identifier assigned to every record.
pub type EventId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// A remote register write was accepted into the store.
    InboundAccepted(ParameterId),
    /// A remote register write was accepted after pinning it to a bound.
    InboundClamped(ParameterId),
    /// The operator saved a parameter from the edit screen.
    LocalCommit(ParameterId),
    /// The throttled outbound pass rewrote one or more registers.
    OutboundPushed,
    /// The transport was reinitialised with new line settings.
    SerialApplied,
    ScreenEntered(Screen),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::InboundAccepted(id) => {
                write!(f, "inbound-accepted #{}", id.index())
            }
            TelemetryEventKind::InboundClamped(id) => write!(f, "inbound-clamped #{}", id.index()),
            TelemetryEventKind::LocalCommit(id) => write!(f, "local-commit #{}", id.index()),
            TelemetryEventKind::OutboundPushed => f.write_str("outbound-pushed"),
            TelemetryEventKind::SerialApplied => f.write_str("serial-applied"),
            TelemetryEventKind::ScreenEntered(screen) => write!(f, "screen-entered {screen}"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const INBOUND_ACCEPTED_BASE: u16 = 0x0000;
    const INBOUND_CLAMPED_BASE: u16 = 0x0010;
    const LOCAL_COMMIT_BASE: u16 = 0x0020;
    const OUTBOUND_PUSHED_CODE: u16 = 0x0030;
    const SERIAL_APPLIED_CODE: u16 = 0x0031;
    const SCREEN_ENTERED_BASE: u16 = 0x0040;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::InboundAccepted(id) => {
                Self::INBOUND_ACCEPTED_BASE + offset(id.index())
            }
            TelemetryEventKind::InboundClamped(id) => {
                Self::INBOUND_CLAMPED_BASE + offset(id.index())
            }
            TelemetryEventKind::LocalCommit(id) => Self::LOCAL_COMMIT_BASE + offset(id.index()),
            TelemetryEventKind::OutboundPushed => Self::OUTBOUND_PUSHED_CODE,
            TelemetryEventKind::SerialApplied => Self::SERIAL_APPLIED_CODE,
            TelemetryEventKind::ScreenEntered(screen) => {
                Self::SCREEN_ENTERED_BASE + offset(screen.index())
            }
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let decode = |base: u16| usize::from(code - base);
        match code {
            Self::OUTBOUND_PUSHED_CODE => TelemetryEventKind::OutboundPushed,
            Self::SERIAL_APPLIED_CODE => TelemetryEventKind::SerialApplied,
            value if (Self::INBOUND_ACCEPTED_BASE..Self::INBOUND_CLAMPED_BASE).contains(&value) => {
                ParameterId::from_index(decode(Self::INBOUND_ACCEPTED_BASE))
                    .map_or(TelemetryEventKind::Custom(value), |id| {
                        TelemetryEventKind::InboundAccepted(id)
                    })
            }
            value if (Self::INBOUND_CLAMPED_BASE..Self::LOCAL_COMMIT_BASE).contains(&value) => {
                ParameterId::from_index(decode(Self::INBOUND_CLAMPED_BASE))
                    .map_or(TelemetryEventKind::Custom(value), |id| {
                        TelemetryEventKind::InboundClamped(id)
                    })
            }
            value if (Self::LOCAL_COMMIT_BASE..Self::OUTBOUND_PUSHED_CODE).contains(&value) => {
                ParameterId::from_index(decode(Self::LOCAL_COMMIT_BASE))
                    .map_or(TelemetryEventKind::Custom(value), |id| {
                        TelemetryEventKind::LocalCommit(id)
                    })
            }
            value
                if (Self::SCREEN_ENTERED_BASE..Self::SCREEN_ENTERED_BASE + offset(Screen::COUNT))
                    .contains(&value) =>
            {
                Screen::from_index(decode(Self::SCREEN_ENTERED_BASE))
                    .map_or(TelemetryEventKind::Custom(value), |screen| {
                        TelemetryEventKind::ScreenEntered(screen)
                    })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Catalog and screen indices stay far below `u16::MAX`.
#[allow(clippy::cast_possible_truncation)]
const fn offset(index: usize) -> u16 {
    index as u16
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    Register(RegisterTelemetry),
    Outbound(OutboundTelemetry),
    Serial(SerialConfig),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Register(details) => {
                write!(f, "reg={} raw={}", details.address, details.raw)
            }
            TelemetryPayload::Outbound(details) => {
                write!(f, "written={}", details.written)?;
                if let Some(since) = details.since_previous {
                    write!(f, " since={}ms", since.as_millis())?;
                }
                Ok(())
            }
            TelemetryPayload::Serial(config) => write!(f, "{config}"),
        }
    }
}

/// Register word involved in an inbound or commit event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegisterTelemetry {
    pub address: u16,
    pub raw: u16,
}

impl RegisterTelemetry {
    #[must_use]
    pub const fn new(address: u16, raw: u16) -> Self {
        Self { address, raw }
    }
}

/// Summary of an outbound pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutboundTelemetry {
    pub written: u8,
    /// Time since the previous pass that wrote anything.
    pub since_previous: Option<Duration>,
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry and sync timing.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_outbound_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_outbound_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns records whose id is at least `first`, oldest first.
    ///
    /// Consumers that forward telemetry keep the next id they expect and call
    /// this on every tick.
    pub fn since(&self, first: EventId) -> impl Iterator<Item = &TelemetryRecord<TInstant>> {
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id >= first)
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Identifier the next record will receive.
    pub fn next_id(&self) -> EventId {
        self.next_event_id
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records a remote write accepted by the inbound pass.
    pub fn record_inbound(
        &mut self,
        id: ParameterId,
        register: RegisterTelemetry,
        clamped: bool,
        timestamp: TInstant,
    ) -> EventId {
        let event = if clamped {
            TelemetryEventKind::InboundClamped(id)
        } else {
            TelemetryEventKind::InboundAccepted(id)
        };
        self.record(event, TelemetryPayload::Register(register), timestamp)
    }

    /// Records an explicit save from the edit screen.
    pub fn record_commit(
        &mut self,
        id: ParameterId,
        register: RegisterTelemetry,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            TelemetryEventKind::LocalCommit(id),
            TelemetryPayload::Register(register),
            timestamp,
        )
    }

    /// Records an outbound pass and the time since the previous one.
    pub fn record_outbound(&mut self, written: usize, timestamp: TInstant) -> EventId {
        let since_previous = self
            .last_outbound_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_outbound_at = Some(timestamp);

        let payload = TelemetryPayload::Outbound(OutboundTelemetry {
            written: truncate_count(written),
            since_previous,
        });
        self.record(TelemetryEventKind::OutboundPushed, payload, timestamp)
    }

    /// Records a transport reinitialisation.
    pub fn record_serial_applied(&mut self, config: SerialConfig, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::SerialApplied,
            TelemetryPayload::Serial(config),
            timestamp,
        )
    }

    pub fn record_screen(&mut self, screen: Screen, timestamp: TInstant) -> EventId {
        self.record(
            TelemetryEventKind::ScreenEntered(screen),
            TelemetryPayload::none(),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}
