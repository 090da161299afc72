//! Modbus RTU framing for the RS-485 link.
//!
//! The link task only moves bytes: it assembles request frames on t3.5
//! silence and hands them to the control task through [`ModbusQueue`]. The
//! control task answers them against the register table between ticks, so the
//! table never needs a lock.

pub mod slave;

use crc::{CRC_16_MODBUS, Crc};
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

pub use slave::{Disposition, Exception, IgnoreReason, RtuSlave};

#[cfg(target_os = "none")]
type ModbusMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ModbusMutex = NoopRawMutex;

/// Largest RTU ADU: address, 253-byte PDU, CRC.
pub const MAX_ADU_SIZE: usize = 256;

/// Shortest frame worth checking: address, function, CRC.
pub const MIN_ADU_SIZE: usize = 4;

/// Requests in flight between the link and control tasks.
pub const MODBUS_QUEUE_DEPTH: usize = 2;

/// Address that every slave accepts but never answers.
pub const BROADCAST_ADDRESS: u8 = 0;

/// One RTU frame including its CRC.
pub type Frame = Vec<u8, MAX_ADU_SIZE>;

pub type FrameChannel = Channel<ModbusMutex, Frame, MODBUS_QUEUE_DEPTH>;
pub type FrameSender<'a> = Sender<'a, ModbusMutex, Frame, MODBUS_QUEUE_DEPTH>;
pub type FrameReceiver<'a> = Receiver<'a, ModbusMutex, Frame, MODBUS_QUEUE_DEPTH>;

/// Request and reply channels shared by the link and control tasks.
pub struct ModbusQueue {
    pub requests: FrameChannel,
    /// One entry per request; empty when nothing goes back on the wire.
    pub replies: FrameChannel,
}

impl ModbusQueue {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            replies: Channel::new(),
        }
    }

    /// Drops replies that arrived after their request timed out, so they are
    /// not sent as the answer to the next one. Returns how many were dropped.
    pub fn discard_stale_replies(&self) -> usize {
        let mut dropped = 0;
        while self.replies.try_receive().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16/MODBUS; goes on the wire low byte first.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// Checks the trailing CRC of a complete frame.
#[must_use]
pub fn crc_matches(frame: &[u8]) -> bool {
    let Some(split) = frame.len().checked_sub(2) else {
        return false;
    };
    let (body, crc) = frame.split_at(split);
    crc16(body).to_le_bytes() == [crc[0], crc[1]]
}

/// Collects received bytes until the line goes quiet.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Frame,
    overflowed: bool,
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Appends received bytes. Once the frame outgrows an ADU the rest of it
    /// is dropped.
    pub fn extend(&mut self, bytes: &[u8]) {
        if self.overflowed {
            return;
        }
        if self.buffer.extend_from_slice(bytes).is_err() {
            self.overflowed = true;
            self.buffer.clear();
        }
    }

    /// Ends the current frame on an inter-frame gap.
    ///
    /// Returns `None` for an empty or oversized frame.
    pub fn finish(&mut self) -> Option<Frame> {
        let overflowed = core::mem::replace(&mut self.overflowed, false);
        let frame = core::mem::take(&mut self.buffer);
        (!overflowed && !frame.is_empty()).then_some(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && !self.overflowed
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }
}
