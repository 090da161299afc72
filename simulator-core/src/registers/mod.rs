//! Holding-register codec and table abstractions.
//!
//! Parameters travel over the field bus as unsigned 16-bit integers scaled by
//! the parameter resolution (`raw = round(value / step)`), which lets a 16-bit
//! channel carry 0.01 pH resolution without a floating-point wire format.
//! The register table itself belongs to the transport; the core only touches
//! it through [`RegisterTable`].

use core::fmt;

use heapless::Vec;

use crate::params::{PARAMETER_COUNT, Parameter, ParameterStore};

/// Modbus slave identity answered by the simulator.
pub const SLAVE_ID: u8 = 1;

/// Encodes the parameter's current value as a raw register word.
///
/// Results are rounded to the nearest step and saturate to `0..=65535`;
/// negative or non-finite quotients encode as zero.
#[must_use]
pub fn to_register(param: &Parameter) -> u16 {
    encode(param.value(), param.step)
}

/// Decodes a raw register word into the parameter's engineering units.
#[must_use]
pub fn from_register(param: &Parameter, raw: u16) -> f32 {
    f32::from(raw) * param.step
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode(value: f32, step: f32) -> u16 {
    let scaled = value / step;
    // NaN fails this comparison too.
    if !(scaled > 0.0) {
        return 0;
    }

    let rounded = scaled + 0.5;
    if rounded >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        // Truncation of a positive value after the half offset rounds to nearest.
        rounded as u16
    }
}

/// Errors surfaced by register table implementations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterError {
    /// No holding register exists at the address.
    Unmapped(u16),
    /// The table has no room for another register.
    BankFull,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::Unmapped(address) => write!(f, "register {address} is not mapped"),
            RegisterError::BankFull => f.write_str("register bank is full"),
        }
    }
}

/// Address-keyed access to the transport's holding registers.
pub trait RegisterTable {
    /// Returns the raw value stored at `address`, if the register exists.
    fn read(&self, address: u16) -> Option<u16>;

    /// Stores a raw value at an existing register.
    fn write(&mut self, address: u16, value: u16) -> Result<(), RegisterError>;

    /// Maps a register at `address` holding `value`, overwriting any existing
    /// word.
    fn add(&mut self, address: u16, value: u16) -> Result<(), RegisterError>;

    /// Copies `out.len()` consecutive registers starting at `start`.
    ///
    /// Fails at the first unmapped address in the range.
    fn read_block(&self, start: u16, out: &mut [u16]) -> Result<(), RegisterError> {
        for (offset, word) in out.iter_mut().enumerate() {
            let address = block_address(start, offset)?;
            *word = self.read(address).ok_or(RegisterError::Unmapped(address))?;
        }
        Ok(())
    }

    /// Writes consecutive registers starting at `start`.
    ///
    /// The whole range is validated before any register changes.
    fn write_block(&mut self, start: u16, values: &[u16]) -> Result<(), RegisterError> {
        for offset in 0..values.len() {
            let address = block_address(start, offset)?;
            if self.read(address).is_none() {
                return Err(RegisterError::Unmapped(address));
            }
        }

        for (offset, value) in values.iter().enumerate() {
            self.write(block_address(start, offset)?, *value)?;
        }
        Ok(())
    }
}

/// Single holding register slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HoldingRegister {
    pub address: u16,
    pub value: u16,
}

/// Fixed-capacity holding register table.
///
/// Firmware and emulator both use this as the concrete table the transport
/// serves; tests use it as the remote peer's view.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegisterBank<const CAPACITY: usize = PARAMETER_COUNT> {
    registers: Vec<HoldingRegister, CAPACITY>,
}

impl<const CAPACITY: usize> RegisterBank<CAPACITY> {
    /// Creates an empty bank.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registers: Vec::new(),
        }
    }

    /// Creates a bank with one register per parameter, preloaded with the
    /// encoded current values.
    pub fn with_parameters(store: &ParameterStore) -> Result<Self, RegisterError> {
        let mut bank = Self::new();
        for (_, param) in store.iter() {
            bank.add(param.register_address, to_register(param))?;
        }
        Ok(bank)
    }

    /// Iterates over every register in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &HoldingRegister> {
        self.registers.iter()
    }

    /// Number of mapped registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Returns `true` when no registers are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    fn slot_mut(&mut self, address: u16) -> Option<&mut HoldingRegister> {
        self.registers
            .iter_mut()
            .find(|slot| slot.address == address)
    }
}

fn block_address(start: u16, offset: usize) -> Result<u16, RegisterError> {
    u16::try_from(offset)
        .ok()
        .and_then(|offset| start.checked_add(offset))
        .ok_or(RegisterError::Unmapped(u16::MAX))
}

impl<const CAPACITY: usize> RegisterTable for RegisterBank<CAPACITY> {
    fn read(&self, address: u16) -> Option<u16> {
        self.registers
            .iter()
            .find(|slot| slot.address == address)
            .map(|slot| slot.value)
    }

    fn write(&mut self, address: u16, value: u16) -> Result<(), RegisterError> {
        let slot = self
            .slot_mut(address)
            .ok_or(RegisterError::Unmapped(address))?;
        slot.value = value;
        Ok(())
    }

    fn add(&mut self, address: u16, value: u16) -> Result<(), RegisterError> {
        if let Some(slot) = self.slot_mut(address) {
            slot.value = value;
            return Ok(());
        }

        self.registers
            .push(HoldingRegister { address, value })
            .map_err(|_| RegisterError::BankFull)
    }
}
