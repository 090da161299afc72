//! Parameter store shared by the display, the navigation state machine, and
//! the register sync engine.
//!
//! The simulator exposes a fixed catalog of water-quality measurements. Each
//! entry is created once at startup and mutated in place; callers address
//! entries through [`ParameterId`], a stable index into the store. Every write
//! goes through the store so the `min_val <= value <= max_val` invariant holds
//! after each mutation.

use core::fmt;

use crate::encoder::Rotation;

/// Number of parameters published by the simulator.
pub const PARAMETER_COUNT: usize = 7;

/// Stable index of a parameter inside the [`ParameterStore`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ParameterId(usize);

impl ParameterId {
    /// Attempts to build an identifier from a raw store index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < PARAMETER_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Returns the position of the parameter inside the store.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Iterates over every identifier in catalog order.
    pub fn all() -> impl Iterator<Item = ParameterId> {
        (0..PARAMETER_COUNT).map(ParameterId)
    }
}

/// Errors reported when resolving parameters by register address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParameterError {
    /// No parameter is mapped to the requested register address.
    UnknownAddress(u16),
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::UnknownAddress(address) => {
                write!(f, "no parameter mapped to register {address}")
            }
        }
    }
}

/// Result of writing a candidate value into a parameter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SetOutcome {
    /// The stored value differs from the previous one.
    pub changed: bool,
    /// The candidate fell outside `[min_val, max_val]` and was pinned to a bound.
    pub clamped: bool,
}

/// A single measurement with bounds, resolution, and register mapping.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: &'static str,
    pub unit: &'static str,
    pub min_val: f32,
    pub max_val: f32,
    /// UI increment; also the scaling divisor for register encoding.
    pub step: f32,
    pub register_address: u16,
    value: f32,
}

impl Parameter {
    pub const fn new(
        name: &'static str,
        unit: &'static str,
        min_val: f32,
        max_val: f32,
        step: f32,
        register_address: u16,
        value: f32,
    ) -> Self {
        Self {
            name,
            unit,
            min_val,
            max_val,
            step,
            register_address,
            value,
        }
    }

    /// Returns the current authoritative value.
    #[must_use]
    pub const fn value(&self) -> f32 {
        self.value
    }

    /// Pins a candidate into `[min_val, max_val]`, reporting whether it moved.
    #[must_use]
    pub fn clamp(&self, candidate: f32) -> (f32, bool) {
        if candidate < self.min_val {
            (self.min_val, true)
        } else if candidate > self.max_val {
            (self.max_val, true)
        } else {
            (candidate, false)
        }
    }

    /// Number of decimals used when rendering the value.
    #[must_use]
    pub fn decimals(&self) -> usize {
        if self.step < 0.1 { 2 } else { 0 }
    }

    /// Midpoint between the bounds.
    #[must_use]
    pub fn midpoint(&self) -> f32 {
        self.min_val + (self.max_val - self.min_val) / 2.0
    }

    /// Half a resolution step; the smallest change treated as meaningful.
    #[must_use]
    pub fn half_step(&self) -> f32 {
        self.step * 0.5
    }

    fn set(&mut self, candidate: f32) -> SetOutcome {
        let (next, clamped) = self.clamp(candidate);
        let changed = next != self.value;
        self.value = next;
        SetOutcome { changed, clamped }
    }

    fn nudge(&mut self, rotation: Rotation) -> bool {
        let delta = match rotation {
            Rotation::Clockwise => self.step,
            Rotation::CounterClockwise => -self.step,
        };
        let (next, _) = self.clamp(self.value + delta);
        if abs_f32(next - self.value) >= self.half_step() {
            self.value = next;
            true
        } else {
            false
        }
    }
}

/// `f32::abs` is not available without `std` on every toolchain we target.
#[must_use]
pub(crate) fn abs_f32(value: f32) -> f32 {
    if value < 0.0 { -value } else { value }
}

/// Compile-time catalog of the simulated measurements.
///
/// NH3-N nominally spans 0–1000 mg/L, but its register encoding saturates at
/// `65535 * 0.01`, so the bound stops at the largest representable value.
pub const DEFAULT_PARAMETERS: [Parameter; PARAMETER_COUNT] = [
    Parameter::new("pH", "pH", 0.0, 14.0, 0.01, 1, 7.0),
    Parameter::new("TDS", "ppm", 0.0, 1008.0, 1.0, 2, 500.0),
    // Turbidity.
    Parameter::new("TSS", "NTU", 0.0, 1000.0, 1.0, 3, 100.0),
    Parameter::new("COD", "mg/L", 0.0, 1300.0, 1.0, 4, 200.0),
    Parameter::new("BOD", "mg/L", 0.0, 350.0, 1.0, 5, 50.0),
    Parameter::new("DO", "mg/L", 0.0, 20.0, 0.01, 6, 8.0),
    Parameter::new("NH3-N", "mg/L", 0.0, 655.35, 0.01, 7, 5.0),
];

/// Owner of every [`Parameter`] instance.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterStore {
    entries: [Parameter; PARAMETER_COUNT],
}

impl ParameterStore {
    /// Creates a store populated with [`DEFAULT_PARAMETERS`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_entries(DEFAULT_PARAMETERS)
    }

    /// Creates a store from an explicit catalog.
    #[must_use]
    pub const fn with_entries(entries: [Parameter; PARAMETER_COUNT]) -> Self {
        Self { entries }
    }

    /// Number of parameters in the store.
    #[must_use]
    pub const fn len(&self) -> usize {
        PARAMETER_COUNT
    }

    /// Always `false`; the catalog is never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns the parameter behind `id`.
    #[must_use]
    pub fn get(&self, id: ParameterId) -> &Parameter {
        &self.entries[id.index()]
    }

    /// Returns the current value of `id`.
    #[must_use]
    pub fn value(&self, id: ParameterId) -> f32 {
        self.entries[id.index()].value
    }

    /// Writes a candidate value, clamping it to the parameter bounds.
    pub fn set_value(&mut self, id: ParameterId, candidate: f32) -> SetOutcome {
        self.entries[id.index()].set(candidate)
    }

    /// Moves the value by one resolution step in the rotation direction.
    ///
    /// Returns `true` when the value changed (it stays put at a bound).
    pub fn step(&mut self, id: ParameterId, rotation: Rotation) -> bool {
        self.entries[id.index()].nudge(rotation)
    }

    /// Resolves the parameter mapped to a register address.
    pub fn id_for_address(&self, address: u16) -> Result<ParameterId, ParameterError> {
        self.entries
            .iter()
            .position(|entry| entry.register_address == address)
            .and_then(ParameterId::from_index)
            .ok_or(ParameterError::UnknownAddress(address))
    }

    /// Iterates over `(id, parameter)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterId, &Parameter)> {
        ParameterId::all().zip(self.entries.iter())
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}
