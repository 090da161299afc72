//! Bidirectional reconciliation between the parameter store and the register
//! table.
//!
//! Two writers touch every parameter: the operator through the rotary menu and
//! a remote master through holding registers. The engine runs an inbound pass
//! every tick and a throttled outbound pass, and keeps a shadow copy of the
//! last raw word it observed or wrote per register. Inbound only considers
//! registers whose raw value moved away from the shadow, so a local edit that
//! has not been exported yet is never overwritten by the stale table word.
//!
//! The flip side: a remote write that stores the very word the shadow already
//! holds is indistinguishable from no write. While a local edit is pending
//! export, such a write is ignored and the next outbound pass replaces it with
//! the local value. Local edits win that race.

use core::time::Duration;

use heapless::Vec;

use crate::params::{PARAMETER_COUNT, ParameterId, ParameterStore, abs_f32};
use crate::registers::{RegisterError, RegisterTable, from_register, to_register};
use crate::telemetry::TelemetryInstant;

/// Minimum interval between outbound passes.
pub const OUTBOUND_SYNC_PERIOD: Duration = Duration::from_millis(300);

/// Parameter updated from a remote register write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InboundChange {
    pub id: ParameterId,
    pub address: u16,
    pub raw: u16,
    /// The decoded value fell outside the bounds and was pinned.
    pub clamped: bool,
}

/// Parameters updated by one inbound pass, in catalog order.
pub type InboundReport = Vec<InboundChange, PARAMETER_COUNT>;

/// Register-side shadow state and outbound scheduling.
#[derive(Clone, Debug)]
pub struct SyncEngine<TInstant> {
    shadows: [Option<u16>; PARAMETER_COUNT],
    last_outbound: Option<TInstant>,
    period: Duration,
}

impl<TInstant> SyncEngine<TInstant>
where
    TInstant: TelemetryInstant,
{
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self {
            shadows: [None; PARAMETER_COUNT],
            last_outbound: None,
            period,
        }
    }

    /// Maps every parameter into the table with its current encoded value.
    pub fn preload<T>(&mut self, store: &ParameterStore, table: &mut T) -> Result<(), RegisterError>
    where
        T: RegisterTable + ?Sized,
    {
        for (id, param) in store.iter() {
            let raw = to_register(param);
            table.add(param.register_address, raw)?;
            self.shadows[id.index()] = Some(raw);
        }
        Ok(())
    }

    /// Pulls remote writes into the store.
    ///
    /// A register is only decoded when its raw word differs from the shadow.
    /// The decoded candidate replaces the stored value when it differs by at
    /// least half a step; smaller moves are absorbed without changing the store.
    pub fn inbound<T>(&mut self, store: &mut ParameterStore, table: &T) -> InboundReport
    where
        T: RegisterTable + ?Sized,
    {
        let mut report = InboundReport::new();

        for id in ParameterId::all() {
            let param = store.get(id);
            let address = param.register_address;
            let Some(raw) = table.read(address) else {
                continue;
            };

            let shadow = &mut self.shadows[id.index()];
            if *shadow == Some(raw) {
                continue;
            }
            *shadow = Some(raw);

            let candidate = from_register(param, raw);
            if abs_f32(candidate - param.value()) < param.half_step() {
                continue;
            }

            let outcome = store.set_value(id, candidate);
            if outcome.changed {
                // One entry per parameter; the report cannot overflow.
                let _ = report.push(InboundChange {
                    id,
                    address,
                    raw,
                    clamped: outcome.clamped,
                });
            }
        }

        report
    }

    /// Returns `true` when an outbound pass may run at `now`.
    pub fn outbound_due(&self, now: TInstant) -> bool {
        self.last_outbound
            .is_none_or(|last| now.saturating_duration_since(last) >= self.period)
    }

    /// Exports every parameter whose encoded value differs from the table.
    ///
    /// Does nothing and returns zero when called before the period elapsed.
    /// Returns the number of registers rewritten.
    pub fn outbound<T>(
        &mut self,
        now: TInstant,
        store: &ParameterStore,
        table: &mut T,
    ) -> Result<usize, RegisterError>
    where
        T: RegisterTable + ?Sized,
    {
        if !self.outbound_due(now) {
            return Ok(0);
        }
        self.last_outbound = Some(now);

        let mut written = 0;
        for (id, param) in store.iter() {
            let raw = to_register(param);
            if table.read(param.register_address) != Some(raw) {
                table.write(param.register_address, raw)?;
                written += 1;
            }
            self.shadows[id.index()] = Some(raw);
        }
        Ok(written)
    }

    /// Writes one parameter to its register immediately, outside the throttle.
    pub fn commit<T>(
        &mut self,
        id: ParameterId,
        store: &ParameterStore,
        table: &mut T,
    ) -> Result<u16, RegisterError>
    where
        T: RegisterTable + ?Sized,
    {
        let param = store.get(id);
        let raw = to_register(param);
        table.write(param.register_address, raw)?;
        self.shadows[id.index()] = Some(raw);
        Ok(raw)
    }

    /// Last raw word observed or written for `id`.
    #[must_use]
    pub fn shadow(&self, id: ParameterId) -> Option<u16> {
        self.shadows[id.index()]
    }

    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl<TInstant> Default for SyncEngine<TInstant>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new(OUTBOUND_SYNC_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Rotation;
    use crate::registers::RegisterBank;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl MicrosInstant {
        const fn from_millis(value: u64) -> Self {
            Self(value * 1_000)
        }
    }

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    fn id(index: usize) -> ParameterId {
        ParameterId::from_index(index).expect("index in range")
    }

    fn fixture() -> (SyncEngine<MicrosInstant>, ParameterStore, RegisterBank) {
        let mut engine = SyncEngine::default();
        let store = ParameterStore::new();
        let mut bank = RegisterBank::new();
        engine
            .preload(&store, &mut bank)
            .expect("catalog fits the bank");
        (engine, store, bank)
    }

    #[test]
    fn preload_seeds_table_and_shadows() {
        let (engine, _, bank) = fixture();
        assert_eq!(bank.read(1), Some(700));
        assert_eq!(engine.shadow(id(0)), Some(700));
    }

    #[test]
    fn inbound_accepts_remote_writes() {
        let (mut engine, mut store, mut bank) = fixture();
        bank.write(1, 725).expect("mapped");

        let report = engine.inbound(&mut store, &bank);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].id, id(0));
        assert!(!report[0].clamped);
        assert!(abs_f32(store.value(id(0)) - 7.25) < 0.001);
        assert_eq!(engine.shadow(id(0)), Some(725));
    }

    #[test]
    fn inbound_clamps_out_of_range_words() {
        let (mut engine, mut store, mut bank) = fixture();
        bank.write(5, 9_999).expect("mapped");

        let report = engine.inbound(&mut store, &bank);
        assert_eq!(report.len(), 1);
        assert!(report[0].clamped);
        assert_eq!(store.value(id(4)), 350.0);
    }

    #[test]
    fn hysteresis_rejects_moves_below_half_a_step() {
        let (mut engine, mut store, mut bank) = fixture();
        let tds = id(1);

        store.set_value(tds, 500.6);
        bank.write(2, 501).expect("mapped");
        assert!(engine.inbound(&mut store, &bank).is_empty());
        assert!(abs_f32(store.value(tds) - 500.6) < 0.001);
        assert_eq!(engine.shadow(tds), Some(501));

        store.set_value(tds, 500.4);
        bank.write(2, 500).expect("mapped");
        assert!(engine.inbound(&mut store, &bank).is_empty());

        bank.write(2, 501).expect("mapped");
        let report = engine.inbound(&mut store, &bank);
        assert_eq!(report.len(), 1);
        assert_eq!(store.value(tds), 501.0);
    }

    #[test]
    fn hysteresis_accepts_exactly_half_a_step() {
        let (mut engine, mut store, mut bank) = fixture();
        let tds = id(1);

        store.set_value(tds, 500.5);
        bank.write(2, 501).expect("mapped");
        assert_eq!(engine.inbound(&mut store, &bank).len(), 1);
        assert_eq!(store.value(tds), 501.0);
    }

    #[test]
    fn stale_table_does_not_revert_local_edit() {
        let (mut engine, mut store, mut bank) = fixture();
        let ph = id(0);

        assert!(store.step(ph, Rotation::Clockwise));
        assert!(engine.inbound(&mut store, &bank).is_empty());
        assert!(abs_f32(store.value(ph) - 7.01) < 0.001);

        let written = engine
            .outbound(MicrosInstant::from_millis(0), &store, &mut bank)
            .expect("mapped");
        assert_eq!(written, 1);
        assert_eq!(bank.read(1), Some(701));
    }

    #[test]
    fn remote_write_of_the_shadowed_word_loses_to_pending_local_edit() {
        let (mut engine, mut store, mut bank) = fixture();
        let ph = id(0);

        assert!(store.step(ph, Rotation::Clockwise));
        bank.write(1, 700).expect("mapped");
        assert!(engine.inbound(&mut store, &bank).is_empty());
        assert!(abs_f32(store.value(ph) - 7.01) < 0.001);

        engine
            .outbound(MicrosInstant::from_millis(0), &store, &mut bank)
            .expect("mapped");
        assert_eq!(bank.read(1), Some(701));
    }

    #[test]
    fn outbound_is_throttled() {
        let (mut engine, mut store, mut bank) = fixture();
        let cod = id(3);

        engine
            .outbound(MicrosInstant::from_millis(0), &store, &mut bank)
            .expect("mapped");
        store.set_value(cod, 250.0);

        assert!(!engine.outbound_due(MicrosInstant::from_millis(299)));
        assert_eq!(
            engine
                .outbound(MicrosInstant::from_millis(299), &store, &mut bank)
                .expect("mapped"),
            0
        );
        assert_eq!(bank.read(4), Some(200));

        assert_eq!(
            engine
                .outbound(MicrosInstant::from_millis(300), &store, &mut bank)
                .expect("mapped"),
            1
        );
        assert_eq!(bank.read(4), Some(250));
    }

    #[test]
    fn commit_writes_immediately() {
        let (mut engine, mut store, mut bank) = fixture();
        let do_id = id(5);
        store.set_value(do_id, 9.5);

        let raw = engine.commit(do_id, &store, &mut bank).expect("mapped");
        assert_eq!(raw, 950);
        assert_eq!(bank.read(6), Some(950));
        assert!(engine.inbound(&mut store, &bank).is_empty());
    }

    #[test]
    fn unmapped_registers_are_skipped_inbound_and_fail_outbound() {
        let mut engine = SyncEngine::<MicrosInstant>::default();
        let mut store = ParameterStore::new();
        let mut bank = RegisterBank::<PARAMETER_COUNT>::new();

        assert!(engine.inbound(&mut store, &bank).is_empty());
        assert_eq!(
            engine.outbound(MicrosInstant::from_millis(0), &store, &mut bank),
            Err(RegisterError::Unmapped(1))
        );
    }
}
