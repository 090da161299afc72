//! The scheduler tick that owns every piece of simulator state.
//!
//! One [`Controller`] holds the parameter store, the pending serial settings,
//! navigation state, the encoder baseline, the sync engine, and telemetry,
//! plus the three collaborators it drives: the register table, the serial
//! link, and the display. [`Controller::tick`] runs its sub-steps in a fixed
//! order: inbound sync, buttons, rotation, throttled outbound sync, and at most
//! one render.

use core::time::Duration;

use crate::encoder::EncoderTracker;
use crate::navigation::{Action, ButtonEvent, NavEvent, NavState, Screen, Transition, transition};
use crate::params::ParameterStore;
use crate::registers::{RegisterError, RegisterTable, SLAVE_ID};
use crate::screens::ScreenView;
use crate::serial::SerialConfig;
use crate::sync::{OUTBOUND_SYNC_PERIOD, SyncEngine};
use crate::telemetry::{RegisterTelemetry, TelemetryInstant, TelemetryRecorder};

/// Transport reinitialisation hook.
pub trait SerialLink {
    /// Tears the transport down and brings it back up with `config`,
    /// answering as `slave_id`. Blocks for the settle delay; never fails.
    fn reinit(&mut self, config: &SerialConfig, slave_id: u8);
}

/// Render sink for screen views.
pub trait Display {
    fn render(&mut self, view: &ScreenView<'_>);
}

/// Tunables for the control loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Minimum spacing between outbound sync passes.
    pub outbound_period: Duration,
    /// Modbus identity passed to the link on every reinit.
    pub slave_id: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            outbound_period: OUTBOUND_SYNC_PERIOD,
            slave_id: SLAVE_ID,
        }
    }
}

/// What a single tick did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Parameters accepted from remote writes.
    pub inbound: usize,
    /// Registers rewritten by the outbound pass.
    pub outbound: usize,
    pub rendered: bool,
    /// First register table failure seen during the tick.
    pub register_error: Option<RegisterError>,
}

/// Owner of the simulator state and its collaborators.
pub struct Controller<T, L, D, I>
where
    I: TelemetryInstant,
{
    config: ControllerConfig,
    store: ParameterStore,
    serial: SerialConfig,
    applied_serial: SerialConfig,
    nav: NavState,
    tracker: EncoderTracker,
    sync: SyncEngine<I>,
    telemetry: TelemetryRecorder<I>,
    table: T,
    link: L,
    display: D,
}

impl<T, L, D, I> Controller<T, L, D, I>
where
    T: RegisterTable,
    L: SerialLink,
    D: Display,
    I: TelemetryInstant,
{
    /// Creates a controller with the default catalog and 9600 8N1.
    pub fn new(config: ControllerConfig, table: T, link: L, display: D) -> Self {
        Self::with_store(config, ParameterStore::new(), table, link, display)
    }

    pub fn with_store(
        config: ControllerConfig,
        store: ParameterStore,
        table: T,
        link: L,
        display: D,
    ) -> Self {
        Self {
            config,
            store,
            serial: SerialConfig::new(),
            applied_serial: SerialConfig::new(),
            nav: NavState::new(),
            tracker: EncoderTracker::new(0),
            sync: SyncEngine::new(config.outbound_period),
            telemetry: TelemetryRecorder::new(),
            table,
            link,
            display,
        }
    }

    /// Maps the registers, brings the link up, and shows the home screen.
    pub fn start(&mut self, now: I, position: i32) -> Result<(), RegisterError> {
        self.sync.preload(&self.store, &mut self.table)?;
        self.link.reinit(&self.serial, self.config.slave_id);
        self.applied_serial = self.serial;
        self.telemetry.record_serial_applied(self.serial, now);
        self.tracker.rebaseline(position);
        self.telemetry.record_screen(self.nav.screen, now);
        self.render();
        Ok(())
    }

    /// Runs one pass of the control loop.
    ///
    /// `position` is the current encoder reading and `buttons` the gestures
    /// debounced since the previous tick, oldest first.
    pub fn tick(&mut self, now: I, position: i32, buttons: &[ButtonEvent]) -> TickReport {
        let mut report = TickReport::default();
        let mut redraw = false;

        let accepted = self.sync.inbound(&mut self.store, &self.table);
        for change in &accepted {
            self.telemetry.record_inbound(
                change.id,
                RegisterTelemetry::new(change.address, change.raw),
                change.clamped,
                now,
            );
            redraw |= self.nav.displays(change.id);
        }
        report.inbound = accepted.len();

        for button in buttons {
            let step = transition(self.nav, NavEvent::Button(*button));
            redraw |= self.apply(step, now, position, &mut report);
        }

        if let Some(rotation) = self.tracker.take_rotation(position) {
            let step = transition(self.nav, NavEvent::Rotate(rotation));
            redraw |= self.apply(step, now, position, &mut report);
        }

        match self.sync.outbound(now, &self.store, &mut self.table) {
            Ok(0) => {}
            Ok(written) => {
                self.telemetry.record_outbound(written, now);
                report.outbound = written;
            }
            Err(error) => {
                report.register_error.get_or_insert(error);
            }
        }

        if redraw {
            self.render();
            report.rendered = true;
        }
        report
    }

    fn apply(
        &mut self,
        step: Transition,
        now: I,
        position: i32,
        report: &mut TickReport,
    ) -> bool {
        let previous = self.nav.screen;
        self.nav = step.state;
        if step.rebaseline {
            self.tracker.rebaseline(position);
        }
        if self.nav.screen != previous {
            self.telemetry.record_screen(self.nav.screen, now);
        }

        let mut redraw = step.redraw;
        match step.action {
            None => {}
            Some(Action::CommitParameter(id)) => {
                match self.sync.commit(id, &self.store, &mut self.table) {
                    Ok(raw) => {
                        let address = self.store.get(id).register_address;
                        self.telemetry
                            .record_commit(id, RegisterTelemetry::new(address, raw), now);
                    }
                    Err(error) => {
                        report.register_error.get_or_insert(error);
                    }
                }
            }
            Some(Action::ApplySerial) => {
                self.link.reinit(&self.serial, self.config.slave_id);
                self.applied_serial = self.serial;
                self.telemetry.record_serial_applied(self.serial, now);
            }
            Some(Action::StepParameter(id, rotation)) => {
                redraw |= self.store.step(id, rotation);
            }
            Some(Action::RotateSerial(field, rotation)) => {
                redraw |= self.serial.rotate(field, rotation);
            }
        }
        redraw
    }

    fn render(&mut self) {
        let view = ScreenView::from_state(&self.nav, &self.store, &self.serial);
        self.display.render(&view);
    }

    /// Current view of the active screen.
    pub fn view(&self) -> ScreenView<'_> {
        ScreenView::from_state(&self.nav, &self.store, &self.serial)
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Settings shown on the serial screens, possibly not applied yet.
    pub fn serial(&self) -> &SerialConfig {
        &self.serial
    }

    /// Settings the link was last reinitialised with.
    pub fn applied_serial(&self) -> &SerialConfig {
        &self.applied_serial
    }

    pub fn nav(&self) -> &NavState {
        &self.nav
    }

    pub fn screen(&self) -> Screen {
        self.nav.screen
    }

    pub fn sync(&self) -> &SyncEngine<I> {
        &self.sync
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<I> {
        &self.telemetry
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Transport-side access to the register table between ticks.
    pub fn table_mut(&mut self) -> &mut T {
        &mut self.table
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Screen;
    use crate::params::ParameterId;
    use crate::registers::RegisterBank;
    use crate::telemetry::TelemetryEventKind;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl TelemetryInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    fn ms(value: u64) -> MicrosInstant {
        MicrosInstant(value * 1_000)
    }

    #[derive(Default)]
    struct MockLink {
        reinits: heapless::Vec<(SerialConfig, u8), 8>,
    }

    impl SerialLink for MockLink {
        fn reinit(&mut self, config: &SerialConfig, slave_id: u8) {
            self.reinits
                .push((*config, slave_id))
                .expect("reinit log capacity");
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        frames: heapless::Vec<Screen, 32>,
    }

    impl Display for RecordingDisplay {
        fn render(&mut self, view: &ScreenView<'_>) {
            self.frames
                .push(view.screen())
                .expect("frame log capacity");
        }
    }

    type TestController = Controller<RegisterBank, MockLink, RecordingDisplay, MicrosInstant>;

    fn started() -> TestController {
        let mut controller = TestController::new(
            ControllerConfig::default(),
            RegisterBank::new(),
            MockLink::default(),
            RecordingDisplay::default(),
        );
        controller.start(ms(0), 0).expect("registers map");
        controller
    }

    #[test]
    fn start_maps_registers_and_renders_home() {
        let controller = started();
        assert_eq!(controller.table().read(1), Some(700));
        assert_eq!(controller.link().reinits.len(), 1);
        assert_eq!(controller.link().reinits[0].1, 1);
        assert_eq!(controller.display().frames.as_slice(), &[Screen::Home]);
    }

    #[test]
    fn idle_tick_does_not_render() {
        let mut controller = started();
        let report = controller.tick(ms(10), 0, &[]);
        assert!(!report.rendered);
        assert_eq!(report.outbound, 0);
        assert_eq!(controller.display().frames.len(), 1);
    }

    #[test]
    fn buttons_rebaseline_before_rotation() {
        let mut controller = started();
        // Motion accumulated on Home is dropped when the list opens.
        controller.tick(ms(10), 5, &[ButtonEvent::Select]);
        assert_eq!(controller.screen(), Screen::ParamList);
        assert_eq!(controller.nav().list_index.index(), 0);

        controller.tick(ms(20), 6, &[]);
        assert_eq!(controller.nav().list_index.index(), 1);
    }

    #[test]
    fn remote_write_redraws_home_once() {
        let mut controller = started();
        controller.table_mut().write(3, 120).expect("mapped");

        let report = controller.tick(ms(10), 0, &[]);
        assert_eq!(report.inbound, 1);
        assert!(report.rendered);
        assert_eq!(controller.display().frames.len(), 2);

        let id = ParameterId::from_index(2).expect("index in range");
        assert_eq!(controller.store().value(id), 120.0);
        assert_eq!(
            controller.telemetry().latest().map(|record| record.event),
            Some(TelemetryEventKind::InboundAccepted(id))
        );
    }

    #[test]
    fn remote_write_on_serial_screen_is_silent() {
        let mut controller = started();
        controller.tick(ms(10), 0, &[ButtonEvent::SelectLong]);
        let frames = controller.display().frames.len();

        controller.table_mut().write(3, 120).expect("mapped");
        let report = controller.tick(ms(20), 0, &[]);
        assert_eq!(report.inbound, 1);
        assert!(!report.rendered);
        assert_eq!(controller.display().frames.len(), frames);
    }

    #[test]
    fn serial_apply_reinitialises_link() {
        let mut controller = started();
        controller.tick(ms(10), 0, &[ButtonEvent::SelectLong, ButtonEvent::Select]);
        assert_eq!(controller.screen(), Screen::SerialEdit);

        controller.tick(ms(20), -1, &[]);
        assert_eq!(controller.serial().baud(), 4800);
        assert_eq!(controller.applied_serial().baud(), 9600);

        controller.tick(ms(30), -1, &[ButtonEvent::Select]);
        assert_eq!(controller.screen(), Screen::SerialMenu);
        assert_eq!(controller.link().reinits.len(), 2);
        assert_eq!(controller.link().reinits[1].0.baud(), 4800);
        assert_eq!(controller.applied_serial().baud(), 4800);
    }

    #[test]
    fn one_render_per_tick() {
        let mut controller = started();
        controller.tick(ms(10), 0, &[ButtonEvent::Select, ButtonEvent::Select]);
        assert_eq!(controller.screen(), Screen::ParamEdit);
        assert_eq!(controller.display().frames.len(), 2);
        assert_eq!(controller.display().frames[1], Screen::ParamEdit);
    }
}
