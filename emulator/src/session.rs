use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use simulator_core::console::catalog::{self, COMMANDS};
use simulator_core::console::{Command, parse};
use simulator_core::controller::{Controller, ControllerConfig, Display, SerialLink, TickReport};
use simulator_core::navigation::ButtonEvent;
use simulator_core::registers::{RegisterBank, RegisterTable};
use simulator_core::screens::{ScreenView, ValueLine};
use simulator_core::serial::SerialConfig;
use simulator_core::telemetry::{TelemetryInstant, TelemetryPayload};

/// Virtual time between control loop passes.
pub const TICK_PERIOD: Duration = Duration::from_millis(10);

/// Quiet time the firmware link waits out before applying new UART settings.
const REINIT_SETTLE: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Walkthrough,
    Remote,
    Serial,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Walkthrough => "transcripts/emulator-walkthrough.log",
            TranscriptProfile::Remote => "transcripts/emulator-remote.log",
            TranscriptProfile::Serial => "transcripts/emulator-serial.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Walkthrough => "Sensor Simulator Emulator menu walkthrough transcript",
            TranscriptProfile::Remote => "Sensor Simulator Emulator remote master transcript",
            TranscriptProfile::Serial => "Sensor Simulator Emulator serial settings transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("walkthrough") {
            Ok(Self::Walkthrough)
        } else if tag.eq_ignore_ascii_case("remote") {
            Ok(Self::Remote)
        } else if tag.eq_ignore_ascii_case("serial") {
            Ok(Self::Serial)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Session clock; starts at zero and only advances on ticks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualInstant(Duration);

impl VirtualInstant {
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl TelemetryInstant for VirtualInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// Stand-in for the RS-485 UART; narrates each reinit.
#[derive(Default)]
pub struct HostLink {
    notes: Vec<String>,
    reinit_count: usize,
}

impl HostLink {
    pub fn reinit_count(&self) -> usize {
        self.reinit_count
    }

    fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.notes.drain(..)
    }
}

impl SerialLink for HostLink {
    fn reinit(&mut self, config: &SerialConfig, slave_id: u8) {
        self.reinit_count += 1;
        self.notes.push(format!(
            "link reinit {config} slave={slave_id} t3.5={}us settle={}ms",
            config.rtu_frame_gap().as_micros(),
            REINIT_SETTLE.as_millis()
        ));
    }
}

/// Text renderer standing in for the TFT panel.
#[derive(Default)]
pub struct TerminalDisplay {
    frames: Vec<String>,
    rendered: usize,
}

impl TerminalDisplay {
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    fn drain(&mut self) -> impl Iterator<Item = String> + '_ {
        self.frames.drain(..)
    }
}

impl Display for TerminalDisplay {
    fn render(&mut self, view: &ScreenView<'_>) {
        self.rendered += 1;
        self.frames.push(format!("[{}]", view.screen()));
        for line in view.to_string().lines() {
            self.frames.push(format!("  | {line}"));
        }
    }
}

pub type SimController = Controller<RegisterBank, HostLink, TerminalDisplay, VirtualInstant>;

pub struct Session {
    controller: SimController,
    transcript: TranscriptLogger,
    now: VirtualInstant,
    position: i32,
    closed: bool,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let controller = SimController::new(
            ControllerConfig::default(),
            RegisterBank::new(),
            HostLink::default(),
            TerminalDisplay::default(),
        );

        Ok(Self {
            controller,
            transcript,
            now: VirtualInstant::default(),
            position: 0,
            closed: false,
        })
    }

    /// Maps the registers, brings the link up, and returns the first frame.
    pub fn start(&mut self) -> io::Result<Vec<String>> {
        self.controller
            .start(self.now, self.position)
            .map_err(|err| io::Error::other(format!("register map: {err}")))?;

        let mut lines = Vec::new();
        self.collect_output(&mut lines);
        self.record_output(self.now.elapsed(), &lines)?;
        Ok(lines)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn controller(&self) -> &SimController {
        &self.controller
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.now.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: Command<'_>) -> Vec<String> {
        let mut lines = Vec::new();
        match command {
            Command::Select => self.press(ButtonEvent::Select, &mut lines),
            Command::Back => self.press(ButtonEvent::Back, &mut lines),
            Command::Hold => self.press(ButtonEvent::SelectLong, &mut lines),
            Command::Rotate(detents) => {
                lines.push(format!("OK rotate {detents:+}"));
                let direction = detents.signum();
                for _ in 0..detents.unsigned_abs() {
                    self.position = self.position.wrapping_add(direction);
                    self.step(&[], &mut lines);
                }
            }
            Command::Wait(duration) => {
                let ticks = tick_count(duration);
                lines.push(format!("OK wait {}ms ticks={ticks}", duration.as_millis()));
                for _ in 0..ticks {
                    self.step(&[], &mut lines);
                }
            }
            Command::Write(write) => {
                match self.controller.table_mut().write(write.address, write.raw) {
                    Ok(()) => {
                        lines.push(format!("OK write {}={}", write.address, write.raw));
                        self.step(&[], &mut lines);
                    }
                    Err(err) => lines.push(format!("ERR register {err}")),
                }
            }
            Command::Read(Some(address)) => match self.controller.table().read(address) {
                Some(raw) => lines.push(self.describe_register(address, raw)),
                None => lines.push(format!("ERR register unmapped address {address}")),
            },
            Command::Read(None) => {
                let table = self.controller.table();
                lines.extend(
                    table
                        .iter()
                        .map(|slot| self.describe_register(slot.address, slot.value)),
                );
            }
            Command::Status => self.status(&mut lines),
            Command::Log => self.dump_telemetry(&mut lines),
            Command::Help(help) => help_lines(help.topic, &mut lines),
            Command::Exit => {
                self.closed = true;
                lines.push("Session closed.".to_string());
            }
        }
        lines
    }

    fn press(&mut self, button: ButtonEvent, lines: &mut Vec<String>) {
        lines.push(format!("OK {button}"));
        self.step(&[button], lines);
    }

    fn step(&mut self, buttons: &[ButtonEvent], lines: &mut Vec<String>) {
        self.now = VirtualInstant(self.now.elapsed() + TICK_PERIOD);
        let report = self.controller.tick(self.now, self.position, buttons);
        self.narrate(report, lines);
        self.collect_output(lines);
    }

    fn narrate(&self, report: TickReport, lines: &mut Vec<String>) {
        let at = self.now.elapsed().as_millis();
        if report.inbound > 0 {
            lines.push(format!("sync +{at}ms accepted {} remote value(s)", report.inbound));
        }
        if report.outbound > 0 {
            lines.push(format!("sync +{at}ms exported {} register(s)", report.outbound));
        }
        if let Some(err) = report.register_error {
            lines.push(format!("WARN register {err}"));
        }
    }

    fn collect_output(&mut self, lines: &mut Vec<String>) {
        lines.extend(self.controller.link_mut().drain());
        lines.extend(self.controller.display_mut().drain());
    }

    fn describe_register(&self, address: u16, raw: u16) -> String {
        let store = self.controller.store();
        match store.id_for_address(address) {
            Ok(id) => format!("R{address} = {raw} ({})", ValueLine(store.get(id))),
            Err(_) => format!("R{address} = {raw}"),
        }
    }

    fn status(&self, lines: &mut Vec<String>) {
        let controller = &self.controller;
        lines.push(format!(
            "clock=+{}ms screen={} encoder={}",
            self.now.elapsed().as_millis(),
            controller.screen(),
            self.position
        ));
        for (_, param) in controller.store().iter() {
            lines.push(format!("  {}", ValueLine(param)));
        }
        lines.push(format!(
            "serial pending={} applied={} slave={}",
            controller.serial(),
            controller.applied_serial(),
            controller.config().slave_id
        ));
        lines.push(format!(
            "link reinits={} frames={}",
            controller.link().reinit_count(),
            controller.display().rendered()
        ));
    }

    fn dump_telemetry(&self, lines: &mut Vec<String>) {
        let telemetry = self.controller.telemetry();
        if telemetry.is_empty() {
            lines.push("telemetry empty".to_string());
            return;
        }
        lines.push(format!(
            "telemetry records={} next-id={}",
            telemetry.len(),
            telemetry.next_id()
        ));
        for record in telemetry.oldest_first() {
            let mut line = format!(
                "  #{:<4} +{}ms {} (0x{:02x})",
                record.id,
                record.timestamp.elapsed().as_millis(),
                record.event,
                record.event.to_raw()
            );
            if !matches!(record.details, TelemetryPayload::None) {
                line.push(' ');
                line.push_str(&record.details.to_string());
            }
            lines.push(line);
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn tick_count(duration: Duration) -> u128 {
    let period = TICK_PERIOD.as_micros();
    duration.as_micros().div_ceil(period)
}

fn help_lines(topic: Option<&str>, lines: &mut Vec<String>) {
    match topic {
        Some(target) => {
            if let Some(spec) = catalog::find(target) {
                lines.push(format!("{:<20} - {}", spec.usage, spec.summary));
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for spec in COMMANDS {
                lines.push(format!("  {:<20} - {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <command>` for a specific command.".to_string());
        }
    }
}

fn help_topic_list() -> String {
    let mut buffer = String::new();
    for (index, spec) in COMMANDS.iter().enumerate() {
        if index > 0 {
            buffer.push_str(", ");
        }
        buffer.push_str(spec.name);
    }
    buffer
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since power-on ({}ms per tick)",
            TICK_PERIOD.as_millis()
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
