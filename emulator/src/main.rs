mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: simulator-emulator [--profile <walkthrough|remote|serial>] | simulator-emulator <walkthrough|remote|serial>"
        );
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let styled = stdout.is_tty();
    let mut writer = stdout.lock();
    let mut session = Session::new(profile)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Sensor Simulator Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    print_lines(&mut writer, &session.start()?, styled)?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let responses = session.handle_command(trimmed)?;
        print_lines(&mut writer, &responses, styled)?;
        if session.is_closed() {
            break;
        }
    }

    Ok(())
}

fn print_lines(writer: &mut impl Write, lines: &[String], styled: bool) -> io::Result<()> {
    for line in lines {
        if !styled {
            writeln!(writer, "{line}")?;
        } else if line.starts_with("ERR") || line.starts_with("WARN") {
            writeln!(writer, "{}", line.as_str().red())?;
        } else if line.starts_with("  | ") {
            writeln!(writer, "{}", line.as_str().cyan())?;
        } else if line.starts_with('[') {
            writeln!(writer, "{}", line.as_str().bold())?;
        } else {
            writeln!(writer, "{line}")?;
        }
    }
    Ok(())
}

fn parse_profile() -> Result<TranscriptProfile, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            TranscriptProfile::from_tag(value)
        } else if arg == "--profile" {
            if let Some(value) = args.next() {
                TranscriptProfile::from_tag(&value)
            } else {
                Err("Expected value after --profile".to_string())
            }
        } else {
            TranscriptProfile::from_tag(&arg)
        }
    } else {
        Ok(TranscriptProfile::Walkthrough)
    }
}
