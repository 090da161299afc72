use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    record_profile(TranscriptProfile::Walkthrough)?;
    record_profile(TranscriptProfile::Remote)?;
    record_profile(TranscriptProfile::Serial)?;
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile)?;
    let _ = session.start()?;
    let script: &[&str] = match profile {
        TranscriptProfile::Walkthrough => WALKTHROUGH,
        TranscriptProfile::Remote => REMOTE,
        TranscriptProfile::Serial => SERIAL,
    };
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

/// Edit TDS, cancel an edit, then save one.
const WALKTHROUGH: &[&str] = &[
    "help",
    "select",
    "rotate +1",
    "select",
    "rotate +5",
    "read 2",
    "wait 300ms",
    "read 2",
    "back",
    "rotate +1",
    "select",
    "rotate -3",
    "select",
    "read 3",
    "back",
    "status",
    "exit",
];

/// Remote master writes, including an out-of-range value and an unmapped register.
const REMOTE: &[&str] = &[
    "write 1=655",
    "read 1",
    "write 1=1500",
    "wait 320",
    "read 1",
    "write 5=2",
    "write 9=1",
    "select",
    "rotate +3",
    "select",
    "write 4=2500",
    "log",
    "exit",
];

/// Change baud and parity, cancel a change, and exercise the clamps.
const SERIAL: &[&str] = &[
    "hold",
    "select",
    "rotate -1",
    "select",
    "rotate +1",
    "select",
    "rotate -1",
    "select",
    "rotate +2",
    "select",
    "rotate +1",
    "back",
    "status",
    "help rotate",
    "help reboot",
    "exit",
];
