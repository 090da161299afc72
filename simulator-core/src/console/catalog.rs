//! Console command table shared by the parser and the help command.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Select,
    Back,
    Hold,
    Rotate,
    Wait,
    Write,
    Read,
    Status,
    Log,
    Help,
    Exit,
}

/// Argument layout following the command keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgSpec {
    None,
    /// Signed detent count, e.g. `-3`.
    Steps,
    /// `150ms`, `2s`, or a bare millisecond count.
    Duration,
    /// `<addr>=<raw>`.
    Assignment,
    /// Optional register address.
    OptionalAddress,
    /// Optional command name.
    OptionalTopic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub args: ArgSpec,
    pub usage: &'static str,
    pub summary: &'static str,
}

const fn spec(
    name: &'static str,
    tag: CommandTag,
    args: ArgSpec,
    usage: &'static str,
    summary: &'static str,
) -> CommandSpec {
    CommandSpec {
        name,
        tag,
        args,
        usage,
        summary,
    }
}

pub const COMMANDS: &[CommandSpec] = &[
    spec(
        "select",
        CommandTag::Select,
        ArgSpec::None,
        "select",
        "Short press of the Select button.",
    ),
    spec(
        "back",
        CommandTag::Back,
        ArgSpec::None,
        "back",
        "Press the Back button.",
    ),
    spec(
        "hold",
        CommandTag::Hold,
        ArgSpec::None,
        "hold",
        "Long press of Select; opens the serial menu from Home.",
    ),
    spec(
        "rotate",
        CommandTag::Rotate,
        ArgSpec::Steps,
        "rotate <+n|-n>",
        "Turn the encoder by up to 1000 detents, one tick per detent.",
    ),
    spec(
        "wait",
        CommandTag::Wait,
        ArgSpec::Duration,
        "wait <ms|Nms|Ns>",
        "Advance the virtual clock by up to 600s, ticking the loop.",
    ),
    spec(
        "write",
        CommandTag::Write,
        ArgSpec::Assignment,
        "write <addr>=<raw>",
        "Write a holding register as the remote master.",
    ),
    spec(
        "read",
        CommandTag::Read,
        ArgSpec::OptionalAddress,
        "read [addr]",
        "Show one holding register or the whole table.",
    ),
    spec(
        "status",
        CommandTag::Status,
        ArgSpec::None,
        "status",
        "Show the screen, parameters, and serial settings.",
    ),
    spec(
        "log",
        CommandTag::Log,
        ArgSpec::None,
        "log",
        "Dump the telemetry ring.",
    ),
    spec(
        "help",
        CommandTag::Help,
        ArgSpec::OptionalTopic,
        "help [command]",
        "List commands or describe one.",
    ),
    spec(
        "exit",
        CommandTag::Exit,
        ArgSpec::None,
        "exit",
        "End the session.",
    ),
    spec(
        "quit",
        CommandTag::Exit,
        ArgSpec::None,
        "quit",
        "End the session.",
    ),
];

/// Case-insensitive keyword lookup.
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        for (index, spec) in COMMANDS.iter().enumerate() {
            assert!(
                COMMANDS[index + 1..]
                    .iter()
                    .all(|other| !other.name.eq_ignore_ascii_case(spec.name)),
                "duplicate command {}",
                spec.name
            );
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find("WRITE").map(|spec| spec.tag), Some(CommandTag::Write));
        assert_eq!(find("quit").map(|spec| spec.tag), Some(CommandTag::Exit));
        assert!(find("reboot").is_none());
    }
}
