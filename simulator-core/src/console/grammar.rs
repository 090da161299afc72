#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for console commands.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` parsers over those tokens to build [`Command`] values.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, ArgSpec, CommandSpec, CommandTag};

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 16;

/// Largest detent count a single `rotate` accepts, in either direction.
pub const MAX_ROTATE_STEPS: i32 = 1_000;

/// Longest virtual time a single `wait` may advance.
pub const MAX_WAIT: Duration = Duration::from_secs(600);
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Integer literal with an optional sign.
    #[regex(r"[+-]?[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    /// Separates a register address from its value.
    #[token("=")]
    Equals,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    /// Well-formed argument past the per-command limit.
    ExceedsLimit {
        span: Range<usize>,
        limit: &'static str,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "integer out of range at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::ExceedsLimit { span, limit } => {
                write!(f, "argument at {span:?} exceeds the limit of {limit}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn exceeds_limit(token: &Token<'a>, limit: &'static str) -> Self {
        GrammarError {
            kind: GrammarErrorKind::ExceedsLimit {
                span: token.span.clone(),
                limit,
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Select,
    Back,
    Hold,
    /// Signed number of encoder detents.
    Rotate(i32),
    Wait(Duration),
    Write(RegisterWrite),
    Read(Option<u16>),
    Status,
    Log,
    Help(HelpCommand<'a>),
    Exit,
}

/// Remote master write of one holding register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u16,
    pub raw: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(
            &mut buffer,
            Token {
                kind: record.token,
                lexeme,
                span,
            },
        )?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span: start..end,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: MAX_TOKENS + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let mut rest = tokens.as_slice();
    let command = match command().parse_next(&mut rest) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => {
            return Err(ParseError::Grammar(err));
        }
        Err(ErrMode::Incomplete(_)) => {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "token",
                rest.first(),
            )));
        }
    };

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let keyword = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        match catalog::find(keyword.lexeme) {
            Some(spec) => parse_arguments(spec, input),
            None => {
                *input = snapshot;
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    "command keyword",
                    Some(&keyword),
                )))
            }
        }
    }
}

fn parse_arguments<'src, 'slice>(
    spec: &'static CommandSpec,
    input: &mut Input<'src, 'slice>,
) -> Result<Command<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match spec.args {
        ArgSpec::None => bare_command(spec.tag),
        ArgSpec::Steps => {
            let token = expect_kind(TokenKind::Integer, "step count").parse_next(input)?;
            let steps = token
                .lexeme
                .parse::<i32>()
                .map_err(|_| ErrMode::Cut(GrammarError::invalid_integer(&token)))?;
            if steps.unsigned_abs() > MAX_ROTATE_STEPS.unsigned_abs() {
                return Err(ErrMode::Cut(GrammarError::exceeds_limit(
                    &token,
                    "1000 detents",
                )));
            }
            Ok(Command::Rotate(steps))
        }
        ArgSpec::Duration => match input.split_first() {
            Some((token, rest)) if token.kind == TokenKind::Duration => {
                let duration = parse_duration(token).map_err(ErrMode::Cut)?;
                *input = rest;
                bounded_wait(token, duration)
            }
            Some((token, rest)) if token.kind == TokenKind::Integer => {
                let millis = parse_u32(token).map_err(ErrMode::Cut)?;
                *input = rest;
                bounded_wait(token, Duration::from_millis(millis.into()))
            }
            other => Err(ErrMode::Backtrack(GrammarError::unexpected(
                "duration",
                other.map(|(token, _)| token),
            ))),
        },
        ArgSpec::Assignment => {
            let address = expect_kind(TokenKind::Integer, "register address").parse_next(input)?;
            let _ = expect_kind(TokenKind::Equals, "=").parse_next(input)?;
            let raw = expect_kind(TokenKind::Integer, "register value").parse_next(input)?;
            Ok(Command::Write(RegisterWrite {
                address: parse_u16(&address).map_err(ErrMode::Cut)?,
                raw: parse_u16(&raw).map_err(ErrMode::Cut)?,
            }))
        }
        ArgSpec::OptionalAddress => match input.split_first() {
            Some((token, rest)) if token.kind == TokenKind::Integer => {
                let address = parse_u16(token).map_err(ErrMode::Cut)?;
                *input = rest;
                Ok(Command::Read(Some(address)))
            }
            Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
                GrammarError::unexpected("register address", Some(token)),
            )),
            _ => Ok(Command::Read(None)),
        },
        ArgSpec::OptionalTopic => match input.split_first() {
            Some((token, rest)) if token.kind == TokenKind::Ident => {
                *input = rest;
                Ok(Command::Help(HelpCommand {
                    topic: Some(token.lexeme),
                }))
            }
            Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
                GrammarError::unexpected("command name", Some(token)),
            )),
            _ => Ok(Command::Help(HelpCommand { topic: None })),
        },
    }
}

fn bounded_wait<'a>(
    token: &Token<'a>,
    duration: Duration,
) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
    if duration > MAX_WAIT {
        return Err(ErrMode::Cut(GrammarError::exceeds_limit(token, "600s")));
    }
    Ok(Command::Wait(duration))
}

fn bare_command<'a>(tag: CommandTag) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
    match tag {
        CommandTag::Select => Ok(Command::Select),
        CommandTag::Back => Ok(Command::Back),
        CommandTag::Hold => Ok(Command::Hold),
        CommandTag::Status => Ok(Command::Status),
        CommandTag::Log => Ok(Command::Log),
        CommandTag::Exit => Ok(Command::Exit),
        CommandTag::Rotate
        | CommandTag::Wait
        | CommandTag::Write
        | CommandTag::Read
        | CommandTag::Help => Err(ErrMode::Backtrack(GrammarError::unexpected(
            "argument",
            None,
        ))),
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_u16<'a>(token: &Token<'a>) -> Result<u16, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u16>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

fn parse_u32<'a>(token: &Token<'a>) -> Result<u32, GrammarError<'a>> {
    token
        .lexeme
        .parse::<u32>()
        .map_err(|_| GrammarError::invalid_integer(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_button_commands() {
        assert_eq!(parse_ok("select"), Command::Select);
        assert_eq!(parse_ok("Back"), Command::Back);
        assert_eq!(parse_ok("HOLD\n"), Command::Hold);
        assert_eq!(parse_ok("quit"), Command::Exit);
    }

    #[test]
    fn parses_signed_rotation() {
        assert_eq!(parse_ok("rotate -3"), Command::Rotate(-3));
        assert_eq!(parse_ok("rotate +2"), Command::Rotate(2));
        assert_eq!(parse_ok("rotate 5"), Command::Rotate(5));
    }

    #[test]
    fn parses_wait_units() {
        assert_eq!(
            parse_ok("wait 150ms"),
            Command::Wait(Duration::from_millis(150))
        );
        assert_eq!(parse_ok("wait 2s"), Command::Wait(Duration::from_secs(2)));
        assert_eq!(parse_ok("wait 40"), Command::Wait(Duration::from_millis(40)));
    }

    #[test]
    fn rejects_rotation_and_wait_past_their_limits() {
        assert_eq!(parse_ok("rotate -1000"), Command::Rotate(-MAX_ROTATE_STEPS));
        assert_eq!(parse_ok("wait 600s"), Command::Wait(MAX_WAIT));

        for line in [
            "rotate 2147483647",
            "rotate -1001",
            "wait 4294967295s",
            "wait 601s",
            "wait 600001",
        ] {
            match parse(line) {
                Err(ParseError::Grammar(err)) => assert!(
                    matches!(err.kind, GrammarErrorKind::ExceedsLimit { .. }),
                    "{line}: {err}"
                ),
                other => panic!("{line}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn parses_register_write() {
        let expected = Command::Write(RegisterWrite {
            address: 3,
            raw: 120,
        });
        assert_eq!(parse_ok("write 3=120"), expected);
        assert_eq!(parse_ok("write 3 = 120"), expected);
    }

    #[test]
    fn parses_optional_arguments() {
        assert_eq!(parse_ok("read"), Command::Read(None));
        assert_eq!(parse_ok("read 4"), Command::Read(Some(4)));
        assert_eq!(
            parse_ok("help write"),
            Command::Help(HelpCommand {
                topic: Some("write")
            })
        );
        assert_eq!(parse_ok("help"), Command::Help(HelpCommand { topic: None }));
    }

    #[test]
    fn rejects_out_of_range_register_value() {
        match parse("write 3=70000") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidInteger { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_keyword_and_trailing_tokens() {
        assert!(matches!(
            parse("fly"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken { .. }
            }))
        ));
        assert!(matches!(
            parse("select now"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                }
            }))
        ));
        assert!(matches!(
            parse("rotate"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::UnexpectedEnd { .. }
            }))
        ));
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("read $").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
        assert!(matches!(
            parse("read $"),
            Err(ParseError::Grammar(GrammarError {
                kind: GrammarErrorKind::InvalidToken { lexeme: "$", .. }
            }))
        ));
    }
}
