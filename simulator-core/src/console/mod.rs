//! Operator console shared by the emulator and host tooling.
//!
//! Lines are lexed with `regal` into a bounded token buffer and parsed with
//! `winnow` combinators over those tokens; the command table in [`catalog`]
//! drives both the parser and `help` output.

pub mod catalog;
pub mod grammar;

pub use grammar::{Command, ParseError, parse};
