//! Shadeway CLI library.
//!
//! Argument parsing helpers, command handlers and output formatting for the
//! `shadeway-cli` binary.

pub mod commands;
pub mod output;
pub mod terminal;
