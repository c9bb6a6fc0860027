//! Shared pieces of the command-line tool.

pub mod args;
