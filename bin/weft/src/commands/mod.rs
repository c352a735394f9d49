//! Subcommand implementations.

pub(crate) mod start;
