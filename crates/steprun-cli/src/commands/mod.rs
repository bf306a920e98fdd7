//! CLI subcommands

pub mod compile;
pub mod names;
