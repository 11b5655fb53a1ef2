//! Subcommand implementations.

pub mod apply;
pub mod config;
pub mod profile;
pub mod watermark_args;
