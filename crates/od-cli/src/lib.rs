//! osctrld: keeps an osquery node in sync with its osctrl server
//!
//! Command implementations, option handling and terminal output for the
//! `osctrld` binary.

pub mod commands;
pub mod output;
pub mod settings;
