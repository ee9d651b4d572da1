//! CLI command implementations

mod fetch;
mod script;
mod verify;

pub use fetch::{cert_command, flags_command};
pub use script::script_command;
pub use verify::verify_command;
