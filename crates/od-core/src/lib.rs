//! od-core: configuration, platform table and shared types for osctrld
//!
//! Used by the agent library and the `osctrld` binary.

pub mod config;
pub mod error;
pub mod platform;
pub mod time;
pub mod version;

pub use config::{AgentConfig, ConfigFile, ResolvedConfig};
pub use error::{ConfigError, LocalIoError, OdError, RemoteError, ScriptError};
pub use platform::PlatformProfile;
pub use time::Deadline;
pub use version::{compare as compare_versions, VersionOrdering};
