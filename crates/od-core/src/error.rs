//! Core error types for osctrld

use od_protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for osctrld
#[derive(Error, Debug)]
pub enum OdError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error talking to the osctrl server
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local file error
    #[error(transparent)]
    LocalIo(#[from] LocalIoError),

    /// Script execution error
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error")]
    Parse(#[from] toml::de::Error),

    /// Missing required field
    #[error("{0} for osctrl is required")]
    MissingField(String),
}

/// Errors talking to the osctrl server
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Request body could not be encoded
    #[error("error encoding request")]
    Encode(#[from] serde_json::Error),

    /// Network or TLS failure before a response arrived
    #[error("error sending request to {url} - {message}")]
    Transport { url: String, message: String },

    /// Request did not complete before its deadline
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    /// Server answered with anything but 200
    #[error("HTTP {status} - Response: {body}")]
    Server { status: u16, body: String },

    /// Response body could not be decoded
    #[error("error parsing response")]
    Decode(#[from] ProtocolError),
}

impl RemoteError {
    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Local file write errors.
///
/// Reads never produce these; a failed read counts as a mismatch.
#[derive(Error, Debug)]
pub enum LocalIoError {
    /// Target exists with different content and force was not given
    #[error("{} exists, please use --force to overwrite", path.display())]
    ForceRequired { path: PathBuf },

    /// Writing the target failed
    #[error("error writing {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Script execution errors
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Temporary script file could not be created or prepared
    #[error("error preparing script in {}", dir.display())]
    Materialize {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script process could not be started
    #[error("error executing script {}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Script exited unsuccessfully
    #[error("script failed with {} - {stderr}", exit_label(*code))]
    Failed { code: Option<i32>, stderr: String },

    /// Script did not finish before its deadline and was killed
    #[error("script timed out after {after:?}")]
    TimedOut { after: Duration },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
