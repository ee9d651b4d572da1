//! Request and response bodies exchanged with the osctrl server
//!
//! Every operation is a JSON `POST`. Script, flags and certificate responses
//! are raw text; only the verification endpoint answers with a JSON document.
//!
//! # Message Flow
//!
//! 1. `enroll` / `remove`: [`ScriptRequest`] → raw script bytes
//! 2. `flags`: [`FlagsRequest`] → raw flags text
//! 3. `cert`: [`CertRequest`] → raw PEM certificate
//! 4. `verify`: [`VerifyRequest`] → [`VerifyResponse`]

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Value of the `User-Agent` header identifying this client to the server.
pub const USER_AGENT: &str = concat!("osctrld-http-client/", env!("CARGO_PKG_VERSION"));

/// `Content-Type` for every request body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request body for enroll/remove script retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Enroll secret for the environment
    pub secret: String,
}

/// Request body for certificate retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRequest {
    /// Enroll secret for the environment
    pub secret: String,
}

/// Request body for flags retrieval.
///
/// The server renders the paths into the returned flags, so they must be the
/// paths osquery will actually read on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagsRequest {
    /// Enroll secret for the environment
    pub secret: String,
    /// Local path of the osquery secret file
    #[serde(rename = "secretFile")]
    pub secret_file: String,
    /// Local path of the server certificate
    #[serde(rename = "certFile")]
    pub cert_file: String,
}

/// Request body for the verification bundle. Same shape as [`FlagsRequest`].
pub type VerifyRequest = FlagsRequest;

/// Desired node state as declared by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// Flags the node is expected to run with
    #[serde(default)]
    pub flags: String,
    /// Server certificate the node is expected to trust
    #[serde(default)]
    pub certificate: String,
    /// Minimum osquery version required by the environment
    #[serde(default, rename = "osquery_version")]
    pub osquery_version: String,
}

impl VerifyResponse {
    /// Decode a verification response body
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(body)?)
    }
}
