//! od-protocol: Wire contract between osctrld and the osctrl server
//!
//! This crate defines the endpoints, JSON request bodies and the
//! verification response used by the agent. It carries no transport.

pub mod endpoint;
pub mod error;
pub mod message;

pub use endpoint::{Endpoints, ScriptKind};
pub use error::ProtocolError;
pub use message::{
    CertRequest, FlagsRequest, ScriptRequest, VerifyRequest, VerifyResponse, JSON_CONTENT_TYPE,
    USER_AGENT,
};
