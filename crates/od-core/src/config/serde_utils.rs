//! Serde helpers for configuration values
//!
//! Shared by every configuration struct that carries a timeout.

/// Serialize `Duration` as whole seconds.
///
/// Timeouts in `osctrld.toml` are written as plain integers. Sub-second
/// precision is dropped on the way out; negative or fractional values are
/// rejected on the way in.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Timeouts {
///     #[serde(with = "od_core::config::serde_utils::duration_secs")]
///     request_timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64), truncating any fraction
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a non-negative integer number of seconds
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
