//! Shared serialization/deserialization utilities for configuration

/// Duration serialized as (possibly fractional) seconds
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "kv_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
///
/// Accepts both `3` and `0.5`; negative or non-finite values are rejected.
pub mod duration_secs {
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (f64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    /// Deserialize a Duration from seconds (integer or float)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| D::Error::custom(format!("invalid duration: {} seconds", secs)))
    }
}
