//! Serde adapters for the job wire format.
//!
//! Producers encode durations as signed nanoseconds and byte payloads as
//! standard base64 strings.

pub(super) mod nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        let ns = i64::try_from(d.as_nanos()).unwrap_or(i64::MAX);
        s.serialize_i64(ns)
    }

    /// Negative values clamp to zero.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ns = i64::deserialize(d)?;
        Ok(Duration::from_nanos(ns.max(0) as u64))
    }
}

pub(super) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    /// `null` decodes as an empty payload.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(text) => STANDARD.decode(text.as_bytes()).map_err(de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
