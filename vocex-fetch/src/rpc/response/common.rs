//! Serde helpers for the node's JSON encoding.
//!
//! The node encodes 64-bit integers as decimal strings, hashes and addresses as upper-case
//! hex and raw bytes as standard base64.

use base64::{engine::general_purpose, Engine};
use serde::{de::Error, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(serde_json::Number),
}

/// Integers sent as decimal strings (plain JSON numbers are accepted too).
pub mod stringified {
    use super::*;
    use std::{fmt::Display, str::FromStr};

    /// Serializes the value as a decimal string.
    pub fn serialize<T: Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    /// Parses a decimal string or a JSON number.
    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = match StringOrNumber::deserialize(d)? {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        };
        raw.parse().map_err(D::Error::custom)
    }
}

/// Byte strings sent as hex (either case accepted, upper case written).
pub mod hex_bytes {
    use super::*;

    /// Serializes bytes as upper-case hex.
    pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode_upper(value))
    }

    /// Decodes a hex string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        hex::decode(raw.trim_start_matches("0x")).map_err(D::Error::custom)
    }
}

/// Byte strings sent as standard base64. `null` decodes to an empty vector.
pub mod base64_bytes {
    use super::*;

    /// Serializes bytes as base64.
    pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&general_purpose::STANDARD.encode(value))
    }

    /// Decodes a base64 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) => general_purpose::STANDARD
                .decode(raw)
                .map_err(D::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// Lists of base64 byte strings. `null` decodes to an empty list.
pub mod base64_list {
    use super::*;
    use serde::ser::SerializeSeq;

    /// Serializes each entry as base64.
    pub fn serialize<S: Serializer>(value: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(value.len()))?;
        for item in value {
            seq.serialize_element(&general_purpose::STANDARD.encode(item))?;
        }
        seq.end()
    }

    /// Decodes each entry from base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Option::<Vec<String>>::deserialize(d)?
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                general_purpose::STANDARD
                    .decode(raw)
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}
