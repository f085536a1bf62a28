//! Serde adapters for the `0x`-prefixed hex strings used by the node's JSON
//! interface. Integers are encoded without leading zeros (`"0x0"`, `"0x1f"`),
//! byte strings as lowercase hex (`"0x"` when empty).

use crate::error::EncodingError;

/// Encode bytes as a `0x`-prefixed lowercase hex string.
pub fn encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string, with or without the `0x` prefix.
pub fn decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| EncodingError::InvalidHex(e.to_string()))
}

fn parse_uint(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("missing 0x prefix: {s}"))?;
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return Err(format!("non-canonical hex integer: {s}"));
    }
    u64::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

pub mod hex_u64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_uint(&s).map_err(D::Error::custom)
    }
}

pub mod hex_u32 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let s = String::deserialize(deserializer)?;
        let value = super::parse_uint(&s).map_err(D::Error::custom)?;
        u32::try_from(value).map_err(D::Error::custom)
    }
}

pub mod bytes {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(value: T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(value.as_ref()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        if !s.starts_with("0x") {
            return Err(D::Error::custom(format!("missing 0x prefix: {s}")));
        }
        super::decode(&s).map_err(D::Error::custom)
    }
}

pub mod bytes_vec {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(values: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&super::encode(value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .iter()
            .map(|s| super::decode(s).map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_prefix_and_bare() {
        assert_eq!(decode("0xff00").unwrap(), vec![0xff, 0x00]);
        assert_eq!(decode("ff00").unwrap(), vec![0xff, 0x00]);
        assert_eq!(decode("0x").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_rejects_odd_length() {
        assert!(matches!(decode("0xabc"), Err(EncodingError::InvalidHex(_))));
    }

    #[test]
    fn uint_must_be_canonical() {
        assert_eq!(parse_uint("0x0"), Ok(0));
        assert_eq!(parse_uint("0x1f"), Ok(31));
        assert!(parse_uint("0x01").is_err());
        assert!(parse_uint("0x").is_err());
        assert!(parse_uint("1f").is_err());
    }
}
