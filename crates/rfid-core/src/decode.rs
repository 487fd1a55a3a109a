//! Scan-code decoding
//!
//! The reader firmware prints each card UID as whitespace-separated hex
//! octets, most significant first (`1A 2B 3C`). The octets are concatenated
//! and read as one big-endian base-16 number. UIDs of any length are accepted.

use std::fmt;

use num_bigint::BigUint;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur while decoding a line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Nothing left after removing whitespace
    #[error("no hex digits in line")]
    Empty,

    /// The line contains characters that are not hex digits
    #[error("invalid hex digits: {digits:?}")]
    InvalidHex { digits: String },

    /// The line grew past the buffer limit and was dropped
    #[error("line too long ({len} bytes)")]
    TooLong { len: usize },
}

/// A decoded card code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScanCode(BigUint);

impl ScanCode {
    /// The code as an arbitrary-precision integer
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// The code as a `u64`, if it fits
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.0).ok()
    }

    /// Uppercase hex rendering without leading zeros
    pub fn to_hex(&self) -> String {
        format!("{:X}", self.0)
    }
}

impl From<u64> for ScanCode {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for ScanCode {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialized as a number when it fits in a `u64`, as a decimal string otherwise
impl Serialize for ScanCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_u64() {
            Some(value) => serializer.serialize_u64(value),
            None => serializer.serialize_str(&self.to_string()),
        }
    }
}

/// Decode one line of reader output into a scan code
///
/// All whitespace is removed before parsing. Only ASCII hex digits are
/// accepted; signs, `0x` prefixes and separators are rejected.
pub fn decode_line(line: &str) -> Result<ScanCode, DecodeError> {
    let digits: String = line.chars().filter(|c| !c.is_whitespace()).collect();

    if digits.is_empty() {
        return Err(DecodeError::Empty);
    }

    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidHex { digits });
    }

    BigUint::parse_bytes(digits.as_bytes(), 16)
        .map(ScanCode)
        .ok_or(DecodeError::InvalidHex { digits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_octets() {
        assert_eq!(decode_line("1A 2B 3C").unwrap(), ScanCode::from(0x1A2B3C));
        assert_eq!(decode_line(" 1A 2B ").unwrap(), ScanCode::from(6699));
        assert_eq!(decode_line("ff").unwrap(), ScanCode::from(255));
        assert_eq!(decode_line("00 00 01").unwrap(), ScanCode::from(1));
    }

    #[test]
    fn test_decode_strips_all_whitespace() {
        assert_eq!(decode_line("\t1A\r\n2B ").unwrap(), ScanCode::from(0x1A2B));
    }

    #[test]
    fn test_decode_empty_fails() {
        assert_eq!(decode_line(""), Err(DecodeError::Empty));
        assert_eq!(decode_line("   \t"), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_non_hex_fails() {
        assert_eq!(
            decode_line("ZZ"),
            Err(DecodeError::InvalidHex {
                digits: "ZZ".to_string()
            })
        );
        assert!(decode_line("GG").is_err());
        assert!(decode_line("0x1A").is_err());
        assert!(decode_line("-1A").is_err());
        assert!(decode_line("1A_2B").is_err());
    }

    #[test]
    fn test_decode_beyond_u64() {
        let code = decode_line("01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F 10").unwrap();

        assert_eq!(code.to_u64(), None);
        assert_eq!(code.to_hex(), "102030405060708090A0B0C0D0E0F10");
        assert_eq!(code.to_string(), "1339673755198158349044581307228491536");
    }

    #[test]
    fn test_serialize_small_as_number() {
        let json = serde_json::to_string(&ScanCode::from(6699)).unwrap();
        assert_eq!(json, "6699");
    }

    #[test]
    fn test_serialize_large_as_string() {
        let code = decode_line("FF FF FF FF FF FF FF FF FF").unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"4722366482869645213695\"");
    }

    proptest! {
        #[test]
        fn octets_decode_big_endian(
            bytes in prop::collection::vec(any::<u8>(), 1..32),
            pad in "[ \t]{0,3}"
        ) {
            let line = bytes
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let line = format!("{pad}{line}{pad}");

            let code = decode_line(&line).unwrap();
            prop_assert_eq!(code.as_biguint(), &BigUint::from_bytes_be(&bytes));
        }

        #[test]
        fn non_hex_character_always_fails(
            prefix in "[0-9A-Fa-f]{0,8}",
            bad in "[G-Zg-z!#_+\\-]",
            suffix in "[0-9A-Fa-f]{0,8}"
        ) {
            let line = format!("{prefix}{bad}{suffix}");
            prop_assert!(decode_line(&line).is_err());
        }
    }
}
