use crate::{
    Result,
    constants::{MAX_UID_LENGTH, MIN_UID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier read from an NFC card (4-10 bytes).
///
/// Displayed as uppercase hex without separators, which is also the form
/// sent to the server in a card-detected packet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardUid(Vec<u8>);

impl CardUid {
    /// Create a new UID with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if the UID is not 4-10 bytes long.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let len = bytes.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&len) {
            return Err(Error::InvalidCardUid(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {len}"
            )));
        }
        Ok(CardUid(bytes))
    }

    /// Raw UID bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hex rendering, two digits per byte.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() % 2 != 0 || !s.is_ascii() {
            return Err(Error::InvalidCardUid(format!("Invalid hex UID: {s}")));
        }
        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidCardUid(format!("Invalid hex UID: {s}")))?;
        CardUid::new(bytes)
    }
}

/// Identifier of the resource (machine, door, tool) this reader guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource identifier.
    ///
    /// # Errors
    /// Returns `Error::Config` if the identifier is empty or contains a `/`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(Error::Config("Resource ID must not be empty".to_string()));
        }
        if id.contains('/') {
            return Err(Error::Config(format!(
                "Resource ID must not contain '/': {id}"
            )));
        }
        Ok(ResourceId(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ResourceId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_card_uid_hex() {
        let uid = CardUid::new(vec![0x04, 0xab, 0xcd, 0xef]).unwrap();
        assert_eq!(uid.to_hex(), "04ABCDEF");
        assert_eq!(uid.to_string(), "04ABCDEF");
    }

    #[rstest]
    #[case(vec![0x01, 0x02, 0x03])]
    #[case(vec![0u8; 11])]
    #[case(vec![])]
    fn test_card_uid_rejects_bad_length(#[case] bytes: Vec<u8>) {
        assert!(matches!(CardUid::new(bytes), Err(Error::InvalidCardUid(_))));
    }

    #[rstest]
    #[case("04ABCDEF", vec![0x04, 0xAB, 0xCD, 0xEF])]
    #[case("04a1b2c3d4e5f6", vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6])]
    #[case(" 01020304 ", vec![0x01, 0x02, 0x03, 0x04])]
    fn test_card_uid_from_str(#[case] input: &str, #[case] expected: Vec<u8>) {
        let uid: CardUid = input.parse().unwrap();
        assert_eq!(uid.as_bytes(), expected.as_slice());
    }

    #[rstest]
    #[case("04ABCDE")]
    #[case("ZZZZZZZZ")]
    #[case("0102")]
    fn test_card_uid_from_str_invalid(#[case] input: &str) {
        assert!(input.parse::<CardUid>().is_err());
    }

    #[test]
    fn test_resource_id_validation() {
        assert_eq!(ResourceId::new(" 42 ").unwrap().as_str(), "42");
        assert!(ResourceId::new("").is_err());
        assert!(ResourceId::new("1/2").is_err());
    }

    #[test]
    fn test_card_uid_serde() {
        let uid = CardUid::new(vec![1, 2, 3, 4]).unwrap();
        let json = serde_json::to_string(&uid).unwrap();
        let back: CardUid = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, back);
    }
}
