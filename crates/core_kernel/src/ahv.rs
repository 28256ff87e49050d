//! AHV number value object
//!
//! The Swiss AHV number (Sozialversicherungsnummer) identifies a natural
//! person across insurers. The normalized form is `756.XXXX.XXXX.XX`:
//! the country code 756 followed by ten digits, thirteen digits in total.
//!
//! Equality and uniqueness are structural: two AHV numbers are the same
//! if and only if their normalized forms match. Malformed input is
//! rejected at construction, so an `AhvNumber` held anywhere in the
//! system is known to be well-formed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing an AHV number
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AhvNumberError {
    #[error("Invalid AHV number format: '{0}'. Expected format: 756.XXXX.XXXX.XX")]
    InvalidFormat(String),

    #[error("Unformatted AHV number must be 13 digits, got '{0}'")]
    InvalidDigits(String),

    #[error("AHV number must start with country code 756, got '{0}'")]
    WrongCountryCode(String),
}

/// A validated, normalized Swiss AHV number
///
/// The value is always stored in the dotted form `756.XXXX.XXXX.XX`.
/// Use [`AhvNumber::new`] for input already in the dotted form, or
/// [`FromStr`] which additionally accepts the bare 13-digit form and
/// normalizes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AhvNumber(String);

impl AhvNumber {
    /// Creates an AHV number from the dotted form
    ///
    /// # Errors
    ///
    /// Returns `AhvNumberError::InvalidFormat` if the input does not
    /// match `756.XXXX.XXXX.XX`, or `WrongCountryCode` if the leading
    /// segment is not 756.
    pub fn new(value: impl Into<String>) -> Result<Self, AhvNumberError> {
        let value = value.into();
        if !Self::has_segment_shape(&value) {
            return Err(AhvNumberError::InvalidFormat(value));
        }
        if !value.starts_with("756") {
            return Err(AhvNumberError::WrongCountryCode(value));
        }
        Ok(Self(value))
    }

    /// Creates an AHV number from the bare 13-digit form
    ///
    /// # Errors
    ///
    /// Returns `AhvNumberError::InvalidDigits` if the input is not
    /// exactly 13 digits, or `WrongCountryCode` if it does not start
    /// with 756.
    pub fn from_unformatted(digits: &str) -> Result<Self, AhvNumberError> {
        if digits.len() != 13 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(AhvNumberError::InvalidDigits(digits.to_string()));
        }
        if !digits.starts_with("756") {
            return Err(AhvNumberError::WrongCountryCode(digits.to_string()));
        }
        let formatted = format!(
            "{}.{}.{}.{}",
            &digits[0..3],
            &digits[3..7],
            &digits[7..11],
            &digits[11..13]
        );
        Ok(Self(formatted))
    }

    /// Checks whether a string matches the dotted form `756.XXXX.XXXX.XX`
    pub fn is_valid_format(value: &str) -> bool {
        Self::has_segment_shape(value) && value.starts_with("756")
    }

    /// Checks the `XXX.XXXX.XXXX.XX` digit-group shape, country aside
    fn has_segment_shape(value: &str) -> bool {
        let segments: Vec<&str> = value.split('.').collect();
        if segments.len() != 4 {
            return false;
        }
        let lengths = [3, 4, 4, 2];
        segments
            .iter()
            .zip(lengths)
            .all(|(segment, expected_len)| {
                segment.len() == expected_len && segment.chars().all(|c| c.is_ascii_digit())
            })
    }

    /// Returns the normalized dotted form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 13 digits without separators
    pub fn to_unformatted(&self) -> String {
        self.0.replace('.', "")
    }
}

impl fmt::Display for AhvNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AhvNumber {
    type Err = AhvNumberError;

    /// Parses either the dotted or the bare 13-digit form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('.') {
            Self::new(s)
        } else {
            Self::from_unformatted(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_dotted_form() {
        let ahv = AhvNumber::new("756.1234.5678.97").unwrap();
        assert_eq!(ahv.as_str(), "756.1234.5678.97");
    }

    #[test]
    fn test_from_unformatted_normalizes() {
        let ahv = AhvNumber::from_unformatted("7561234567897").unwrap();
        assert_eq!(ahv.as_str(), "756.1234.5678.97");
    }

    #[test]
    fn test_roundtrip_unformatted() {
        let ahv = AhvNumber::new("756.9217.0769.85").unwrap();
        assert_eq!(ahv.to_unformatted(), "7569217076985");
    }

    #[test]
    fn test_wrong_country_code() {
        assert_eq!(
            AhvNumber::new("757.1234.5678.97"),
            Err(AhvNumberError::WrongCountryCode("757.1234.5678.97".to_string()))
        );
    }

    #[test]
    fn test_malformed_input_rejected() {
        for input in ["", "756.1234.5678", "756.12a4.5678.97", "756-1234-5678-97", "756.12345.678.97"] {
            assert!(AhvNumber::new(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_from_str_accepts_both_forms() {
        let dotted: AhvNumber = "756.1234.5678.97".parse().unwrap();
        let bare: AhvNumber = "7561234567897".parse().unwrap();
        assert_eq!(dotted, bare);
    }

    #[test]
    fn test_structural_equality() {
        let a = AhvNumber::new("756.1234.5678.97").unwrap();
        let b = AhvNumber::from_unformatted("7561234567897").unwrap();
        assert_eq!(a, b);
        use std::collections::HashSet;
        let set: HashSet<AhvNumber> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
