//! Validated value objects for the market's global identifiers.
//!
//! Construction is the only way to obtain one of these types, and
//! construction fails closed: an invalid length, a non-digit character or a
//! wrong check digit is rejected before the identifier ever reaches domain
//! code. This mirrors the value-object-with-fallible-constructor idiom used
//! throughout the rest of the workspace for anything that carries a format
//! invariant.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("expected {expected} digits, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("identifier must contain only ASCII digits")]
    NotNumeric,
    #[error("check digit mismatch: expected {expected}, got {actual}")]
    CheckDigitMismatch { expected: u8, actual: u8 },
}

/// The GS1 modulo-10 check digit used by both GSRN and GLN identifiers.
/// `body` excludes the trailing check digit itself.
fn gs1_check_digit(body: &[u8]) -> u8 {
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(position_from_right, digit)| {
            let weight = if position_from_right % 2 == 0 { 3 } else { 1 };
            u32::from(*digit) * weight
        })
        .sum();
    ((10 - (sum % 10)) % 10) as u8
}

fn parse_ascii_digits(raw: &str, expected_len: usize) -> Result<Vec<u8>, IdentifierError> {
    if raw.len() != expected_len {
        return Err(IdentifierError::WrongLength {
            expected: expected_len,
            actual: raw.len(),
        });
    }
    raw.bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                Err(IdentifierError::NotNumeric)
            }
        })
        .collect()
}

fn validate_gs1(raw: &str, expected_len: usize) -> Result<(), IdentifierError> {
    let digits = parse_ascii_digits(raw, expected_len)?;
    let (body, check) = digits.split_at(digits.len() - 1);
    let expected = gs1_check_digit(body);
    let actual = check[0];
    if expected != actual {
        return Err(IdentifierError::CheckDigitMismatch { expected, actual });
    }
    Ok(())
}

macro_rules! numeric_identifier {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

numeric_identifier!(Gsrn, "18-character global unique identifier for a metering point, GS1 check digit.");
numeric_identifier!(GridParticipantId, "13-digit identifier of a market actor (GLN), GS1 check digit.");
numeric_identifier!(PersonalNumber, "10-digit personal identification number.");
numeric_identifier!(CompanyNumber, "8-digit company registration number.");

impl Gsrn {
    pub const LENGTH: usize = 18;

    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        validate_gs1(&raw, Self::LENGTH)?;
        Ok(Self(raw))
    }
}

impl GridParticipantId {
    pub const LENGTH: usize = 13;

    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        validate_gs1(&raw, Self::LENGTH)?;
        Ok(Self(raw))
    }
}

impl PersonalNumber {
    pub const LENGTH: usize = 10;

    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        parse_ascii_digits(&raw, Self::LENGTH)?;
        Ok(Self(raw))
    }
}

impl CompanyNumber {
    pub const LENGTH: usize = 8;

    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierError> {
        let raw = raw.into();
        parse_ascii_digits(&raw, Self::LENGTH)?;
        Ok(Self(raw))
    }
}

/// A customer is identified by exactly one of a personal number or a
/// company number, never both and never neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CustomerIdentity {
    Personal(PersonalNumber),
    Company(CompanyNumber),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A syntactically valid GSRN with a correct GS1 check digit, computed
    /// by hand from the 17-digit body `5713131100000`.. padded to 17 digits.
    fn sample_gsrn_body() -> Vec<u8> {
        // 17-digit body, arbitrary but fixed for the test.
        "5713131100000123"
            .bytes()
            .map(|b| b - b'0')
            .collect()
    }

    #[test]
    fn gsrn_with_correct_check_digit_is_accepted() {
        let body = sample_gsrn_body();
        let check = gs1_check_digit(&body);
        let full = format!(
            "{}{}",
            body.iter().map(|d| d.to_string()).collect::<String>(),
            check
        );
        assert_eq!(full.len(), Gsrn::LENGTH);
        assert!(Gsrn::new(full).is_ok());
    }

    #[test]
    fn gsrn_with_wrong_check_digit_is_rejected() {
        let body = sample_gsrn_body();
        let check = gs1_check_digit(&body);
        let wrong_check = (check + 1) % 10;
        let full = format!(
            "{}{}",
            body.iter().map(|d| d.to_string()).collect::<String>(),
            wrong_check
        );
        assert!(matches!(
            Gsrn::new(full),
            Err(IdentifierError::CheckDigitMismatch { .. })
        ));
    }

    #[test]
    fn gsrn_with_wrong_length_is_rejected() {
        assert!(matches!(
            Gsrn::new("123"),
            Err(IdentifierError::WrongLength { expected: 18, actual: 3 })
        ));
    }

    #[test]
    fn personal_number_requires_exactly_ten_digits() {
        assert!(PersonalNumber::new("1234567890").is_ok());
        assert!(PersonalNumber::new("123456789").is_err());
    }

    #[test]
    fn company_number_requires_exactly_eight_digits() {
        assert!(CompanyNumber::new("12345678").is_ok());
        assert!(CompanyNumber::new("1234567").is_err());
    }

    #[test]
    fn non_numeric_input_is_rejected() {
        assert!(matches!(
            CompanyNumber::new("1234567A"),
            Err(IdentifierError::NotNumeric)
        ));
    }
}
