//! Implementation of the canonical CPF identifier.

use crate::{CpfError, CpfResult};
use std::{fmt, str::FromStr};

/// Number of digits in a CPF.
const CPF_DIGITS: usize = 11;

/// Canonical CPF (11 ASCII digits, check digits verified).
///
/// Ordering and equality are defined on the canonical digits, so two inputs that differ only in
/// punctuation (`111.111.111-11` and `11111111111`) produce equal values.
///
/// # Construction
/// - [`Cpf::parse`] validates an externally supplied number.
/// - [`Cpf::from_base`] completes a nine-digit base with freshly computed check digits.
///
/// # Display format
/// `Display` renders the conventional `DDD.DDD.DDD-DD` layout. Use [`Cpf::as_str`] for the
/// canonical digits, which is also the form written to disk.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cpf(String);

impl Cpf {
    /// Validates and parses a CPF in canonical or formatted form.
    ///
    /// Dots, hyphens and spaces are ignored. Any other non-digit character is rejected.
    ///
    /// # Arguments
    ///
    /// * `input` - CPF text as typed by a user or read from storage.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`CpfError::InvalidCharacter`] for letters or unexpected punctuation,
    /// - [`CpfError::InvalidLength`] if the digit count is not 11,
    /// - [`CpfError::CheckDigitMismatch`] if either check digit is wrong.
    pub fn parse(input: &str) -> CpfResult<Self> {
        let mut digits = String::with_capacity(CPF_DIGITS);
        for c in input.trim().chars() {
            match c {
                '0'..='9' => digits.push(c),
                '.' | '-' | ' ' => {}
                other => return Err(CpfError::InvalidCharacter(other)),
            }
        }

        if digits.len() != CPF_DIGITS {
            return Err(CpfError::InvalidLength(digits.len()));
        }

        let values: Vec<u32> = digits.bytes().map(|b| u32::from(b - b'0')).collect();
        let first = check_digit(&values[..9]);
        let second = check_digit(&values[..10]);
        if values[9] != first || values[10] != second {
            return Err(CpfError::CheckDigitMismatch(format!(
                "expected {}{}, got {}{}",
                first, second, values[9], values[10]
            )));
        }

        Ok(Self(digits))
    }

    /// Builds a CPF from its nine-digit base, computing both check digits.
    ///
    /// # Errors
    ///
    /// Returns [`CpfError::InvalidLength`] if `base` is not exactly nine digits, or
    /// [`CpfError::InvalidCharacter`] if it contains a non-digit.
    pub fn from_base(base: &str) -> CpfResult<Self> {
        if let Some(bad) = base.chars().find(|c| !c.is_ascii_digit()) {
            return Err(CpfError::InvalidCharacter(bad));
        }
        if base.len() != 9 {
            return Err(CpfError::InvalidLength(base.len()));
        }

        let mut values: Vec<u32> = base.bytes().map(|b| u32::from(b - b'0')).collect();
        values.push(check_digit(&values));
        values.push(check_digit(&values));

        let digits = values
            .iter()
            .filter_map(|v| char::from_digit(*v, 10))
            .collect();
        Ok(Self(digits))
    }

    /// Returns the canonical 11-digit form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `input` is already canonical (11 digits, valid check digits).
    pub fn is_canonical(input: &str) -> bool {
        input.len() == CPF_DIGITS
            && input.bytes().all(|b| b.is_ascii_digit())
            && Self::parse(input).is_ok()
    }
}

/// Mod-11 check digit over `digits`, weighting the first digit with `len + 1` down to 2.
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

impl fmt::Display for Cpf {
    /// Formats as `DDD.DDD.DDD-DD`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0;
        write!(f, "{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
    }
}

impl FromStr for Cpf {
    type Err = CpfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cpf::parse(s)
    }
}

impl AsRef<str> for Cpf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Cpf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Cpf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Cpf::parse(&s).map_err(serde::de::Error::custom)
    }
}
