//! CPF identifier utilities.
//!
//! Every patient in the triage system is keyed by their CPF (Cadastro de Pessoas Físicas), the
//! eleven-digit Brazilian taxpayer number.
//!
//! To keep registry ordering and on-disk keys consistent, the system uses a *canonical* CPF
//! representation: **11 ASCII digits** with no punctuation.
//!
//! This crate provides a small wrapper type ([`Cpf`]) that *guarantees* the canonical form and a
//! valid pair of check digits once constructed.
//!
//! ## Accepted input
//! - Canonical: `11111111111`
//! - Formatted: `111.111.111-11` (dots, hyphens and spaces are ignored)
//!
//! Anything else (letters, wrong digit count, bad check digits) is rejected.
//!
//! ## Check digits
//! The last two digits are mod-11 checksums over the preceding digits:
//! - first: weights 10..=2 over digits 1-9
//! - second: weights 11..=2 over digits 1-10
//!
//! A remainder below 2 produces a check digit of 0, otherwise the digit is `11 - remainder`.

mod cpf;

pub use cpf::Cpf;

/// Error type for CPF operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CpfError {
    /// The input did not contain exactly 11 digits.
    #[error("CPF must contain exactly 11 digits, got {0}")]
    InvalidLength(usize),
    /// The input contained something other than digits and separators.
    #[error("CPF contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// One of the two trailing check digits does not match.
    #[error("CPF check digits do not match: {0}")]
    CheckDigitMismatch(String),
}

/// Result type for CPF operations.
pub type CpfResult<T> = Result<T, CpfError>;
