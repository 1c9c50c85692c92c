//! Security identifier validation and fallback keys.
//!
//! An [`Identifier`] is a 12-character canonical security identifier:
//! a two-letter country prefix, nine alphanumeric body characters and a
//! numeric check digit, verified by a Luhn checksum over the
//! letter-expanded digit string (A=10 .. Z=35).
//!
//! When resolution fails, exposures are keyed by a deterministic
//! [`FallbackKey`] instead, so repeated runs group the same unresolved
//! security under the same key.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const IDENTIFIER_LEN: usize = 12;
const FALLBACK_PREFIX: &str = "UNRESOLVED";
const FALLBACK_NAME_TRUNCATION: usize = 50;

/// Sentinels that must never be cached or queried as real identifiers.
const PLACEHOLDER_VALUES: &[&str] = &["", "N/A", "NA", "NULL", "NONE"];
const PLACEHOLDER_PREFIXES: &[&str] = &["FALLBACK", "UNRESOLVED", "UNKNOWN", "NON_EQUITY"];

/// Validated 12-character security identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Parse and validate a candidate identifier (trimmed, uppercased).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let candidate = input.trim().to_ascii_uppercase();
        if candidate.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }
        if is_placeholder(&candidate) {
            return Err(ValidationError::PlaceholderIdentifier { value: candidate });
        }

        let len = candidate.chars().count();
        if len != IDENTIFIER_LEN {
            return Err(ValidationError::IdentifierLength { len });
        }

        let bytes = candidate.as_bytes();
        if !bytes[..2].iter().all(u8::is_ascii_alphabetic) {
            return Err(ValidationError::IdentifierCountryCode {
                value: candidate[..2].to_string(),
            });
        }
        for (index, &byte) in bytes[2..11].iter().enumerate() {
            if !byte.is_ascii_alphanumeric() {
                return Err(ValidationError::IdentifierBody {
                    ch: byte as char,
                    index: index + 2,
                });
            }
        }
        if !bytes[11].is_ascii_digit() {
            return Err(ValidationError::IdentifierCheckDigit {
                ch: bytes[11] as char,
            });
        }

        if !luhn_checksum_valid(&candidate) {
            return Err(ValidationError::ChecksumMismatch { value: candidate });
        }

        Ok(Self(candidate))
    }

    /// Whether `candidate` is a structurally valid identifier.
    #[must_use]
    pub fn is_valid(candidate: &str) -> bool {
        Self::parse(candidate).is_ok()
    }

    /// Two-letter country prefix.
    #[must_use]
    pub fn country_code(&self) -> &str {
        &self.0[..2]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// Luhn over the letter-expanded digit string, right to left.
fn luhn_checksum_valid(candidate: &str) -> bool {
    let mut digits = Vec::with_capacity(IDENTIFIER_LEN * 2);
    for ch in candidate.chars() {
        if let Some(digit) = ch.to_digit(10) {
            digits.push(digit);
        } else {
            let expanded = ch as u32 - 'A' as u32 + 10;
            digits.push(expanded / 10);
            digits.push(expanded % 10);
        }
    }

    let mut total = 0;
    for (position, digit) in digits.iter().rev().enumerate() {
        let mut n = *digit;
        if position % 2 == 1 {
            n *= 2;
            if n > 9 {
                n -= 9;
            }
        }
        total += n;
    }

    total % 10 == 0
}

/// Whether `candidate` is a known non-identifier sentinel (empty,
/// "N/A" family, reserved-separator strings, or internal fallback
/// markers). These must never reach the cache or external lookups.
#[must_use]
pub fn is_placeholder(candidate: &str) -> bool {
    let upper = candidate.trim().to_ascii_uppercase();
    if PLACEHOLDER_VALUES.contains(&upper.as_str()) {
        return true;
    }
    if upper.contains('|') {
        return true;
    }
    PLACEHOLDER_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
}

/// Deterministic synthetic key for unresolved securities.
///
/// Format: `UNRESOLVED:{TICKER}:{hash10}` where `hash10` is a
/// ten-digit value derived from the uppercased ticker and the
/// uppercased name truncated to 50 characters. Generation is pure:
/// the same inputs always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FallbackKey(String);

impl FallbackKey {
    #[must_use]
    pub fn derive(ticker: &str, name: &str) -> Self {
        let ticker_clean = ticker.trim().to_ascii_uppercase();
        let name_clean: String = name
            .trim()
            .to_ascii_uppercase()
            .chars()
            .take(FALLBACK_NAME_TRUNCATION)
            .collect();

        let combined = format!("{ticker_clean}|{name_clean}");
        let hash10 = fnv1a_64(combined.as_bytes()) % 10_000_000_000;

        Self(format!("{FALLBACK_PREFIX}:{ticker_clean}:{hash10:010}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FallbackKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FNV-1a, 64 bit. Stable across platforms and releases, which is the
/// property fallback keys depend on.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Key for one exposure row: a real identifier when resolution
/// succeeded, otherwise a deterministic fallback key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecurityKey {
    Resolved(Identifier),
    Fallback(FallbackKey),
}

impl SecurityKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(identifier) => identifier.as_str(),
            Self::Fallback(key) => key.as_str(),
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl Display for SecurityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
