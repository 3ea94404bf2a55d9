//! `tel:` URN construction for phone numbers.
//!
//! Vendors deliver sender numbers in whatever local format the handset used.
//! [`TelUrn::for_country`] resolves those against the channel's country so the
//! same subscriber always maps to the same international identity.

use std::fmt;

use serde::{Deserialize, Serialize};

const TEL_SCHEME: &str = "tel:";

/// Calling code, national significant number length and trunk prefix per
/// country. Countries with variable-length numbering are left out and fall
/// through to the raw value.
const COUNTRY_PLANS: &[(&str, &str, usize, Option<&str>)] = &[
    ("US", "1", 10, Some("1")),
    ("CA", "1", 10, Some("1")),
    ("GB", "44", 10, Some("0")),
    ("FR", "33", 9, Some("0")),
    ("RW", "250", 9, Some("0")),
    ("KE", "254", 9, Some("0")),
    ("UG", "256", 9, Some("0")),
    ("TZ", "255", 9, Some("0")),
    ("GH", "233", 9, Some("0")),
    ("NG", "234", 10, Some("0")),
    ("ZA", "27", 9, Some("0")),
    ("IN", "91", 10, Some("0")),
    ("PK", "92", 10, Some("0")),
    ("PH", "63", 10, Some("0")),
    ("EC", "593", 9, Some("0")),
    ("BR", "55", 11, Some("0")),
    ("MX", "52", 10, None),
];

/// A normalized `tel:` URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TelUrn {
    path: String,
}

impl TelUrn {
    /// Build a URN from a raw number as sent by the vendor, resolving local
    /// formats against `country`.
    pub fn for_country(raw: &str, country: &str) -> Self {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        if let Some(digits) = cleaned.strip_prefix('+') {
            if is_digits(digits) {
                return Self { path: cleaned };
            }
        }

        if is_digits(&cleaned) {
            if let Some(path) = internationalize(&cleaned, country) {
                return Self { path };
            }
        }

        Self {
            path: cleaned.to_lowercase(),
        }
    }

    /// The URN path without the scheme, e.g. `+15551234567`.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for TelUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TEL_SCHEME, self.path)
    }
}

impl TryFrom<String> for TelUrn {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.strip_prefix(TEL_SCHEME) {
            Some(path) if !path.is_empty() => Ok(Self {
                path: path.to_string(),
            }),
            _ => Err(format!("invalid tel URN: '{}'", value)),
        }
    }
}

impl From<TelUrn> for String {
    fn from(urn: TelUrn) -> Self {
        urn.to_string()
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn internationalize(digits: &str, country: &str) -> Option<String> {
    let (_, code, national_len, trunk) = COUNTRY_PLANS
        .iter()
        .find(|(c, _, _, _)| c.eq_ignore_ascii_case(country))?;

    if digits.len() == *national_len {
        return Some(format!("+{}{}", code, digits));
    }

    if let Some(trunk) = trunk {
        if digits.len() == national_len + trunk.len() {
            if let Some(national) = digits.strip_prefix(trunk) {
                return Some(format!("+{}{}", code, national));
            }
        }
    }

    if digits.len() == code.len() + national_len && digits.starts_with(code) {
        return Some(format!("+{}", digits));
    }

    None
}
