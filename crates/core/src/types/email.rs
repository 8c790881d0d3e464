//! Customer email address.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    #[error("email cannot contain whitespace")]
    Whitespace,
    #[error("email must have a name before the @ and a domain after it")]
    Incomplete,
}

/// A customer email address.
///
/// Checkout only needs enough validation to route confirmation mail and
/// look orders up later, so the check is structural: one `@` with text on
/// both sides and no embedded whitespace. Surrounding whitespace is trimmed.
///
/// ```
/// use openme_core::Email;
///
/// assert!(Email::parse(" shopper@example.com ").is_ok());
/// assert!(Email::parse("shopper.example.com").is_err());
/// assert!(Email::parse("shopper@").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and trim an email address.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first structural problem found.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = s.rsplit_once('@').ok_or(EmailError::MissingAtSymbol)?;
        if local.is_empty() || domain.is_empty() {
            return Err(EmailError::Incomplete);
        }

        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, used by guest order lookup.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_surrounding_whitespace() {
        let email = Email::parse("  a@b.co\n").unwrap();
        assert_eq!(email.as_str(), "a@b.co");
    }

    #[test]
    fn test_rejects_missing_at() {
        assert_eq!(Email::parse("nobody"), Err(EmailError::MissingAtSymbol));
    }

    #[test]
    fn test_rejects_empty_and_blank() {
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
    }

    #[test]
    fn test_rejects_half_addresses() {
        assert_eq!(Email::parse("@shop.com"), Err(EmailError::Incomplete));
        assert_eq!(Email::parse("me@"), Err(EmailError::Incomplete));
    }

    #[test]
    fn test_rejects_inner_whitespace() {
        assert_eq!(Email::parse("me @shop.com"), Err(EmailError::Whitespace));
    }

    #[test]
    fn test_rejects_overlong() {
        let long = format!("{}@shop.com", "x".repeat(250));
        assert!(matches!(Email::parse(&long), Err(EmailError::TooLong { .. })));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Email>("\"nope\"").is_err());
        let ok: Email = serde_json::from_str("\"me@shop.com\"").unwrap();
        assert_eq!(ok.to_string(), "me@shop.com");
    }

    #[test]
    fn test_matches_ignores_case() {
        let a = Email::parse("Me@Shop.com").unwrap();
        let b = Email::parse("me@shop.COM").unwrap();
        assert!(a.matches(&b));
    }
}
