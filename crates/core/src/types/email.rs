//! Validated email address newtype.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Reasons [`Email::parse`] rejects input.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EmailError {
    /// The input is empty or only whitespace.
    #[error("email is empty")]
    Empty,
    /// Longer than [`Email::MAX_LENGTH`] after trimming.
    #[error("email is longer than {max} characters")]
    TooLong {
        /// The enforced limit.
        max: usize,
    },
    /// Whitespace inside the address itself.
    #[error("email cannot contain whitespace")]
    ContainsWhitespace,
    /// No `@` separator anywhere in the input.
    #[error("email must contain an @ symbol")]
    MissingAtSymbol,
    /// Nothing before the `@`.
    #[error("email has an empty local part")]
    EmptyLocalPart,
    /// The domain part (after @) is empty or not a dotted name.
    #[error("email domain is malformed")]
    MalformedDomain,
}

/// A structurally valid email address.
///
/// Accepts raw form input: surrounding whitespace is trimmed before
/// validation, and the stored address is the trimmed string. Validation
/// here is structural only; deliverability and deeper syntax checks are
/// the credential provider's job. The goal is to reject input that could
/// never be an address before it costs a network round trip.
///
/// ## Constraints
///
/// - Length: 1-254 characters after trimming (RFC 5321 limit)
/// - No whitespace inside the address
/// - Exactly one @ with a non-empty local part before it
/// - A dotted domain after it, with no empty labels
///
/// ## Examples
///
/// ```
/// use studyhall_core::Email;
///
/// let email = Email::parse("  user@example.com ")?;
/// assert_eq!(email.as_str(), "user@example.com");
///
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@nodot").is_err());
/// assert!(Email::parse("two words@example.com").is_err());
/// # Ok::<(), studyhall_core::EmailError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Length cap from RFC 5321.
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email` from raw input.
    ///
    /// # Errors
    ///
    /// Returns an error when the trimmed input is empty, longer than 254
    /// characters, contains whitespace, lacks an @ symbol, or has an empty
    /// local part or a domain without a dot.
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
            return Err(EmailError::ContainsWhitespace);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::MissingAtSymbol)?;
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        if domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.split('.').any(str::is_empty)
        {
            return Err(EmailError::MalformedDomain);
        }

        Ok(Self(s.to_owned()))
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and yields the owned address.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Everything before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Everything after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
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
    fn test_parse_accepts_ordinary_addresses() {
        for raw in [
            "user@example.com",
            "user.name+tag@example.com",
            "USER@SUB.example.co.uk",
            "a@b.c",
        ] {
            assert!(Email::parse(raw).is_ok(), "rejected {raw}");
        }
    }

    #[test]
    fn test_parse_trims_surrounding_whitespace() {
        let email = Email::parse("  user@example.com\n").unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }

    #[test]
    fn test_parse_whitespace_only_is_empty() {
        assert!(matches!(Email::parse("   "), Err(EmailError::Empty)));
        assert!(matches!(Email::parse(""), Err(EmailError::Empty)));
    }

    #[test]
    fn test_parse_rejects_inner_whitespace() {
        assert!(matches!(
            Email::parse("two words@example.com"),
            Err(EmailError::ContainsWhitespace)
        ));
        assert!(matches!(
            Email::parse("user@exa mple.com"),
            Err(EmailError::ContainsWhitespace)
        ));
    }

    #[test]
    fn test_parse_rejects_over_long_input() {
        let long = format!("{}@example.com", "x".repeat(300));
        assert!(matches!(
            Email::parse(&long),
            Err(EmailError::TooLong { max: 254 })
        ));
    }

    #[test]
    fn test_parse_requires_an_at_symbol() {
        assert!(matches!(
            Email::parse("not-an-address"),
            Err(EmailError::MissingAtSymbol)
        ));
    }

    #[test]
    fn test_parse_requires_a_local_part() {
        assert!(matches!(
            Email::parse("@example.com"),
            Err(EmailError::EmptyLocalPart)
        ));
    }

    #[test]
    fn test_parse_rejects_bad_domains() {
        for raw in [
            "user@",
            "user@nodot",
            "user@example.",
            "user@.example.com",
            "user@exa..mple.com",
            "user@b@c.com",
        ] {
            assert!(
                matches!(Email::parse(raw), Err(EmailError::MalformedDomain)),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn test_local_part_and_domain() {
        let email = Email::parse("user@example.com").unwrap();
        assert_eq!(email.local_part(), "user");
        assert_eq!(email.domain(), "example.com");
    }

    #[test]
    fn test_display_matches_stored_address() {
        let email = Email::parse(" user@example.com ").unwrap();
        assert_eq!(format!("{email}"), "user@example.com");
    }

    #[test]
    fn test_serde_is_transparent() {
        let email = Email::parse("user@example.com").unwrap();
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"user@example.com\"");

        let parsed: Email = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, email);
    }

    #[test]
    fn test_from_str_goes_through_parse() {
        let email: Email = "user@example.com".parse().unwrap();
        assert_eq!(email.as_str(), "user@example.com");
        assert!(" not an email ".parse::<Email>().is_err());
    }
}
