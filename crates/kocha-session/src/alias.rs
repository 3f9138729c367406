//! Rules for what counts as a legal alias.

use std::fmt;

use kocha_protocol::SERVER_ALIAS;

/// Longest accepted alias, in characters.
pub const MAX_ALIAS_LEN: usize = 32;

/// Why an alias was refused at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasRejection {
    Empty,
    ContainsWhitespace,
    /// `:` separates sender from content in client renderings.
    ContainsColon,
    /// The alias is the reserved server alias.
    Reserved,
    TooLong,
    /// Another connection is logged in under this alias.
    Taken,
}

impl fmt::Display for AliasRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "alias must not be empty"),
            Self::ContainsWhitespace => write!(f, "alias must not contain whitespace"),
            Self::ContainsColon => write!(f, "alias must not contain ':'"),
            Self::Reserved => write!(f, "alias is reserved"),
            Self::TooLong => write!(f, "alias must be at most {MAX_ALIAS_LEN} characters"),
            Self::Taken => write!(f, "alias is already taken"),
        }
    }
}

/// Checks the shape of an alias. Uniqueness is checked by the registry.
pub fn validate_alias(alias: &str) -> Result<(), AliasRejection> {
    if alias.is_empty() {
        return Err(AliasRejection::Empty);
    }
    if alias.chars().any(char::is_whitespace) {
        return Err(AliasRejection::ContainsWhitespace);
    }
    if alias.contains(':') {
        return Err(AliasRejection::ContainsColon);
    }
    if alias == SERVER_ALIAS {
        return Err(AliasRejection::Reserved);
    }
    if alias.chars().count() > MAX_ALIAS_LEN {
        return Err(AliasRejection::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_alias_accepts_plain_names() {
        assert_eq!(validate_alias("alice"), Ok(()));
        assert_eq!(validate_alias("Bob_99"), Ok(()));
        assert_eq!(validate_alias("jürgen"), Ok(()));
    }

    #[test]
    fn test_validate_alias_rejects_empty() {
        assert_eq!(validate_alias(""), Err(AliasRejection::Empty));
    }

    #[test]
    fn test_validate_alias_rejects_any_whitespace() {
        assert_eq!(validate_alias("a b"), Err(AliasRejection::ContainsWhitespace));
        assert_eq!(validate_alias("a\tb"), Err(AliasRejection::ContainsWhitespace));
        assert_eq!(validate_alias("ab\n"), Err(AliasRejection::ContainsWhitespace));
    }

    #[test]
    fn test_validate_alias_rejects_colon() {
        assert_eq!(validate_alias("a:b"), Err(AliasRejection::ContainsColon));
        assert_eq!(validate_alias(":"), Err(AliasRejection::ContainsColon));
    }

    #[test]
    fn test_validate_alias_rejects_server_alias() {
        assert_eq!(validate_alias(SERVER_ALIAS), Err(AliasRejection::Reserved));
    }

    #[test]
    fn test_validate_alias_length_limit_counts_characters() {
        assert_eq!(validate_alias(&"é".repeat(MAX_ALIAS_LEN)), Ok(()));
        assert_eq!(
            validate_alias(&"x".repeat(MAX_ALIAS_LEN + 1)),
            Err(AliasRejection::TooLong)
        );
    }
}
