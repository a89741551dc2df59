use std::sync::LazyLock;

use regex::Regex;

static USER_ID_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9]{1,20}$").ok());
static USERNAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").ok());

/// A whitelist target as typed by an operator: a numeric user id, or a
/// username with or without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountIdentifier {
    UserId(String),
    Username(String),
}

impl AccountIdentifier {
    /// Parse operator input. Returns `None` for anything that is neither a
    /// numeric id nor a valid handle.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let (had_at, body) = match trimmed.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if !had_at && matches(&USER_ID_RE, body) {
            return Some(Self::UserId(body.to_string()));
        }
        if matches(&USERNAME_RE, body) {
            return Some(Self::Username(body.to_string()));
        }
        None
    }
}

impl std::fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserId(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

fn matches(re: &LazyLock<Option<Regex>>, s: &str) -> bool {
    re.as_ref().is_some_and(|r| r.is_match(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_input_is_user_id() {
        assert_eq!(
            AccountIdentifier::parse("2244994945"),
            Some(AccountIdentifier::UserId("2244994945".to_string()))
        );
    }

    #[test]
    fn at_prefix_forces_username() {
        assert_eq!(
            AccountIdentifier::parse("@jack"),
            Some(AccountIdentifier::Username("jack".to_string()))
        );
        assert_eq!(
            AccountIdentifier::parse("@12345"),
            Some(AccountIdentifier::Username("12345".to_string()))
        );
    }

    #[test]
    fn bare_handle_is_username() {
        assert_eq!(
            AccountIdentifier::parse("  rust_lang "),
            Some(AccountIdentifier::Username("rust_lang".to_string()))
        );
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(AccountIdentifier::parse(""), None);
        assert_eq!(AccountIdentifier::parse("@"), None);
        assert_eq!(AccountIdentifier::parse("has space"), None);
        assert_eq!(AccountIdentifier::parse("way_too_long_for_a_handle"), None);
        assert_eq!(AccountIdentifier::parse("dash-name"), None);
    }

    #[test]
    fn display_adds_at_for_usernames() {
        assert_eq!(AccountIdentifier::Username("a".into()).to_string(), "@a");
        assert_eq!(AccountIdentifier::UserId("9".into()).to_string(), "9");
    }
}
