//! Opaque bearer credential.

use secrecy::{ExposeSecret, SecretString};

/// Bearer token authorizing requests for the current session.
///
/// `Debug` is redacted; the raw value is only reachable through
/// [`Credential::expose`].
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a raw token. Blank tokens are not credentials.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(SecretString::from(trimmed.to_string())))
    }

    /// Opaque locally generated credential for backends that track the
    /// session server-side and hand out no token.
    pub fn session_local() -> Self {
        Self(SecretString::from(format!("session-{}", uuid::Uuid::new_v4())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self(SecretString::from(self.expose().to_string()))
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tokens_rejected() {
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn debug_is_redacted() {
        let c = Credential::new("super-secret").unwrap();
        assert!(!format!("{c:?}").contains("super-secret"));
    }

    #[test]
    fn session_local_tokens_differ() {
        assert_ne!(Credential::session_local(), Credential::session_local());
    }
}
