//! Credential handling.
//!
//! Secrets are wiped from memory on drop and never printed by `Debug`.
//! Access tokens are supplied from outside the process (environment or
//! settings builder) and compared in constant time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that is zeroized on drop and redacted in debug output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the secret value. Avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Secret)
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("***")
    }
}

/// Bearer token required by the service boundary.
///
/// Rotating the token means building new settings with a new value; nothing
/// is hardcoded.
#[derive(Clone, Debug)]
pub struct AccessToken(Secret);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare a presented token without short-circuiting on the first
    /// mismatching byte.
    pub fn verify(&self, presented: &str) -> bool {
        constant_time_eq(self.0.expose().as_bytes(), presented.as_bytes())
    }
}

fn constant_time_eq(expected: &[u8], presented: &[u8]) -> bool {
    if expected.len() != presented.len() {
        return false;
    }
    let diff = expected
        .iter()
        .zip(presented)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    std::hint::black_box(diff) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_secret_serializes_redacted() {
        let json = serde_json::to_string(&Secret::new("hunter2")).unwrap();
        assert_eq!(json, "\"***\"");
    }

    #[test]
    fn test_access_token_verify() {
        let token = AccessToken::new("rotating-token-2026");
        assert!(token.verify("rotating-token-2026"));
        assert!(!token.verify("rotating-token-2025"));
        assert!(!token.verify("rotating"));
        assert!(!token.verify(""));
    }
}
