use std::fmt;

use crate::error::{AppError, Result};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;

/// The size of a session token in bytes.
pub const TOKEN_SIZE: usize = 32;
/// The size of a password salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Opaque bearer credential proving a live session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken([u8; TOKEN_SIZE]);

impl SessionToken {
    /// Generates a new random session token.
    pub fn generate() -> Self {
        let mut token = [0u8; TOKEN_SIZE];
        OsRng.fill_bytes(&mut token);
        Self(token)
    }

    /// Parses the wire form of a token.
    ///
    /// Anything that is not exactly [`TOKEN_SIZE`] bytes of base64 is rejected
    /// as unauthorized; standard and URL-safe alphabets are both accepted.
    pub fn parse(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .or_else(|_| general_purpose::STANDARD.decode(encoded))
            .map_err(|_| AppError::Unauthorized("malformed session token".to_string()))?;

        let token: [u8; TOKEN_SIZE] = bytes
            .try_into()
            .map_err(|_| AppError::Unauthorized("malformed session token".to_string()))?;

        Ok(Self(token))
    }

    /// Returns the URL-safe base64 wire form.
    pub fn encode(&self) -> String {
        general_purpose::URL_SAFE_NO_PAD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; TOKEN_SIZE]) -> Self {
        Self(bytes)
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Generates a new random password salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_parses_back() {
        let token = SessionToken::generate();
        let parsed = SessionToken::parse(&token.encode()).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn standard_alphabet_is_accepted() {
        let token = SessionToken::from_bytes([0xfb; TOKEN_SIZE]);
        let standard = general_purpose::STANDARD.encode(token.as_bytes());
        assert_eq!(SessionToken::parse(&standard).unwrap(), token);
    }

    #[test]
    fn malformed_tokens_are_unauthorized() {
        let short = general_purpose::STANDARD.encode([1u8; 31]);
        for raw in ["", "not base64 !!", "c2hvcnQ", short.as_str()] {
            assert!(
                matches!(SessionToken::parse(raw), Err(AppError::Unauthorized(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn debug_hides_token_bytes() {
        let token = SessionToken::from_bytes([7; TOKEN_SIZE]);
        assert_eq!(format!("{:?}", token), "SessionToken(..)");
    }
}
