// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PKCE (RFC 7636) verifier and `S256` challenge.

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use super::error::IdentityError;

/// Challenge method sent with the authorization request.
pub const CHALLENGE_METHOD: &str = "S256";

/// Random bytes behind a verifier (encodes to 43 characters).
const VERIFIER_BYTES: usize = 32;

/// A PKCE verifier and the challenge derived from it.
#[derive(Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh verifier from the system CSPRNG.
    pub fn generate() -> Result<Self, IdentityError> {
        let mut bytes = [0u8; VERIFIER_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| IdentityError::Config("system random source unavailable".to_string()))?;
        Ok(Self::from_verifier(Base64UrlUnpadded::encode_string(&bytes)))
    }

    /// Derive the `S256` challenge for a known verifier.
    pub fn from_verifier(verifier: String) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = Base64UrlUnpadded::encode_string(&digest);
        Self {
            verifier,
            challenge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc7636_appendix_b_vector() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_verifiers_are_unique_and_url_safe() {
        let a = Pkce::generate().unwrap();
        let b = Pkce::generate().unwrap();
        assert_ne!(a.verifier, b.verifier);
        assert_eq!(a.verifier.len(), 43);
        assert!(a
            .verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
