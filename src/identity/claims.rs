// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token claims, token sets and the user identity.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::IdentityError;
use super::roles::RoleSet;

/// Claims read from a Keycloak access token.
///
/// Only what the session core needs is decoded; everything else in the
/// token is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Email address
    #[serde(default)]
    pub email: Option<String>,

    /// Login name
    #[serde(default)]
    pub preferred_username: Option<String>,

    /// Realm-level roles
    #[serde(default)]
    pub realm_access: Option<RoleClaim>,

    /// Client-level roles keyed by client id
    #[serde(default)]
    pub resource_access: HashMap<String, RoleClaim>,
}

/// A `{ "roles": [...] }` claim object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AccessClaims {
    /// Realm roles merged with the roles granted on `client_id`.
    pub fn roles(&self, client_id: &str) -> RoleSet {
        let realm = self
            .realm_access
            .iter()
            .flat_map(|claim| claim.roles.iter());
        let client = self
            .resource_access
            .get(client_id)
            .into_iter()
            .flat_map(|claim| claim.roles.iter());
        realm.chain(client).cloned().collect()
    }
}

/// A bearer access token together with its decoded claims.
#[derive(Clone)]
pub struct AccessToken {
    raw: String,
    claims: AccessClaims,
}

impl AccessToken {
    /// Decode an access token issued by the identity provider.
    ///
    /// The signature is not checked here: the provider issued the token
    /// over TLS and the backend verifies it on every call.
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        let data = jsonwebtoken::dangerous::insecure_decode::<AccessClaims>(&raw)
            .map_err(|e| IdentityError::MalformedToken(e.to_string()))?;
        Ok(Self {
            raw,
            claims: data.claims,
        })
    }

    /// The encoded token, as sent in `Authorization: Bearer`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    /// Seconds until expiry (negative once expired).
    pub fn expires_in(&self) -> i64 {
        self.claims.exp - Utc::now().timestamp()
    }

    /// True if the token expires within `window` from now.
    pub fn expires_within(&self, window: Duration) -> bool {
        let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        self.expires_in() < window
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The encoded token never goes to logs.
        f.debug_struct("AccessToken")
            .field("sub", &self.claims.sub)
            .field("exp", &self.claims.exp)
            .finish_non_exhaustive()
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// The credentials of one authenticated session.
///
/// Replaced as a whole on every refresh so readers never observe a mix of
/// old and new values.
#[derive(Clone)]
pub struct TokenSet {
    pub access: AccessToken,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

impl TokenSet {
    /// Build a token set from a token endpoint response.
    ///
    /// A refresh response may omit the refresh token; `previous` supplies the
    /// one still in use.
    pub fn from_response(
        response: TokenResponse,
        previous: Option<&TokenSet>,
    ) -> Result<Self, IdentityError> {
        let access = AccessToken::parse(response.access_token)?;
        let refresh_token = response
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));
        let id_token = response
            .id_token
            .or_else(|| previous.and_then(|p| p.id_token.clone()));
        Ok(Self {
            access,
            refresh_token,
            id_token,
        })
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access", &self.access)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Display attributes of the signed-in user.
///
/// Shaped after the Keycloak account endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// External subject id
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Identity {
    /// Best available name for display.
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => self.username.clone().or_else(|| self.email.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fake_jwt;
    use serde_json::json;

    fn sample_token() -> AccessToken {
        AccessToken::parse(fake_jwt(json!({
            "sub": "user-123",
            "exp": Utc::now().timestamp() + 300,
            "iat": Utc::now().timestamp(),
            "preferred_username": "linh",
            "realm_access": { "roles": ["CASHIER", "offline_access"] },
            "resource_access": {
                "react-client": { "roles": ["WAREHOUSE"] },
                "account": { "roles": ["manage-account"] }
            }
        })))
        .unwrap()
    }

    #[test]
    fn roles_merge_realm_and_own_client() {
        let token = sample_token();
        let roles = token.claims().roles("react-client");
        assert!(roles.contains("CASHIER"));
        assert!(roles.contains("WAREHOUSE"));
        assert!(roles.contains("offline_access"));
        assert!(!roles.contains("manage-account"));
    }

    #[test]
    fn roles_tolerate_missing_claims() {
        let token = AccessToken::parse(fake_jwt(json!({
            "sub": "user-123",
            "exp": Utc::now().timestamp() + 300
        })))
        .unwrap();
        assert!(token.claims().roles("react-client").is_empty());
    }

    #[test]
    fn expiry_window() {
        let token = sample_token();
        assert!(!token.expires_within(Duration::from_secs(70)));
        assert!(token.expires_within(Duration::from_secs(600)));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = AccessToken::parse("not-a-jwt").unwrap_err();
        assert_eq!(err.error_code(), "malformed_token");
    }

    #[test]
    fn refresh_response_keeps_previous_refresh_token() {
        let first = TokenSet::from_response(
            TokenResponse {
                access_token: fake_jwt(json!({"sub": "u", "exp": Utc::now().timestamp() + 60})),
                refresh_token: Some("rt-1".to_string()),
                id_token: Some("id-1".to_string()),
                expires_in: Some(60),
            },
            None,
        )
        .unwrap();
        let second = TokenSet::from_response(
            TokenResponse {
                access_token: fake_jwt(json!({"sub": "u", "exp": Utc::now().timestamp() + 120})),
                refresh_token: None,
                id_token: None,
                expires_in: Some(120),
            },
            Some(&first),
        )
        .unwrap();
        assert_eq!(second.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(second.id_token.as_deref(), Some("id-1"));
    }

    #[test]
    fn debug_output_hides_token() {
        let token = sample_token();
        let debug = format!("{token:?}");
        assert!(!debug.contains(token.as_str()));
        assert!(debug.contains("user-123"));
    }

    #[test]
    fn display_name_prefers_full_name() {
        let identity = Identity {
            username: Some("linh".to_string()),
            first_name: Some("Linh".to_string()),
            last_name: Some("Tran".to_string()),
            ..Default::default()
        };
        assert_eq!(identity.display_name().as_deref(), Some("Linh Tran"));

        let bare = Identity {
            username: Some("linh".to_string()),
            ..Default::default()
        };
        assert_eq!(bare.display_name().as_deref(), Some("linh"));
    }
}
