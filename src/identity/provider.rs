// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The identity provider contract.
//!
//! Everything the session core needs from the external OpenID Connect
//! provider goes through [`IdentityProvider`]. The production implementation
//! is [`super::KeycloakProvider`]; tests script a fake.

use async_trait::async_trait;
use url::Url;

use super::claims::{Identity, TokenResponse};
use super::error::IdentityError;

/// Which interactive flow to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Login,
    Register,
}

/// Per-attempt parameters of an interactive authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub state: String,
    pub nonce: String,
    pub code_challenge: String,
}

/// Parameters the provider hands back on the redirect after an interactive login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCallback {
    pub code: String,
    pub state: String,
}

impl LoginCallback {
    /// Parse the redirect URL the provider sent the user back to.
    ///
    /// Keycloak may put the parameters in the query or, with fragment
    /// response mode, in the fragment.
    pub fn from_redirect_url(redirect: &str) -> Result<Self, IdentityError> {
        let url = Url::parse(redirect)
            .map_err(|e| IdentityError::InvalidResponse(format!("redirect URL: {e}")))?;

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        if let Some(fragment) = url.fragment() {
            pairs.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
        }
        let find = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        if let Some(error) = find("error") {
            return Err(IdentityError::Rejected {
                error,
                description: find("error_description"),
            });
        }

        match (find("code"), find("state")) {
            (Some(code), Some(state)) => Ok(Self { code, state }),
            _ => Err(IdentityError::InvalidResponse(
                "redirect URL carries no authorization code".to_string(),
            )),
        }
    }
}

/// Client-side contract with the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Non-interactive session probe.
    ///
    /// Returns `Ok(None)` when the provider has no session for this client.
    async fn check_sso(&self) -> Result<Option<TokenResponse>, IdentityError>;

    /// URL of the provider's interactive login or registration page.
    fn authorization_url(
        &self,
        kind: FlowKind,
        request: &AuthorizationRequest,
    ) -> Result<Url, IdentityError>;

    /// Exchange an authorization code (with its PKCE verifier) for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, IdentityError>;

    /// Refresh grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IdentityError>;

    /// Load the display profile of the token's owner.
    async fn load_user_profile(&self, access_token: &str) -> Result<Identity, IdentityError>;

    /// End the provider session.
    async fn logout(
        &self,
        refresh_token: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<(), IdentityError>;
}
