// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keycloak implementation of [`IdentityProvider`].
//!
//! ## Endpoints
//!
//! All endpoints are derived from the base URL and realm:
//!
//! - `{base}/realms/{realm}/protocol/openid-connect/auth` - interactive login
//! - `{base}/realms/{realm}/protocol/openid-connect/registrations` - registration
//! - `{base}/realms/{realm}/protocol/openid-connect/token` - code exchange and refresh
//! - `{base}/realms/{realm}/protocol/openid-connect/logout` - session logout
//! - `{base}/realms/{realm}/account` - user profile
//!
//! ## Silent Check
//!
//! A native client has no provider cookie to probe. The silent check instead
//! exchanges a stored refresh token, when one is configured; `invalid_grant`
//! means the stored session is gone and is reported as "no session".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client, Response};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::claims::{Identity, TokenResponse};
use super::error::IdentityError;
use super::pkce::CHALLENGE_METHOD;
use super::provider::{AuthorizationRequest, FlowKind, IdentityProvider};
use crate::config::IdentityConfig;

/// Network timeout for every provider round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct Endpoints {
    auth: String,
    registrations: String,
    token: String,
    logout: String,
    account: String,
}

impl Endpoints {
    fn new(base_url: &Url, realm: &str) -> Self {
        let realm_url = format!("{}/realms/{realm}", base_url.as_str().trim_end_matches('/'));
        let oidc = format!("{realm_url}/protocol/openid-connect");
        Self {
            auth: format!("{oidc}/auth"),
            registrations: format!("{oidc}/registrations"),
            token: format!("{oidc}/token"),
            logout: format!("{oidc}/logout"),
            account: format!("{realm_url}/account"),
        }
    }
}

/// OAuth error response from the provider.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Keycloak OIDC client for one realm and one public client.
#[derive(Debug, Clone)]
pub struct KeycloakProvider {
    endpoints: Endpoints,
    client_id: String,
    redirect_uri: String,
    stored_refresh_token: Option<String>,
    http: Client,
}

impl KeycloakProvider {
    /// Create a provider client from configuration.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoints: Endpoints::new(&config.base_url, &config.realm),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.to_string(),
            stored_refresh_token: config.stored_refresh_token.clone(),
            http,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, IdentityError> {
        let response = self
            .http
            .post(&self.endpoints.token)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(oauth_error(response).await);
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    async fn check_sso(&self) -> Result<Option<TokenResponse>, IdentityError> {
        let Some(stored) = self.stored_refresh_token.as_deref() else {
            debug!("No stored session to probe");
            return Ok(None);
        };

        match self.refresh(stored).await {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) if e.is_invalid_grant() => {
                info!("Stored session is no longer active");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn authorization_url(
        &self,
        kind: FlowKind,
        request: &AuthorizationRequest,
    ) -> Result<Url, IdentityError> {
        let endpoint = match kind {
            FlowKind::Login => &self.endpoints.auth,
            FlowKind::Register => &self.endpoints.registrations,
        };

        Url::parse_with_params(
            endpoint,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("response_mode", "query"),
                ("scope", "openid"),
                ("state", request.state.as_str()),
                ("nonce", request.nonce.as_str()),
                ("code_challenge", request.code_challenge.as_str()),
                ("code_challenge_method", CHALLENGE_METHOD),
            ],
        )
        .map_err(|e| IdentityError::Config(format!("authorization endpoint: {e}")))
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, IdentityError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IdentityError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn load_user_profile(&self, access_token: &str) -> Result<Identity, IdentityError> {
        let response = self
            .http
            .get(&self.endpoints.account)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Request(format!(
                "HTTP {} from account endpoint",
                response.status()
            )));
        }

        response
            .json::<Identity>()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))
    }

    async fn logout(
        &self,
        refresh_token: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<(), IdentityError> {
        let Some(refresh_token) = refresh_token else {
            debug!("No refresh token, nothing to end at the provider");
            return Ok(());
        };

        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(id_token) = id_token {
            form.push(("id_token_hint", id_token));
        }

        let response = self.http.post(&self.endpoints.logout).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(oauth_error(response).await);
        }
        Ok(())
    }
}

/// Map a failed token/logout response to an error.
async fn oauth_error(response: Response) -> IdentityError {
    let status = response.status();
    match response.json::<OAuthErrorBody>().await {
        Ok(body) => IdentityError::Rejected {
            error: body.error,
            description: body.error_description,
        },
        Err(_) => IdentityError::Request(format!("HTTP {status} from identity provider")),
    }
}
