// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authenticated API Client
//!
//! Every backend call goes through [`ApiClient`], which:
//!
//! 1. Attaches `Authorization: Bearer <token>` when a session holds a token.
//!    The token is re-read from the identity client on every attempt.
//! 2. On `401 Unauthorized`, refreshes the token once and replays the request
//!    once. A replayed request that fails again is not retried.
//! 3. Ends the session when that refresh fails, and returns the original error.
//!    A replay that is still unauthorized ends the session too.
//! 4. Normalizes every failed response into [`ApiError`].

pub mod normalize;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION},
    Client, Method, Request, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::ApiError;
use crate::identity::IdentityError;
use crate::session::SessionStore;

/// Network timeout for backend calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend client bound to the session store.
#[derive(Clone)]
pub struct ApiClient {
    store: Arc<SessionStore>,
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(store: Arc<SessionStore>, base_url: Url) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            store,
            http,
            base_url,
        })
    }

    /// Absolute URL of `path` under the API base.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| ApiError::transport(format!("invalid API path {path}: {e}")))
    }

    /// Request builder for `path`. Send the built request with [`ApiClient::send`].
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self
            .http
            .request(method, self.url(path)?)
            .header(ACCEPT, "application/json"))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path)?.build()?;
        read_json(self.send(request).await?).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path)?.json(body).build()?;
        read_json(self.send(request).await?).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PUT, path)?.json(body).build()?;
        read_json(self.send(request).await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path)?.build()?;
        self.send(request).await?;
        Ok(())
    }

    /// Send a request with the session's credentials.
    ///
    /// Returns the response if it succeeded, otherwise the normalized error.
    /// Requests whose body cannot be cloned are not replayed after a 401.
    pub async fn send(&self, request: Request) -> Result<Response, ApiError> {
        let replay = request.try_clone();
        let response = self.dispatch(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check(response).await;
        }
        let original = normalize::from_response(response).await;
        let Some(replay) = replay else {
            return Err(original);
        };

        match self.store.identity().force_refresh().await {
            Ok(_) => {}
            Err(IdentityError::SessionEnded | IdentityError::NotAuthenticated) => {
                return Err(original);
            }
            Err(e) => {
                warn!(error = %e, "Token refresh after unauthorized response failed");
                self.store
                    .expire_session("token refresh after unauthorized response failed")
                    .await;
                return Err(original);
            }
        }

        debug!(method = %replay.method(), url = %replay.url(), "Replaying request with refreshed token");
        let response = self.dispatch(replay).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let error = normalize::from_response(response).await;
            self.store
                .expire_session("request still unauthorized after token refresh")
                .await;
            return Err(error);
        }
        check(response).await
    }

    async fn dispatch(&self, mut request: Request) -> Result<Response, ApiError> {
        if let Some(token) = self.store.identity().bearer_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::transport("access token is not a valid header value"))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(self.http.execute(request).await?)
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let error = normalize::from_response(response).await;
    debug!(status = ?error.status, message = %error.message, "Backend call failed");
    Err(error)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::new(status, format!("Invalid response body: {e}")))
}
