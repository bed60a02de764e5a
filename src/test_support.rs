// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared test fixtures: unsigned tokens, a scripted identity provider and
//! a local HTTP server for mock endpoints.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::watch;
use url::Url;
use uuid::Uuid;

use crate::config::RefreshSchedule;
use crate::identity::{
    AuthorizationRequest, FlowKind, Identity, IdentityClient, IdentityError, IdentityProvider,
    TokenResponse,
};
use crate::session::SessionStore;

pub const CLIENT_ID: &str = "react-client";

/// Build a JWT with the given claims and a dummy signature.
pub fn fake_jwt(claims: Value) -> String {
    let header = json!({"alg": "RS256", "typ": "JWT"});
    format!(
        "{}.{}.signature",
        Base64UrlUnpadded::encode_string(header.to_string().as_bytes()),
        Base64UrlUnpadded::encode_string(claims.to_string().as_bytes()),
    )
}

/// Token endpoint response for a user holding `roles`.
pub fn token_response(roles: &[&str], expires_in_secs: i64) -> TokenResponse {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": "user-1",
        "jti": Uuid::new_v4().to_string(),
        "iat": now,
        "exp": now + expires_in_secs,
        "preferred_username": "linh",
        "realm_access": { "roles": roles },
        "resource_access": { "react-client": { "roles": ["client-viewer"] } }
    });
    TokenResponse {
        access_token: fake_jwt(claims),
        refresh_token: Some(format!("rt-{}", Uuid::new_v4())),
        id_token: Some("id-token".to_string()),
        expires_in: u64::try_from(expires_in_secs).ok(),
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}")).unwrap()
}

/// Session store backed by `provider` with the default refresh schedule.
pub fn store_for(provider: &Arc<FakeProvider>) -> Arc<SessionStore> {
    let identity = IdentityClient::new(provider.clone(), CLIENT_ID);
    SessionStore::new(identity, RefreshSchedule::default())
}

/// Open/closed switch a fake call waits on.
struct Gate(watch::Sender<bool>);

impl Gate {
    fn open() -> Self {
        Self(watch::Sender::new(true))
    }

    fn hold(&self) {
        self.0.send_replace(false);
    }

    fn release(&self) {
        self.0.send_replace(true);
    }

    async fn pass(&self) {
        let mut rx = self.0.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Scripted identity provider.
pub struct FakeProvider {
    roles: Vec<String>,
    signed_in: bool,
    session_expires_in: i64,
    refresh_expires_in: AtomicI64,

    check_sso_gate: Gate,
    refresh_gate: Gate,
    profile_gate: Gate,

    fail_check_sso: AtomicBool,
    fail_refresh: AtomicBool,
    fail_profile: AtomicBool,

    check_sso_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    logout_calls: AtomicUsize,

    exchange_response: Mutex<Option<TokenResponse>>,
    exchanged_verifier: Mutex<Option<String>>,
}

impl FakeProvider {
    fn build(roles: &[&str], signed_in: bool, session_expires_in: i64) -> Arc<Self> {
        Arc::new(Self {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            signed_in,
            session_expires_in,
            refresh_expires_in: AtomicI64::new(300),
            check_sso_gate: Gate::open(),
            refresh_gate: Gate::open(),
            profile_gate: Gate::open(),
            fail_check_sso: AtomicBool::new(false),
            fail_refresh: AtomicBool::new(false),
            fail_profile: AtomicBool::new(false),
            check_sso_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            exchange_response: Mutex::new(None),
            exchanged_verifier: Mutex::new(None),
        })
    }

    /// Provider holding a session whose token is valid for five minutes.
    pub fn signed_in(roles: &[&str]) -> Arc<Self> {
        Self::build(roles, true, 300)
    }

    /// Provider holding a session whose token expires in `secs`.
    pub fn signed_in_expiring(roles: &[&str], secs: i64) -> Arc<Self> {
        Self::build(roles, true, secs)
    }

    /// Provider without a session.
    pub fn signed_out() -> Arc<Self> {
        Self::build(&[], false, 300)
    }

    pub fn hold_check_sso(&self) {
        self.check_sso_gate.hold();
    }

    pub fn release_check_sso(&self) {
        self.check_sso_gate.release();
    }

    pub fn hold_refresh(&self) {
        self.refresh_gate.hold();
    }

    pub fn release_refresh(&self) {
        self.refresh_gate.release();
    }

    pub fn hold_profile(&self) {
        self.profile_gate.hold();
    }

    pub fn release_profile(&self) {
        self.profile_gate.release();
    }

    pub fn fail_check_sso(&self, fail: bool) {
        self.fail_check_sso.store(fail, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profile(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }

    /// Lifetime of tokens issued by later refreshes.
    pub fn set_refresh_expires_in(&self, secs: i64) {
        self.refresh_expires_in.store(secs, Ordering::SeqCst);
    }

    pub fn set_exchange_response(&self, response: TokenResponse) {
        *self.exchange_response.lock().unwrap() = Some(response);
    }

    pub fn exchanged_verifier(&self) -> Option<String> {
        self.exchanged_verifier.lock().unwrap().clone()
    }

    pub fn check_sso_calls(&self) -> usize {
        self.check_sso_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn issue(&self, expires_in: i64) -> TokenResponse {
        let roles: Vec<&str> = self.roles.iter().map(String::as_str).collect();
        token_response(&roles, expires_in)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn check_sso(&self) -> Result<Option<TokenResponse>, IdentityError> {
        self.check_sso_calls.fetch_add(1, Ordering::SeqCst);
        self.check_sso_gate.pass().await;
        if self.fail_check_sso.load(Ordering::SeqCst) {
            return Err(IdentityError::Request("provider unreachable".to_string()));
        }
        Ok(self.signed_in.then(|| self.issue(self.session_expires_in)))
    }

    fn authorization_url(
        &self,
        kind: FlowKind,
        request: &AuthorizationRequest,
    ) -> Result<Url, IdentityError> {
        let endpoint = match kind {
            FlowKind::Login => "https://sso.test/realms/shop/protocol/openid-connect/auth",
            FlowKind::Register => {
                "https://sso.test/realms/shop/protocol/openid-connect/registrations"
            }
        };
        Url::parse_with_params(
            endpoint,
            &[
                ("state", request.state.as_str()),
                ("code_challenge", request.code_challenge.as_str()),
            ],
        )
        .map_err(|e| IdentityError::Config(e.to_string()))
    }

    async fn exchange_code(
        &self,
        _code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, IdentityError> {
        *self.exchanged_verifier.lock().unwrap() = Some(code_verifier.to_string());
        let scripted = self.exchange_response.lock().unwrap().take();
        Ok(scripted.unwrap_or_else(|| self.issue(300)))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, IdentityError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_gate.pass().await;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(IdentityError::Rejected {
                error: "invalid_grant".to_string(),
                description: Some("Token is not active".to_string()),
            });
        }
        Ok(self.issue(self.refresh_expires_in.load(Ordering::SeqCst)))
    }

    async fn load_user_profile(&self, _access_token: &str) -> Result<Identity, IdentityError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile_gate.pass().await;
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(IdentityError::Request("HTTP 503 from account endpoint".to_string()));
        }
        Ok(Identity {
            id: Some("user-1".to_string()),
            username: Some("linh".to_string()),
            email: Some("linh@example.com".to_string()),
            first_name: Some("Linh".to_string()),
            last_name: Some("Tran".to_string()),
        })
    }

    async fn logout(
        &self,
        _refresh_token: Option<&str>,
        _id_token: Option<&str>,
    ) -> Result<(), IdentityError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
