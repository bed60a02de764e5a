// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The single long-lived identity client.
//!
//! ## Guarantees
//!
//! - Initialization (the silent session check) runs at most once. Concurrent
//!   callers of [`IdentityClient::ensure_initialized`] share the in-flight
//!   future; a failed attempt returns the guard to idle so a later call can
//!   retry.
//! - The token set is replaced as a whole behind an `Arc`, so readers see
//!   either the old or the new credentials, never a mix.
//! - Concurrent refreshes coalesce into one provider round trip.
//! - [`IdentityClient::clear`] starts a new session generation; anything that
//!   was in flight for the old one completes with
//!   [`IdentityError::SessionEnded`] and leaves the token slot alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::claims::{Identity, TokenSet};
use super::error::IdentityError;
use super::pkce::Pkce;
use super::provider::{AuthorizationRequest, FlowKind, IdentityProvider, LoginCallback};
use super::roles::RoleSet;

type SharedInit = Shared<BoxFuture<'static, Result<bool, IdentityError>>>;
type SharedRefresh = Shared<BoxFuture<'static, Result<TokenRefresh, IdentityError>>>;

/// Outcome of a token validity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRefresh {
    /// Token was still valid for the requested window
    Current,
    /// Token was replaced
    Refreshed,
}

enum InitState {
    Idle,
    Initializing(SharedInit),
    Initialized,
}

struct PendingLogin {
    state: String,
    code_verifier: String,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    client_id: String,
    init: Mutex<InitState>,
    tokens: RwLock<Option<Arc<TokenSet>>>,
    refresh: Mutex<Option<(u64, SharedRefresh)>>,
    pending_login: Mutex<Option<PendingLogin>>,
    generation: AtomicU64,
}

/// Handle to the process-wide identity client. Clones share state.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<Inner>,
}

impl IdentityClient {
    /// Wrap a provider. `client_id` selects which client roles are read from tokens.
    pub fn new(provider: Arc<dyn IdentityProvider>, client_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                client_id: client_id.into(),
                init: Mutex::new(InitState::Idle),
                tokens: RwLock::new(None),
                refresh: Mutex::new(None),
                pending_login: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Run the silent session check once; every caller gets its outcome.
    ///
    /// Returns whether a session is currently held.
    pub async fn ensure_initialized(&self) -> Result<bool, IdentityError> {
        let pending = {
            let mut state = lock(&self.inner.init);
            match &*state {
                InitState::Initialized => return Ok(self.is_authenticated()),
                InitState::Initializing(pending) => pending.clone(),
                InitState::Idle => {
                    let pending = initialize(self.inner.clone()).boxed().shared();
                    *state = InitState::Initializing(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// True once a silent check or login has completed.
    pub fn is_initialized(&self) -> bool {
        matches!(*lock(&self.inner.init), InitState::Initialized)
    }

    /// True while a token set is held.
    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_some()
    }

    /// Current credentials. Re-read at every point of use.
    pub fn tokens(&self) -> Option<Arc<TokenSet>> {
        self.inner
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Encoded access token for a bearer header.
    pub fn bearer_token(&self) -> Option<String> {
        self.tokens().map(|t| t.access.as_str().to_string())
    }

    /// Roles carried by the current access token.
    pub fn roles(&self) -> RoleSet {
        self.tokens()
            .map(|t| t.access.claims().roles(&self.inner.client_id))
            .unwrap_or_default()
    }

    /// Current session generation. Bumped by [`IdentityClient::clear`].
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Load the user's profile from the provider.
    pub async fn load_user_profile(&self) -> Result<Identity, IdentityError> {
        let tokens = self.tokens().ok_or(IdentityError::NotAuthenticated)?;
        self.inner
            .provider
            .load_user_profile(tokens.access.as_str())
            .await
    }

    /// Refresh the token if it expires within `min_validity`.
    pub async fn update_token(&self, min_validity: Duration) -> Result<TokenRefresh, IdentityError> {
        let tokens = self.tokens().ok_or(IdentityError::NotAuthenticated)?;
        if !tokens.access.expires_within(min_validity) {
            return Ok(TokenRefresh::Current);
        }
        self.force_refresh().await
    }

    /// Refresh the token now, joining a refresh that is already in flight.
    pub async fn force_refresh(&self) -> Result<TokenRefresh, IdentityError> {
        let generation = self.generation();
        let pending = {
            let mut slot = lock(&self.inner.refresh);
            match &*slot {
                Some((started_in, pending)) if *started_in == generation => {
                    debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                _ => {
                    let pending = refresh(self.inner.clone(), generation).boxed().shared();
                    *slot = Some((generation, pending.clone()));
                    pending
                }
            }
        };
        pending.await
    }

    /// Start an interactive login, initializing first if needed.
    ///
    /// Returns the provider URL the user must be sent to.
    pub async fn login(&self) -> Result<Url, IdentityError> {
        self.ensure_initialized().await?;
        self.start_flow(FlowKind::Login)
    }

    /// Start the provider's registration flow.
    pub async fn register(&self) -> Result<Url, IdentityError> {
        self.ensure_initialized().await?;
        self.start_flow(FlowKind::Register)
    }

    /// Prepare an interactive flow without touching initialization.
    ///
    /// A new flow replaces any pending one.
    pub fn start_flow(&self, kind: FlowKind) -> Result<Url, IdentityError> {
        let pkce = Pkce::generate()?;
        let request = AuthorizationRequest {
            state: Uuid::new_v4().to_string(),
            nonce: Uuid::new_v4().to_string(),
            code_challenge: pkce.challenge,
        };
        let url = self.inner.provider.authorization_url(kind, &request)?;

        *lock(&self.inner.pending_login) = Some(PendingLogin {
            state: request.state,
            code_verifier: pkce.verifier,
        });
        info!(flow = ?kind, "Interactive flow started");
        Ok(url)
    }

    /// Finish an interactive login from the provider's redirect.
    pub async fn complete_login(&self, callback: &LoginCallback) -> Result<(), IdentityError> {
        let pending = {
            let mut slot = lock(&self.inner.pending_login);
            let matches = slot.as_ref().is_some_and(|p| p.state == callback.state);
            if matches {
                slot.take()
            } else {
                None
            }
        };
        let pending = pending.ok_or(IdentityError::StateMismatch)?;

        let generation = self.generation();
        let response = self
            .inner
            .provider
            .exchange_code(&callback.code, &pending.code_verifier)
            .await?;

        let tokens = TokenSet::from_response(response, None)?;
        if !self.inner.store_if_current(generation, tokens) {
            return Err(IdentityError::SessionEnded);
        }
        *lock(&self.inner.init) = InitState::Initialized;
        info!("Interactive login completed");
        Ok(())
    }

    /// Drop the local session and start a new generation.
    ///
    /// Returns the credentials that were held, for the remote logout.
    pub fn clear(&self) -> Option<Arc<TokenSet>> {
        let held = {
            // Generation and slot change together so no store can land in between.
            let mut tokens = self.inner.write_tokens();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            tokens.take()
        };
        *lock(&self.inner.refresh) = None;
        *lock(&self.inner.pending_login) = None;
        held
    }

    /// End the provider session for previously held credentials.
    pub async fn remote_logout(&self, tokens: Option<Arc<TokenSet>>) -> Result<(), IdentityError> {
        let refresh_token = tokens.as_ref().and_then(|t| t.refresh_token.as_deref());
        let id_token = tokens.as_ref().and_then(|t| t.id_token.as_deref());
        self.inner.provider.logout(refresh_token, id_token).await
    }
}

impl Inner {
    fn write_tokens(&self) -> RwLockWriteGuard<'_, Option<Arc<TokenSet>>> {
        self.tokens.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `tokens` unless the session moved past `generation`.
    fn store_if_current(&self, generation: u64, tokens: TokenSet) -> bool {
        let mut slot = self.write_tokens();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *slot = Some(Arc::new(tokens));
        true
    }

    fn current_tokens(&self) -> Option<Arc<TokenSet>> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn initialize(inner: Arc<Inner>) -> Result<bool, IdentityError> {
    info!("Initializing identity client");
    let generation = inner.generation.load(Ordering::SeqCst);
    let outcome = match inner.provider.check_sso().await {
        Ok(Some(response)) => TokenSet::from_response(response, None).map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };

    let mut state = lock(&inner.init);
    match outcome {
        Ok(tokens) => {
            let authenticated = {
                let mut slot = inner.write_tokens();
                let current = inner.generation.load(Ordering::SeqCst) == generation;
                // An interactive login that finished first keeps its tokens.
                if current && slot.is_none() {
                    *slot = tokens.map(Arc::new);
                }
                current && slot.is_some()
            };
            *state = InitState::Initialized;
            info!(authenticated, "Identity client initialized");
            Ok(authenticated)
        }
        Err(e) => {
            *state = InitState::Idle;
            warn!(error = %e, "Identity client initialization failed");
            Err(e)
        }
    }
}

async fn refresh(inner: Arc<Inner>, generation: u64) -> Result<TokenRefresh, IdentityError> {
    let outcome = match inner
        .current_tokens()
        .and_then(|t| t.refresh_token.clone())
    {
        Some(refresh_token) => inner.provider.refresh(&refresh_token).await,
        None => Err(IdentityError::NotAuthenticated),
    };

    {
        let mut slot = lock(&inner.refresh);
        if matches!(&*slot, Some((started_in, _)) if *started_in == generation) {
            *slot = None;
        }
    }

    if inner.generation.load(Ordering::SeqCst) != generation {
        debug!("Discarding refresh result of an ended session");
        return Err(IdentityError::SessionEnded);
    }

    let previous = inner.current_tokens();
    let tokens = TokenSet::from_response(outcome?, previous.as_deref())?;
    let expires_in = tokens.access.expires_in();
    if !inner.store_if_current(generation, tokens) {
        debug!("Discarding refresh result of an ended session");
        return Err(IdentityError::SessionEnded);
    }
    debug!(expires_in, "Access token refreshed");
    Ok(TokenRefresh::Refreshed)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
