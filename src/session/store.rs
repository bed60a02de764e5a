// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The session store.
//!
//! One store exists per running application. It owns the identity client,
//! the session state (published through a `tokio::sync::watch` channel) and
//! the refresh scheduler handle. All state transitions happen here.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use url::Url;

use super::refresh::{RefreshHandle, TokenRefreshScheduler};
use super::state::Session;
use crate::access::{AccessGate, GateDecision, Navigate, RedirectPolicy, RouteTable};
use crate::api::ApiClient;
use crate::config::{RefreshSchedule, SessionConfig};
use crate::error::ApiError;
use crate::identity::{
    FlowKind, Identity, IdentityClient, IdentityError, KeycloakProvider, LoginCallback, RoleSet,
};

pub struct SessionStore {
    me: Weak<SessionStore>,
    identity: IdentityClient,
    state: watch::Sender<Session>,
    refresh: Mutex<Option<RefreshHandle>>,
    schedule: RefreshSchedule,
    redirect: RedirectPolicy,
}

impl SessionStore {
    /// Create the store with the default landing policy.
    pub fn new(identity: IdentityClient, schedule: RefreshSchedule) -> Arc<Self> {
        Self::with_redirect_policy(identity, schedule, RedirectPolicy::default())
    }

    pub fn with_redirect_policy(
        identity: IdentityClient,
        schedule: RefreshSchedule,
        redirect: RedirectPolicy,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(Session::default());
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            identity,
            state,
            refresh: Mutex::new(None),
            schedule,
            redirect,
        })
    }

    /// Build a store talking to the configured Keycloak realm.
    pub fn from_config(config: &SessionConfig) -> Result<Arc<Self>, IdentityError> {
        let provider = KeycloakProvider::new(&config.identity)?;
        let identity = IdentityClient::new(Arc::new(provider), config.identity.client_id.clone());
        Ok(Self::new(identity, config.refresh))
    }

    /// Watch every session transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Current session state.
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub(crate) fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    /// True while a refresh scheduler is running.
    pub fn refresh_scheduled(&self) -> bool {
        lock(&self.refresh)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Authenticated API client for `base_url`.
    pub fn api_client(&self, base_url: Url) -> Result<ApiClient, ApiError> {
        let store = self
            .me
            .upgrade()
            .ok_or_else(|| ApiError::transport("session store is shutting down"))?;
        ApiClient::new(store, base_url)
    }

    /// Run the silent session check (once per process) and settle the
    /// initial state.
    ///
    /// Safe to call from any number of views. Returns whether the user is
    /// signed in; initialization failures leave the session signed out.
    pub async fn init(&self) -> bool {
        match self.identity.ensure_initialized().await {
            Ok(authenticated) => {
                let mut became_authenticated = false;
                self.state.send_if_modified(|s| {
                    if s.logging_out {
                        return false;
                    }
                    if authenticated && !s.authenticated {
                        s.loading = false;
                        s.authenticated = true;
                        became_authenticated = true;
                        return true;
                    }
                    if s.loading {
                        s.loading = false;
                        return true;
                    }
                    false
                });

                if became_authenticated {
                    self.on_authenticated().await;
                }
                authenticated
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize identity client");
                self.state.send_if_modified(|s| {
                    if !s.loading {
                        return false;
                    }
                    s.loading = false;
                    s.sign_out();
                    true
                });
                false
            }
        }
    }

    /// Start an interactive login. Returns the provider URL to open.
    ///
    /// Resets the landing redirect guard so the next sign-in lands again.
    pub async fn login(&self) -> Result<Url, IdentityError> {
        self.state.send_if_modified(|s| {
            let changed = s.redirect_fired;
            s.redirect_fired = false;
            changed
        });
        self.init().await;
        self.identity.start_flow(FlowKind::Login)
    }

    /// Start the provider's registration flow.
    pub async fn register(&self) -> Result<Url, IdentityError> {
        self.init().await;
        self.identity.start_flow(FlowKind::Register)
    }

    /// Finish an interactive login from the provider's redirect back.
    pub async fn complete_login(&self, callback: &LoginCallback) -> Result<(), IdentityError> {
        self.identity.complete_login(callback).await?;

        self.state.send_modify(|s| {
            s.loading = false;
            s.authenticated = true;
            s.data_loaded = false;
            s.roles.clear();
            s.redirect_fired = false;
        });
        self.on_authenticated().await;
        Ok(())
    }

    /// Sign out: stop the scheduler, clear the session, end the provider session.
    pub async fn logout(&self) {
        let began = self.state.send_if_modified(|s| {
            if s.logging_out {
                return false;
            }
            s.logging_out = true;
            true
        });
        if !began {
            debug!("Logout already in progress");
            return;
        }
        self.teardown().await;
    }

    /// Log out because the session cannot be kept alive.
    ///
    /// No-op unless a session is currently authenticated, so a failure that
    /// several callers observe causes a single logout.
    pub(crate) async fn expire_session(&self, reason: &str) {
        let began = self.state.send_if_modified(|s| {
            if s.logging_out || !s.authenticated {
                return false;
            }
            s.logging_out = true;
            true
        });
        if !began {
            return;
        }
        warn!(reason, "Session expired, logging out");
        self.teardown().await;
    }

    async fn teardown(&self) {
        self.stop_refresh_scheduler();
        let held = self.identity.clear();
        self.state.send_modify(|s| {
            s.sign_out();
            s.loading = false;
        });

        if let Err(e) = self.identity.remote_logout(held).await {
            warn!(error = %e, "Provider logout failed, local session already cleared");
        }

        self.state.send_modify(|s| s.logging_out = false);
        info!("Logged out");
    }

    /// Landing redirect for a freshly signed-in user at `location`.
    ///
    /// Fires at most once per authenticated session: the guard is set as
    /// soon as the session is ready, whether or not a navigation results.
    pub fn landing_redirect(&self, location: &str) -> Option<Navigate> {
        let mut destination = None;
        self.state.send_if_modified(|s| {
            if !s.authenticated || !s.data_loaded || s.roles.is_empty() || s.redirect_fired {
                return false;
            }
            s.redirect_fired = true;
            destination = self.redirect.destination(location, &s.roles);
            true
        });

        if let Some(navigate) = &destination {
            info!(from = location, to = %navigate.to, "Redirecting to landing view");
        }
        destination
    }

    /// Decision for a view requiring `required_role` (any signed-in user if `None`).
    pub fn gate(&self, required_role: Option<&str>) -> GateDecision {
        let gate = match required_role {
            Some(role) => AccessGate::requiring(role),
            None => AccessGate::authenticated(),
        };
        self.evaluate(&gate)
    }

    /// Evaluate a gate against the current session.
    pub fn evaluate(&self, gate: &AccessGate) -> GateDecision {
        gate.evaluate(&self.state.borrow())
    }

    /// Resolve a location through a route table.
    pub fn resolve(&self, table: &RouteTable, location: &str) -> GateDecision {
        table.resolve(location, &self.state.borrow())
    }

    async fn on_authenticated(&self) {
        self.start_refresh_scheduler();
        self.load_user_data().await;
    }

    /// Load profile and roles together; publish both once both settle.
    async fn load_user_data(&self) {
        let generation = self.identity.generation();
        let (profile, roles) = tokio::join!(self.load_profile(), self.load_roles());

        if self.identity.generation() != generation {
            debug!("Session ended while user data was loading");
            return;
        }

        self.state.send_if_modified(|s| {
            if !s.authenticated || s.logging_out {
                return false;
            }
            s.profile = profile;
            s.roles = roles;
            s.data_loaded = true;
            true
        });
    }

    async fn load_profile(&self) -> Option<Identity> {
        match self.identity.load_user_profile().await {
            Ok(profile) => {
                debug!(user = ?profile.username, "User profile loaded");
                Some(profile)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load user profile");
                None
            }
        }
    }

    /// Roles are read from claims that stay valid for the refresh window.
    async fn load_roles(&self) -> RoleSet {
        if let Err(e) = self.identity.update_token(self.schedule.min_validity).await {
            warn!(error = %e, "Failed to refresh token before reading roles, using current claims");
        }
        let roles = self.identity.roles();
        debug!(roles = ?roles, "User roles loaded");
        roles
    }

    fn start_refresh_scheduler(&self) {
        let mut slot = lock(&self.refresh);
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Token refresh scheduler already running");
            return;
        }
        let scheduler = TokenRefreshScheduler::new(self.me.clone(), self.schedule);
        *slot = Some(scheduler.spawn());
    }

    fn stop_refresh_scheduler(&self) {
        if let Some(handle) = lock(&self.refresh).take() {
            handle.cancel();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
