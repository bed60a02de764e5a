// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Refresh Scheduler
//!
//! Background task that keeps the access token valid while a session is
//! authenticated.
//!
//! ## Strategy
//!
//! Every `interval` (default 60 s) the scheduler asks the identity client to
//! refresh the token if it expires within `min_validity` (default 70 s).
//! Checks run one after another on a single task, so they never overlap.
//!
//! A failed refresh ends the session: the scheduler logs out through the
//! store and exits.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, following the same pattern as
//! the other background pollers. The [`RefreshHandle`] is owned by the
//! session store and cancels the task when cancelled or dropped.

use std::sync::Weak;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::store::SessionStore;
use crate::config::RefreshSchedule;
use crate::identity::{IdentityError, TokenRefresh};

/// Periodic token refresh for one authenticated session.
pub struct TokenRefreshScheduler {
    store: Weak<SessionStore>,
    schedule: RefreshSchedule,
}

/// Owner's handle on a running scheduler.
pub struct RefreshHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop the scheduler. Its pending timer never fires afterwards.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// True once cancelled or exited on its own.
    pub fn is_finished(&self) -> bool {
        self.shutdown.is_cancelled() || self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl TokenRefreshScheduler {
    pub fn new(store: Weak<SessionStore>, schedule: RefreshSchedule) -> Self {
        Self { store, schedule }
    }

    /// Spawn the scheduler on the current runtime.
    pub fn spawn(self) -> RefreshHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        RefreshHandle { shutdown, task }
    }

    /// Run the refresh loop until cancelled or the session ends.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.schedule.interval.as_secs(),
            min_validity_secs = self.schedule.min_validity.as_secs(),
            "Token refresh scheduler starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.schedule.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Token refresh scheduler shutting down");
                    return;
                }
            }

            if !self.refresh_step(&shutdown).await {
                return;
            }
        }
    }

    /// One check. Returns whether the scheduler should keep running.
    async fn refresh_step(&self, shutdown: &CancellationToken) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };

        match store.identity().update_token(self.schedule.min_validity).await {
            Ok(TokenRefresh::Current) => true,
            Ok(TokenRefresh::Refreshed) => {
                debug!("Scheduled token refresh succeeded");
                true
            }
            Err(IdentityError::SessionEnded) => false,
            Err(e) => {
                if shutdown.is_cancelled() {
                    return false;
                }
                error!(error = %e, "Failed to refresh token");
                store.expire_session("scheduled token refresh failed").await;
                false
            }
        }
    }
}
