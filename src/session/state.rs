// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session snapshot shared with every consuming view.

use serde::Serialize;

use crate::identity::{Identity, Role, RoleSet};

/// Lifecycle phase, derived from the session fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Silent check still running
    Initializing,
    /// No session
    Unauthenticated,
    /// Signed in, profile and roles still loading
    AuthenticatedLoading,
    /// Signed in with profile and roles settled
    AuthenticatedReady,
    /// Logout in progress
    LoggingOut,
}

/// The session as seen by views.
///
/// ## Invariants
///
/// - `data_loaded` implies `authenticated`
/// - `roles` is empty unless `data_loaded`
/// - `redirect_fired` is false whenever `authenticated` is false
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub authenticated: bool,
    pub loading: bool,
    pub profile: Option<Identity>,
    pub roles: RoleSet,
    pub data_loaded: bool,
    pub logging_out: bool,
    /// One-shot landing redirect guard for the current authenticated session
    pub redirect_fired: bool,
}

impl Default for Session {
    /// Empty session at application start: still loading.
    fn default() -> Self {
        Self {
            authenticated: false,
            loading: true,
            profile: None,
            roles: RoleSet::new(),
            data_loaded: false,
            logging_out: false,
            redirect_fired: false,
        }
    }
}

impl Session {
    pub fn phase(&self) -> SessionPhase {
        if self.logging_out {
            SessionPhase::LoggingOut
        } else if self.loading {
            SessionPhase::Initializing
        } else if !self.authenticated {
            SessionPhase::Unauthenticated
        } else if self.data_loaded {
            SessionPhase::AuthenticatedReady
        } else {
            SessionPhase::AuthenticatedLoading
        }
    }

    /// Reset every authenticated field to its empty value.
    pub(crate) fn sign_out(&mut self) {
        self.authenticated = false;
        self.profile = None;
        self.roles.clear();
        self.data_loaded = false;
        self.redirect_fired = false;
    }

    /// Exact role membership.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }

    pub fn has_all_roles(&self, roles: &[&str]) -> bool {
        roles.iter().all(|r| self.has_role(r))
    }

    pub fn is_manager(&self) -> bool {
        Role::Manager.granted_by(&self.roles)
    }

    pub fn is_cashier(&self) -> bool {
        Role::Cashier.granted_by(&self.roles)
    }

    pub fn is_warehouse(&self) -> bool {
        Role::Warehouse.granted_by(&self.roles)
    }
}
