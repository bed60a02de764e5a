// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guard for protected views.

use super::{Navigate, ENTRY_PATH};
use crate::session::Session;

/// What a protected view should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Session data still in flight; show the waiting state
    Wait,
    /// Show the protected view
    Render,
    /// Leave for another view
    Redirect(Navigate),
}

/// Declarative guard around a protected view.
///
/// Holds no state of its own: every decision is a function of the session
/// passed in, so a gate can be evaluated on every render and mounted any
/// number of times.
///
/// A missing role and a missing session both send the user to the entry
/// view, so the denial does not reveal which protected areas exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    required_role: Option<String>,
    entry_path: String,
}

impl AccessGate {
    /// Gate open to any authenticated user.
    pub fn authenticated() -> Self {
        Self {
            required_role: None,
            entry_path: ENTRY_PATH.to_string(),
        }
    }

    /// Gate requiring `role` (exact role name).
    pub fn requiring(role: impl Into<String>) -> Self {
        Self {
            required_role: Some(role.into()),
            ..Self::authenticated()
        }
    }

    /// Send denials somewhere other than the default entry view.
    pub fn with_entry_path(mut self, path: impl Into<String>) -> Self {
        self.entry_path = path.into();
        self
    }

    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    pub fn evaluate(&self, session: &Session) -> GateDecision {
        if session.loading || !session.data_loaded {
            return GateDecision::Wait;
        }
        if !session.authenticated || session.profile.is_none() {
            return self.deny();
        }
        match &self.required_role {
            Some(role) if !session.roles.contains(role) => self.deny(),
            _ => GateDecision::Render,
        }
    }

    fn deny(&self) -> GateDecision {
        GateDecision::Redirect(Navigate::replace(self.entry_path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    fn session(authenticated: bool, data_loaded: bool, roles: &[&str]) -> Session {
        Session {
            authenticated,
            loading: false,
            profile: authenticated.then(Identity::default),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            data_loaded,
            logging_out: false,
            redirect_fired: false,
        }
    }

    fn to_entry() -> GateDecision {
        GateDecision::Redirect(Navigate::replace("/home"))
    }

    #[test]
    fn waits_while_initializing() {
        let gate = AccessGate::requiring("CASHIER");
        assert_eq!(gate.evaluate(&Session::default()), GateDecision::Wait);
    }

    #[test]
    fn waits_while_data_loads_instead_of_denying() {
        let gate = AccessGate::requiring("CASHIER");
        let session = session(true, false, &[]);
        assert_eq!(gate.evaluate(&session), GateDecision::Wait);
    }

    #[test]
    fn renders_for_matching_role() {
        let gate = AccessGate::requiring("CASHIER");
        assert_eq!(
            gate.evaluate(&session(true, true, &["CASHIER"])),
            GateDecision::Render
        );
    }

    #[test]
    fn role_mismatch_looks_like_signed_out() {
        let gate = AccessGate::requiring("MANAGER");
        assert_eq!(gate.evaluate(&session(true, true, &["CASHIER"])), to_entry());

        let signed_out = session(false, true, &[]);
        assert_eq!(gate.evaluate(&signed_out), to_entry());
    }

    #[test]
    fn missing_profile_is_denied() {
        let gate = AccessGate::authenticated();
        let mut degraded = session(true, true, &["CASHIER"]);
        degraded.profile = None;
        assert_eq!(gate.evaluate(&degraded), to_entry());
    }

    #[test]
    fn any_authenticated_user_passes_open_gate() {
        let gate = AccessGate::authenticated();
        assert_eq!(gate.evaluate(&session(true, true, &[])), GateDecision::Render);
    }

    #[test]
    fn custom_entry_path() {
        let gate = AccessGate::requiring("MANAGER").with_entry_path("/login");
        assert_eq!(
            gate.evaluate(&session(true, true, &["CASHIER"])),
            GateDecision::Redirect(Navigate::replace("/login"))
        );
    }
}
