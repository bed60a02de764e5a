// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access Control
//!
//! Decisions views make from the session: whether to render a protected
//! view ([`AccessGate`]), where to land after sign-in ([`RedirectPolicy`])
//! and which role each back-office route needs ([`RouteTable`]).
//!
//! Routing itself is external; these types only emit [`Navigate`]
//! instructions.

pub mod gate;
pub mod redirect;
pub mod routes;

use serde::Serialize;

pub use gate::{AccessGate, GateDecision};
pub use redirect::RedirectPolicy;
pub use routes::{RouteAccess, RouteTable};

/// Public entry view every denial is sent to.
pub const ENTRY_PATH: &str = "/home";

/// A declarative navigation instruction for the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigate {
    pub to: String,
    /// Replace the current history entry instead of pushing
    pub replace: bool,
}

impl Navigate {
    /// Navigate to `to`, replacing the current history entry.
    pub fn replace(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            replace: true,
        }
    }
}

/// Path component of a location, without query or fragment.
pub(crate) fn path_of(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    &location[..end]
}
