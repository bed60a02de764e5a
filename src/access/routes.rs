// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route table of the back-office application.

use super::gate::{AccessGate, GateDecision};
use super::{path_of, Navigate, ENTRY_PATH};
use crate::identity::Role;
use crate::session::Session;

/// How a route is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// Open to everyone
    Public,
    /// Alias that forwards elsewhere
    Redirect(String),
    /// Behind an access gate
    Protected(AccessGate),
}

/// Path to access rule mapping. Unknown paths go to the entry view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<(String, RouteAccess)>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            routes: vec![
                ("/".to_string(), RouteAccess::Redirect(ENTRY_PATH.to_string())),
                (ENTRY_PATH.to_string(), RouteAccess::Public),
                (
                    "/cash".to_string(),
                    RouteAccess::Protected(AccessGate::requiring(Role::Cashier.as_str())),
                ),
                (
                    "/warehouse".to_string(),
                    RouteAccess::Protected(AccessGate::requiring(Role::Warehouse.as_str())),
                ),
                (
                    "/admin".to_string(),
                    RouteAccess::Protected(AccessGate::requiring(Role::Manager.as_str())),
                ),
            ],
        }
    }
}

impl RouteTable {
    pub fn empty() -> Self {
        Self { routes: Vec::new() }
    }

    /// Add or replace a route.
    pub fn with_route(mut self, path: impl Into<String>, access: RouteAccess) -> Self {
        let path = path.into();
        self.routes.retain(|(p, _)| *p != path);
        self.routes.push((path, access));
        self
    }

    pub fn access(&self, location: &str) -> Option<&RouteAccess> {
        let path = path_of(location);
        self.routes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, access)| access)
    }

    /// Decide what to show for `location` given the session.
    pub fn resolve(&self, location: &str, session: &Session) -> GateDecision {
        match self.access(location) {
            Some(RouteAccess::Public) => GateDecision::Render,
            Some(RouteAccess::Redirect(to)) => GateDecision::Redirect(Navigate::replace(to.clone())),
            Some(RouteAccess::Protected(gate)) => gate.evaluate(session),
            None => GateDecision::Redirect(Navigate::replace(ENTRY_PATH)),
        }
    }
}
