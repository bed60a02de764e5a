// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Back-Office Session Core
//!
//! Identity, session and access control for the retail back-office client:
//! an OpenID Connect session against Keycloak, kept alive by a background
//! token refresh, with role-based view gating and an authenticated API
//! client for every backend call.
//!
//! ## Modules
//!
//! - `identity` - Keycloak client, tokens, claims and roles
//! - `session` - Session store and token refresh scheduler
//! - `access` - View gating, landing redirect and route table
//! - `api` - Authenticated backend client with refresh-and-retry
//! - `config` - Environment configuration
//! - `telemetry` - Tracing setup

pub mod access;
pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use access::{AccessGate, GateDecision, Navigate, RedirectPolicy, RouteAccess, RouteTable};
pub use api::ApiClient;
pub use config::SessionConfig;
pub use error::ApiError;
pub use identity::{IdentityClient, IdentityError, LoginCallback};
pub use session::{Session, SessionPhase, SessionStore};
