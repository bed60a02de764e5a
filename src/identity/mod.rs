// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Module
//!
//! Client side of the OpenID Connect session with Keycloak.
//!
//! ## Auth Flow
//!
//! 1. On start, [`IdentityClient::ensure_initialized`] runs the silent check once
//! 2. If there is no session, `login()` / `register()` produce the provider URL
//!    to send the user to (authorization code + PKCE `S256`)
//! 3. The provider redirects back; `complete_login()` exchanges the code
//! 4. Access token claims yield the role set:
//!    - `realm_access.roles`
//!    - `resource_access[<client_id>].roles`
//!
//! ## Security
//!
//! - Tokens never appear in `Debug` output or logs
//! - Token claims are decoded, not verified; the backend verifies every call
//! - Login callbacks must echo the `state` of the pending request

pub mod claims;
pub mod client;
pub mod error;
pub mod keycloak;
pub mod pkce;
pub mod provider;
pub mod roles;

pub use claims::{AccessToken, Identity, TokenResponse, TokenSet};
pub use client::{IdentityClient, TokenRefresh};
pub use error::IdentityError;
pub use keycloak::KeycloakProvider;
pub use provider::{AuthorizationRequest, FlowKind, IdentityProvider, LoginCallback};
pub use roles::{Role, RoleSet};
