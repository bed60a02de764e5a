// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Module
//!
//! The session store is the single source of truth for authentication state.
//! Views subscribe to it, call `login` / `register` / `logout`, and never hold
//! tokens of their own.
//!
//! ## Lifecycle
//!
//! ```text
//! Initializing ─┬─> Unauthenticated ──(login, redirect back)──┐
//!               └─> AuthenticatedLoading <─────────────────────┘
//!                        │ profile + roles settled
//!                        v
//!                   AuthenticatedReady ──(logout / refresh failure)──> LoggingOut ──> Unauthenticated
//! ```

pub mod refresh;
pub mod state;
pub mod store;

pub use refresh::{RefreshHandle, TokenRefreshScheduler};
pub use state::{Session, SessionPhase};
pub use store::SessionStore;
