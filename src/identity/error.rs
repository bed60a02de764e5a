// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider errors.

/// Errors raised while talking to the identity provider or managing its tokens.
///
/// The type is `Clone` because one in-flight initialization or refresh is
/// shared by every caller that joined it, and each of them receives the
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Provider configuration is missing or unusable
    #[error("Identity provider configuration invalid: {0}")]
    Config(String),

    /// Network round trip to the provider failed
    #[error("Identity provider request failed: {0}")]
    Request(String),

    /// Provider answered with an OAuth error
    #[error("Identity provider rejected the request: {error}")]
    Rejected {
        /// OAuth error code (e.g. `invalid_grant`)
        error: String,
        /// Optional human-readable description
        description: Option<String>,
    },

    /// Provider response could not be understood
    #[error("Identity provider response was invalid: {0}")]
    InvalidResponse(String),

    /// Token is malformed
    #[error("Token is malformed: {0}")]
    MalformedToken(String),

    /// There is no token to work with
    #[error("No authenticated session")]
    NotAuthenticated,

    /// Session was torn down while the operation was in flight
    #[error("Session ended before the operation completed")]
    SessionEnded,

    /// Login callback does not belong to the pending login
    #[error("Login callback does not match the pending login request")]
    StateMismatch,
}

impl IdentityError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            IdentityError::Config(_) => "config_error",
            IdentityError::Request(_) => "request_failed",
            IdentityError::Rejected { .. } => "rejected",
            IdentityError::InvalidResponse(_) => "invalid_response",
            IdentityError::MalformedToken(_) => "malformed_token",
            IdentityError::NotAuthenticated => "not_authenticated",
            IdentityError::SessionEnded => "session_ended",
            IdentityError::StateMismatch => "state_mismatch",
        }
    }

    /// True when the provider refused a grant because the session behind it is gone.
    pub fn is_invalid_grant(&self) -> bool {
        matches!(self, IdentityError::Rejected { error, .. } if error == "invalid_grant")
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(e: reqwest::Error) -> Self {
        IdentityError::Request(e.to_string())
    }
}
