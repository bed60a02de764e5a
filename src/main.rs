// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-line session runner.
//!
//! Restores or starts a back-office session, prints where the user would land,
//! and keeps the session alive until Ctrl-C.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use backoffice_session::identity::LoginCallback;
use backoffice_session::{telemetry, GateDecision, RouteTable, SessionConfig, SessionStore};
use tracing::{error, info, warn};

const ENTRY_LOCATION: &str = "/home";

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let store = match SessionStore::from_config(&config) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to create identity client");
            return ExitCode::FAILURE;
        }
    };

    if !store.init().await {
        if let Err(e) = interactive_login(&store).await {
            error!(error = %e, "Login failed");
            return ExitCode::FAILURE;
        }
    }

    let session = store.snapshot();
    let user = session
        .profile
        .as_ref()
        .and_then(|p| p.display_name())
        .unwrap_or_default();
    info!(user = %user, roles = ?session.roles, "Session ready");

    let routes = RouteTable::default();
    let location = match store.landing_redirect(ENTRY_LOCATION) {
        Some(navigate) => navigate.to,
        None => ENTRY_LOCATION.to_string(),
    };
    match store.resolve(&routes, &location) {
        GateDecision::Render => info!(view = %location, "Landing view"),
        GateDecision::Redirect(navigate) => info!(view = %navigate.to, "Landing view"),
        GateDecision::Wait => warn!("Session data still loading"),
    }

    info!(api = %config.api_base_url, "Session active, press Ctrl-C to log out");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }
    store.logout().await;
    ExitCode::SUCCESS
}

async fn interactive_login(store: &SessionStore) -> Result<(), Box<dyn std::error::Error>> {
    let url = store.login().await?;
    println!("Open this URL to sign in:\n\n  {url}\n");
    print!("Paste the URL you were redirected to: ");
    io::stdout().flush()?;

    let redirect = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await??;

    let callback = LoginCallback::from_redirect_url(redirect.trim())?;
    store.complete_login(&callback).await?;
    Ok(())
}
