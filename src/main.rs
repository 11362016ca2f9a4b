// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr};

use relational_jwt_guard::{
    api::router,
    config::{
        load_principals, AuthSettings, PrincipalDirectory, DEFAULT_HOST, DEFAULT_PORT, HOST_ENV,
        LOG_FORMAT_ENV, PORT_ENV, PRINCIPALS_FILE_ENV,
    },
    state::AppState,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let settings = AuthSettings::from_env().expect("Failed to load authentication settings");
    let principals = match env::var(PRINCIPALS_FILE_ENV) {
        Ok(path) if !path.is_empty() => {
            load_principals(&path).expect("Failed to load principals file")
        }
        _ => {
            warn!("{PRINCIPALS_FILE_ENV} not set, guards have no principals");
            PrincipalDirectory::new()
        }
    };

    let state = AppState::new(settings, &principals);
    if let Err(e) = state.manager.check_keys() {
        // Audience overrides may still carry usable keys.
        warn!(error = %e, "Base key material is unavailable");
    }
    let app = router(state);

    // Parse bind address
    let host = env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port: u16 = env::var(PORT_ENV)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    info!(%addr, "Relational JWT Guard listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
