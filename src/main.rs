// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 HealthHub

use std::net::SocketAddr;

use healthhub_auth::{
    api::router,
    auth::{TokenCodec, TokenError},
    config::{LogFormat, Settings, DEFAULT_LOG_FILTER},
    credentials::{CredentialError, CredentialVerifier},
    registry::RegistryError,
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuthStore, StoreError},
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("database: {0}")]
    Store(#[from] StoreError),

    #[error("seeding default roles: {0}")]
    Seed(#[from] RegistryError),

    #[error("credential hashing: {0}")]
    Credential(#[from] CredentialError),

    #[error("token codec: {0}")]
    Token(#[from] TokenError),

    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

async fn run(settings: Settings) -> Result<(), StartupError> {
    let codec = TokenCodec::new(
        &settings.jwt_secret,
        settings.jwt_issuer.clone(),
        settings.token_ttl,
    )?;
    let verifier = CredentialVerifier::with_cost(
        settings.argon2.memory_kib,
        settings.argon2.iterations,
        settings.argon2.parallelism,
    )?;

    let store = AuthStore::open(&settings.database_path())?;

    let state = AppState::new(store, codec, verifier);

    if settings.seed_default_roles {
        let report = state.registry.seed_defaults()?;
        if !report.is_empty() {
            state.audit().record(
                AuditEvent::new(AuditEventType::DefaultsSeeded)
                    .with_actor("system")
                    .with_details(serde_json::json!(report)),
            );
        }
    }

    let addr: SocketAddr = settings
        .bind_address()
        .parse()
        .map_err(|_| StartupError::BindAddress(settings.bind_address()))?;

    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HealthHub auth server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(LogFormat::default());
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    init_tracing(settings.log_format);
    tracing::debug!(?settings, "Loaded settings");

    if let Err(e) = run(settings).await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}
