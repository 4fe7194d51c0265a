/*
 * Responsibility
 * - Config読み込み → 依存生成 (key store, Authenticator, user store) → Router 組み立て
 * - App-level middleware の適用 (Logger → Errors → Metrics → Panics)
 * - axum::serve() で起動、SIGINT/SIGTERM/shutdown signal で graceful shutdown
 */
use std::{net::SocketAddr, panic, sync::Arc, time::Duration};

use anyhow::{Result, bail};
use axum::Router;
use tokio::{net::TcpListener, sync::mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    middleware::{self, Metrics, errors, logger, metrics, panics},
    repos::{MemoryUserStore, PgUserStore, UserStore},
    services::{
        auth::{Authenticator, FsKeyStore},
        users::UserService,
    },
    state::AppState,
    web::{App, Shutdown},
};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,sales_api=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook() {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    // Panics inside a request are recovered by the panics middleware; the
    // process keeps serving.
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook();

    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        debug_addr = %config.debug_addr,
        "startup"
    );

    let state = build_state(&config).await?;
    let (shutdown, shutdown_rx) = Shutdown::channel();

    let api = build_router(state.clone(), shutdown, config.request_timeout);
    let debug = api::debug::routes(state);

    let debug_listener = TcpListener::bind(config.debug_addr).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(debug_listener, debug).await {
            tracing::error!(error = %err, "debug listener closed");
        }
    });

    let listener = TcpListener::bind(config.addr).await?;
    let (draining_tx, draining_rx) = tokio::sync::oneshot::channel::<()>();

    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            api.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let reason = shutdown_signal(shutdown_rx).await;
            tracing::info!(%reason, "shutdown started");
            let _ = draining_tx.send(());
        })
        .await
    });

    tokio::select! {
        res = &mut server => {
            res??;
            return Ok(());
        }
        _ = draining_rx => {}
    }

    match tokio::time::timeout(config.shutdown_timeout, server).await {
        Ok(res) => {
            res??;
            tracing::info!("shutdown complete");
            Ok(())
        }
        Err(_) => {
            tracing::error!(timeout = ?config.shutdown_timeout, "in-flight requests did not drain");
            bail!("could not stop server gracefully")
        }
    }
}

async fn build_state(config: &Config) -> Result<AppState> {
    // Keys are read from AUTH_KEYS_FOLDER on demand; the active kid must
    // resolve to a private key right away.
    let keys = FsKeyStore::new(&config.auth_keys_folder)?;
    let auth = Authenticator::new(config.auth_active_kid.clone(), Arc::new(keys))?
        .with_leeway(config.auth_leeway_seconds);
    tracing::info!(kid = %auth.active_kid(), "signing key loaded");

    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => Arc::new(PgUserStore::connect(url, config.db_max_connections).await?),
        None => {
            if config.app_env.is_production() {
                bail!("DATABASE_URL is required in production");
            }
            tracing::warn!("DATABASE_URL not set; using the in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    let users = UserService::new(
        store,
        config.auth_issuer.clone(),
        chrono::Duration::seconds(i64::try_from(config.auth_token_ttl_seconds)?),
    );

    Ok(AppState::new(
        Arc::new(auth),
        Arc::new(users),
        Arc::new(Metrics::default()),
    ))
}

/// The API router: every v1 route behind the app-wide middleware chain,
/// plus the router-wide tower layers.
pub fn build_router(state: AppState, shutdown: Shutdown, request_timeout: Duration) -> Router {
    let app = App::new(
        shutdown,
        vec![
            logger(),
            errors(),
            metrics(state.metrics.clone()),
            panics(state.metrics.clone()),
        ],
    );

    let router = api::v1::routes(app, &state).into_router();
    middleware::http::apply(router, request_timeout)
}

async fn shutdown_signal(mut rx: mpsc::Receiver<String>) -> String {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT".to_string(),
        _ = terminate => "SIGTERM".to_string(),
        Some(reason) = rx.recv() => reason,
    }
}
