use crate::{
    config::Env,
    server::{ServerState, cache::PageCache, media::MediaStore},
};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatube_db::client::{DbClient, DbError};

mod config;
mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to the database: {0}")]
    Database(#[from] DbError),
    #[error("Error creating the media root: {0}")]
    MediaRoot(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yatube_api=debug,\
                yatube_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(%err, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                error!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Clears the home page cache whenever the process receives SIGHUP.
#[cfg(unix)]
fn clear_cache_on_hangup(page_cache: PageCache) -> Result<(), std::io::Error> {
    let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())?;

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP");
            page_cache.clear();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn clear_cache_on_hangup(_page_cache: PageCache) -> Result<(), std::io::Error> {
    Ok(())
}

async fn build_state(env: &Env) -> Result<ServerState, InitError> {
    let db_client = DbClient::connect(&env.database_url).await?;

    tokio::fs::create_dir_all(&env.media_root)
        .await
        .map_err(InitError::MediaRoot)?;

    Ok(ServerState {
        db_client: Arc::new(db_client),
        page_cache: PageCache::new(env.page_cache_ttl()),
        media: Arc::new(MediaStore::new(&env.media_root, &env.media_url)),
        session_lifetime: env.session_lifetime(),
    })
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = config::get_env()?;

    let state = build_state(&env).await?;
    if let Err(err) = clear_cache_on_hangup(state.page_cache.clone()) {
        error!(%err, "Could not listen for SIGHUP");
    }
    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    info!("Server stopped");
    Ok(())
}
