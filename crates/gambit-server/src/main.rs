//! Gambit - a real-time chess server.
//!
//! Run with: `cargo run --package gambit-server`

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gambit_server::{app, spawn_clock_sweep, AppState, Coordinator, ServerConfig, TokenAuthenticator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gambit_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    config.validate()?;
    info!(
        time_control = %config.time_control,
        "starting with {}ms tick, {}s disconnect grace",
        config.tick_interval.as_millis(),
        config.disconnect_grace.as_secs()
    );

    let (events, mailbox) = mpsc::unbounded_channel();
    let coordinator = Coordinator::new(config.clone());
    tokio::spawn(coordinator.run(mailbox));
    let _sweep = spawn_clock_sweep(events.clone(), config.tick_interval);

    let state = AppState::new(events, Arc::new(TokenAuthenticator));
    let router = app(state);

    info!("listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
