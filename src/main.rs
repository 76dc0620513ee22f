//! Album Art Follower
//!
//! Follows LMS players over the CLI and reports which one drives the display.

use album_art_follower::adapters::cli_transport::TcpLineTransport;
use album_art_follower::adapters::follower::CoverArtFollower;
use album_art_follower::adapters::{AdapterHandle, RetryConfig};
use album_art_follower::bus::{self, BusEvent, SharedBus};
use album_art_follower::{config, LmsSession, SessionConfig};

use anyhow::Result;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "album_art_follower=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Album Art Follower v{} ({})",
        env!("AAF_VERSION"),
        env!("AAF_GIT_SHA")
    );

    let config = config::load_config()?;
    tracing::info!(
        "lms: init ({}:{}), tick every {:?}",
        config.lms.host,
        config.lms.cli_port,
        config.tick_interval()
    );

    let bus = bus::create_bus();
    let shutdown = CancellationToken::new();
    let display = tokio::spawn(log_display_events(bus.clone(), shutdown.clone()));

    let session = LmsSession::new(
        TcpLineTransport::new(),
        config.lms.host.clone(),
        config.lms.cli_port,
        SessionConfig::from(&config.session),
    );
    let follower = CoverArtFollower::new(
        session,
        config.tick_interval(),
        config.lms.http_port,
        config.cover_art.clone(),
    );

    let handle = AdapterHandle::new(follower, bus.clone(), shutdown.clone());
    let runner = tokio::spawn(handle.run_with_retry(RetryConfig::default()));

    shutdown_signal().await;
    bus.publish(BusEvent::ShuttingDown);
    shutdown.cancel();

    runner.await??;
    display.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Stand-in for the display/LED/tone drivers: log what they would act on
async fn log_display_events(bus: SharedBus, shutdown: CancellationToken) {
    let mut rx = bus.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Ok(BusEvent::PlaybackStateChanged { state }) => {
                    tracing::info!("display: state {}", state);
                }
                Ok(BusEvent::CoverArtChanged { player_id, url }) => {
                    tracing::info!("display: show cover of {} from {}", player_id, url);
                }
                Ok(BusEvent::LmsDisconnected { host }) => {
                    tracing::warn!("display: lost LMS at {}", host);
                }
                Ok(BusEvent::ShuttingDown) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => tracing::debug!("display: skipped {} events", n),
            },
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
