//! Drives an LmsSession on a fixed tick and publishes what the display needs

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::adapters::lms::LmsSession;
use crate::adapters::traits::{AdapterContext, AdapterLogic, LineTransport};
use crate::bus::{BusEvent, PlaybackState};
use crate::config::CoverArtConfig;
use crate::error::LmsError;

/// Default control-loop period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Artwork location for a player, as served by the LMS web server
pub fn cover_art_url(host: &str, http_port: u16, cover: &CoverArtConfig, player_id: &str) -> String {
    // Ids arrive percent-encoded; normalise so the query string is encoded once
    let decoded = urlencoding::decode(player_id)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| player_id.to_string());
    format!(
        "http://{}:{}/music/current/cover_{}x{}.{}?player={}",
        host,
        http_port,
        cover.size,
        cover.size,
        cover.format,
        urlencoding::encode(&decoded)
    )
}

pub struct CoverArtFollower<T: LineTransport> {
    session: Mutex<LmsSession<T>>,
    tick_interval: Duration,
    http_port: u16,
    cover: CoverArtConfig,
}

impl<T: LineTransport> CoverArtFollower<T> {
    pub fn new(
        session: LmsSession<T>,
        tick_interval: Duration,
        http_port: u16,
        cover: CoverArtConfig,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            tick_interval,
            http_port,
            cover,
        }
    }

    /// Tick until shutdown or connection loss.
    async fn follow(&self, session: &mut LmsSession<T>, ctx: &AdapterContext) -> Result<()> {
        let bus = &ctx.bus;
        let mut ticker = interval(self.tick_interval);
        // A refresh can take seconds; don't fire a burst of ticks afterwards
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_state: Option<PlaybackState> = None;

        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => {
                    info!("lms: follower shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let outcome = session.tick().await;

                    if last_state != Some(outcome.state) {
                        debug!("lms: state {:?} -> {}", last_state, outcome.state);
                        last_state = Some(outcome.state);
                        bus.publish(BusEvent::PlaybackStateChanged { state: outcome.state });
                    }

                    if let Some(player_id) = outcome.cover_art_id {
                        let url = cover_art_url(session.host(), self.http_port, &self.cover, &player_id);
                        info!("lms: cover art for {}: {}", player_id, url);
                        bus.publish(BusEvent::CoverArtChanged { player_id, url });
                    }

                    if outcome.state == PlaybackState::Fail {
                        return Err(LmsError::ConnectionLost.into());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<T: LineTransport + 'static> AdapterLogic for CoverArtFollower<T> {
    fn prefix(&self) -> &'static str {
        "lms"
    }

    async fn run(&self, ctx: AdapterContext) -> Result<()> {
        let mut session = self.session.lock().await;
        session.connect().await?;

        let host = session.host().to_string();
        ctx.bus.publish(BusEvent::LmsConnected { host: host.clone() });

        let result = self.follow(&mut session, &ctx).await;

        ctx.bus.publish(BusEvent::LmsDisconnected { host });
        result
    }
}
