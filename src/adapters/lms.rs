//! LMS (Logitech Media Server) CLI session
//!
//! Tracks the players of one LMS over the telnet CLI (port 9090) and decides,
//! once per tick, which of them drives the cover-art display.
//!
//! ## How state is kept current
//!
//! 1. **Full refresh**: `players <n> 1` for every index, then
//!    `<id> status - 1 subscribe:<flags>` for every player found. Runs on the
//!    first tick and then every 60 s (no players known) or 300 s (players known).
//! 2. **Push lines**: once subscribed, LMS sends a fresh status line whenever a
//!    player changes. Each tick drains whatever is already buffered and applies
//!    it to the player table without blocking.
//!
//! ```text
//! players 0 1          → players 0 1 count%3A2 ... playerid%3A00%3A04%3A20%3A... isplaying%3A1 power%3A1
//! <id> status - 1 subscribe:CJK
//!                      → <id> status - 1 subscribe%3ACJK player_name%3AKitchen ... mode%3Aplay title%3A...
//! ```
//!
//! ## Selection
//!
//! The selected player is sticky: it stays selected while it keeps playing,
//! even if other players start. When it stops (or disappears) the first
//! playing player in table order takes over.
//!
//! Only the refresh blocks, for at most one query timeout per request.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::adapters::lms_params::ResponseLine;
use crate::adapters::lms_players::{Player, PlayerTable, DEFAULT_MAX_PLAYERS};
use crate::adapters::lms_query::{query, Expect, DEFAULT_QUERY_TIMEOUT};
use crate::adapters::traits::LineTransport;
use crate::bus::PlaybackState;
use crate::error::LmsError;

/// Marker that identifies a status line (reply or push)
const STATUS_TOKEN: &str = " status ";

/// Default subscribe flags. Opaque to us, forwarded as configured.
pub const DEFAULT_SUBSCRIBE_FLAGS: &str = "CJK";

/// Timing and sizing knobs for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long one query waits for its reply
    pub query_timeout: Duration,
    /// Refresh period while no players are known
    pub refresh_idle: Duration,
    /// Refresh period while at least one player is known
    pub refresh_active: Duration,
    /// Maximum gap between two player table dumps in the log
    pub status_dump_interval: Duration,
    /// Capacity of the player table
    pub max_players: usize,
    /// Value after `subscribe:` in the status subscription
    pub subscribe_flags: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            refresh_idle: Duration::from_secs(60),
            refresh_active: Duration::from_secs(300),
            status_dump_interval: Duration::from_secs(10),
            max_players: DEFAULT_MAX_PLAYERS,
            subscribe_flags: DEFAULT_SUBSCRIBE_FLAGS.to_string(),
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub state: PlaybackState,
    /// Set when the display should (re)load artwork for this player
    pub cover_art_id: Option<String>,
}

impl TickOutcome {
    fn fail() -> Self {
        Self {
            state: PlaybackState::Fail,
            cover_art_id: None,
        }
    }
}

pub struct LmsSession<T: LineTransport> {
    transport: T,
    host: String,
    port: u16,
    config: SessionConfig,
    players: PlayerTable,
    selected: Option<String>,
    last_refresh: Option<Instant>,
    /// `None` forces a dump on the current tick
    last_dump: Option<Instant>,
}

impl<T: LineTransport> LmsSession<T> {
    pub fn new(transport: T, host: impl Into<String>, port: u16, config: SessionConfig) -> Self {
        let players = PlayerTable::new(config.max_players);
        Self {
            transport,
            host: host.into(),
            port,
            config,
            players,
            selected: None,
            last_refresh: None,
            last_dump: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn players(&self) -> &PlayerTable {
        &self.players
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Connect to the CLI.
    ///
    /// Subscriptions belong to a connection, so a successful (re)connect
    /// schedules a full refresh for the next tick.
    pub async fn connect(&mut self) -> Result<(), LmsError> {
        debug!("lms: connecting to {}:{}", self.host, self.port);
        if let Err(e) = self.transport.connect(&self.host, self.port).await {
            error!("lms: {}", e);
            return Err(e);
        }
        if !self.transport.is_connected() {
            return Err(LmsError::ConnectionLost);
        }
        info!("lms: connected to {}:{}", self.host, self.port);
        self.last_refresh = None;
        Ok(())
    }

    async fn query(&mut self, command: &str, expect: Expect<'_>) -> String {
        query(&mut self.transport, command, expect, self.config.query_timeout).await
    }

    /// Re-enumerate all players and subscribe to their status.
    pub async fn refresh_players(&mut self) {
        info!("lms: Getting players...");
        self.players.clear();

        let capacity = self.players.capacity();
        let mut count = capacity;
        let mut index = 0;
        while index < count {
            let command = format!("players {} 1", index);
            let resp = self.query(&command, Expect::Prefix(&command)).await;
            let line = ResponseLine::new(&resp);

            match line.value("count").parse::<usize>() {
                Ok(reported) if reported < count => count = reported,
                Ok(reported) if reported > capacity && index == 0 => {
                    warn!(
                        "lms: {} (server reports {})",
                        LmsError::RegistryFull { capacity },
                        reported
                    );
                }
                Ok(_) => {}
                Err(_) if !resp.is_empty() => {
                    debug!("lms: reply without usable count: [{}]", resp);
                }
                Err(_) => {}
            }

            let playerid = line.value("playerid");
            let modelname = line.decoded("modelname");
            let isplaying = line.value("isplaying");
            let power = line.value("power");
            debug!(
                "lms: get {}: playerid=[{}] modelname=[{}] isplaying=[{}] power=[{}]",
                self.players.len(),
                playerid,
                modelname,
                isplaying,
                power
            );
            if playerid.is_empty() {
                break;
            }

            // Synced players report isplaying=1 even while powered off
            let playing = isplaying == "1" && power == "1";
            if let Err(e) = self
                .players
                .push(Player::discovered(playerid, modelname, playing))
            {
                warn!("lms: {}", e);
                break;
            }
            index += 1;
        }

        if let Some(id) = &self.selected {
            if !self.players.contains(id) {
                debug!("lms: selected player {} is gone", id);
                self.selected = None;
            }
        }

        if self.players.is_empty() {
            warn!("lms: {}", LmsError::NoPlayersOnline);
        }

        let ids: Vec<String> = self.players.iter().map(|p| p.id.clone()).collect();
        for id in ids {
            let command = format!("{} status - 1 subscribe:{}", id, self.config.subscribe_flags);
            let resp = self.query(&command, Expect::Contains(STATUS_TOKEN)).await;
            self.apply_status(&resp);
        }
    }

    /// Apply a status line (subscription reply or push) to the player table.
    ///
    /// Returns whether the line was a status line for a known player, whether
    /// or not anything changed.
    pub fn apply_status(&mut self, line: &str) -> bool {
        if !line.contains(STATUS_TOKEN) {
            return false;
        }
        let Some(player) = self.players.find_line_owner_mut(line) else {
            debug!("lms: status for unknown player: [{}]", line);
            return false;
        };

        let resp = ResponseLine::new(line);
        let power = resp.value("power");
        let mode = resp.value("mode");
        let name = resp.decoded("player_name");
        let title = resp.decoded("title");
        debug!(
            "lms: update {}: power={} mode={} name={} title={}",
            player.id, power, mode, name, title
        );
        if mode.is_empty() {
            let err = LmsError::MalformedResponse {
                reason: "status without mode",
                line: line.to_string(),
            };
            warn!("lms: {}", err);
            return false;
        }

        let playing = mode == "play" && power == "1";
        player.apply_status(name, playing, title);
        true
    }

    /// Apply every line the transport has already buffered.
    async fn drain_push_lines(&mut self) -> bool {
        let mut any_status = false;
        while self.transport.available() {
            let Some(line) = self.transport.read_line().await else {
                break;
            };
            if self.apply_status(line.trim()) {
                any_status = true;
            }
        }
        any_status
    }

    fn refresh_due(&self, now: Instant) -> bool {
        let period = if self.players.is_empty() {
            self.config.refresh_idle
        } else {
            self.config.refresh_active
        };
        self.last_refresh
            .map_or(true, |last| now.duration_since(last) > period)
    }

    fn dump_due(&self, now: Instant) -> bool {
        self.last_dump.map_or(true, |last| {
            now.duration_since(last) > self.config.status_dump_interval
        })
    }

    /// Pick the player that drives the display.
    fn select(&mut self) -> TickOutcome {
        if let Some(current) = self.selected.as_deref().and_then(|id| self.players.get(id)) {
            if current.playing() {
                let cover_art_id = current.updated().then(|| current.id.clone());
                if cover_art_id.is_some() {
                    self.last_dump = None;
                }
                return TickOutcome {
                    state: PlaybackState::Playing,
                    cover_art_id,
                };
            }
        }

        if let Some(next) = self.players.first_playing() {
            let id = next.id.clone();
            debug!("lms: now following {}", id);
            self.selected = Some(id.clone());
            self.last_dump = None;
            return TickOutcome {
                state: PlaybackState::Playing,
                cover_art_id: Some(id),
            };
        }

        self.selected = None;
        TickOutcome {
            state: PlaybackState::Stopped,
            cover_art_id: None,
        }
    }

    /// One control-loop iteration.
    pub async fn tick(&mut self) -> TickOutcome {
        let now = Instant::now();

        if !self.transport.is_connected() {
            error!("lms: {}", LmsError::ConnectionLost);
            return TickOutcome::fail();
        }

        if self.refresh_due(now) {
            self.refresh_players().await;
            self.last_refresh = Some(now);
            self.last_dump = None;
        }

        let any_status = self.drain_push_lines().await;
        let outcome = self.select();

        if any_status || self.dump_due(now) {
            self.players.dump(self.selected.as_deref());
            self.last_dump = Some(now);
        }

        self.players.clear_updated();
        outcome
    }
}
