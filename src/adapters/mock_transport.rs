//! In-memory LineTransport backed by a scripted LMS CLI, for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::adapters::traits::LineTransport;
use crate::error::LmsError;

#[derive(Debug, Clone)]
pub(crate) struct FakePlayer {
    pub id: String,
    pub name: String,
    pub model: String,
    pub power: bool,
    pub mode: String,
    pub title: String,
}

impl FakePlayer {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            model: "Squeezebox Radio".to_string(),
            power: true,
            mode: "stop".to_string(),
            title: String::new(),
        }
    }

    pub fn playing(mut self, title: &str) -> Self {
        self.mode = "play".to_string();
        self.title = title.to_string();
        self
    }

    pub fn powered_off(mut self) -> Self {
        self.power = false;
        self
    }

    fn players_line(&self, index: usize, count: usize) -> String {
        format!(
            "players {} 1 count%3A{} playerindex%3A{} playerid%3A{} uuid%3A \
             ip%3A10.0.0.{}%3A3483 modelname%3A{} connected%3A1 isplaying%3A{} power%3A{}",
            index,
            count,
            index,
            self.id,
            index + 10,
            urlencoding::encode(&self.model),
            u8::from(self.mode == "play"),
            u8::from(self.power),
        )
    }

    pub fn status_line(&self, flags: &str) -> String {
        format!(
            "{} status - 1 subscribe%3A{} player_name%3A{} player_connected%3A1 \
             power%3A{} mode%3A{} title%3A{}",
            self.id,
            flags,
            urlencoding::encode(&self.name),
            u8::from(self.power),
            self.mode,
            urlencoding::encode(&self.title),
        )
    }
}

/// Scripted server: answers `players N 1` and `<id> status - 1 subscribe:..`
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeLms {
    pub players: Vec<FakePlayer>,
    /// Overrides the `count` the server reports
    pub reported_count: Option<usize>,
    /// Never answers anything
    pub silent: bool,
}

impl FakeLms {
    pub fn with_players(players: Vec<FakePlayer>) -> Self {
        Self {
            players,
            ..Default::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Default::default()
        }
    }

    fn reply(&self, command: &str) -> Vec<String> {
        if self.silent {
            return Vec::new();
        }
        let count = self.reported_count.unwrap_or(self.players.len());

        if let Some(rest) = command.strip_prefix("players ") {
            let Some(index) = rest.split(' ').next().and_then(|s| s.parse::<usize>().ok())
            else {
                return Vec::new();
            };
            return vec![match self.players.get(index) {
                Some(p) => p.players_line(index, count),
                None => format!("players {} 1 count%3A{}", index, count),
            }];
        }

        if let Some((id, flags)) = command.split_once(" status - 1 subscribe:") {
            return self
                .players
                .iter()
                .find(|p| p.id == id)
                .map(|p| vec![p.status_line(flags)])
                .unwrap_or_default();
        }

        Vec::new()
    }
}

struct Shared {
    server: FakeLms,
    inbox: VecDeque<String>,
    written: Vec<String>,
    connected: bool,
    connects: usize,
}

pub(crate) struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Test-side handle onto a MockTransport that has been moved into a session
#[derive(Clone)]
pub(crate) struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    /// A connected transport talking to `server`
    pub fn new(server: FakeLms) -> (Self, MockHandle) {
        let shared = Arc::new(Mutex::new(Shared {
            server,
            inbox: VecDeque::new(),
            written: Vec::new(),
            connected: true,
            connects: 0,
        }));
        (
            Self {
                shared: shared.clone(),
            },
            MockHandle { shared },
        )
    }

    pub fn push_line(&self, line: &str) {
        self.shared.lock().unwrap().inbox.push_back(line.to_string());
    }
}

impl MockHandle {
    pub fn push_line(&self, line: &str) {
        self.shared.lock().unwrap().inbox.push_back(line.to_string());
    }

    pub fn written(&self) -> Vec<String> {
        self.shared.lock().unwrap().written.clone()
    }

    pub fn clear_written(&self) {
        self.shared.lock().unwrap().written.clear();
    }

    pub fn disconnect(&self) {
        self.shared.lock().unwrap().connected = false;
    }

    pub fn connects(&self) -> usize {
        self.shared.lock().unwrap().connects
    }

    pub fn server<R>(&self, f: impl FnOnce(&mut FakeLms) -> R) -> R {
        f(&mut self.shared.lock().unwrap().server)
    }

    /// Push the current status line of player `id`, as a subscription would
    pub fn push_status(&self, id: &str) {
        let mut shared = self.shared.lock().unwrap();
        if let Some(line) = shared
            .server
            .players
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.status_line("CJK"))
        {
            shared.inbox.push_back(line);
        }
    }
}

#[async_trait]
impl LineTransport for MockTransport {
    async fn connect(&mut self, _host: &str, _port: u16) -> Result<(), LmsError> {
        let mut shared = self.shared.lock().unwrap();
        shared.connected = true;
        shared.connects += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.lock().unwrap().connected
    }

    fn available(&self) -> bool {
        !self.shared.lock().unwrap().inbox.is_empty()
    }

    async fn read_line(&mut self) -> Option<String> {
        let next = {
            let mut shared = self.shared.lock().unwrap();
            match shared.inbox.pop_front() {
                Some(line) => Some(Some(line)),
                None if !shared.connected => Some(None),
                None => None,
            }
        };
        match next {
            Some(result) => result,
            // Nothing buffered: behave like a quiet socket
            None => std::future::pending().await,
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), LmsError> {
        let mut shared = self.shared.lock().unwrap();
        if !shared.connected {
            return Err(LmsError::ConnectionLost);
        }
        shared.written.push(line.to_string());
        let replies = shared.server.reply(line);
        shared.inbox.extend(replies);
        Ok(())
    }
}
