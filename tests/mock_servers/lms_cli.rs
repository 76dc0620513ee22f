//! Mock LMS CLI (telnet port 9090)
//!
//! Answers `players <n> 1` and `<id> status - 1 subscribe:<flags>`, records
//! every command, and can push status lines or hang up on demand.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Mock player state
#[derive(Debug, Clone)]
pub struct MockPlayer {
    pub playerid: String,
    pub name: String,
    pub model: String,
    pub power: bool,
    pub mode: String, // "play", "pause", "stop"
    pub title: String,
}

impl MockPlayer {
    pub fn new(playerid: &str, name: &str) -> Self {
        Self {
            playerid: playerid.to_string(),
            name: name.to_string(),
            model: "SqueezeLite".to_string(),
            power: true,
            mode: "stop".to_string(),
            title: String::new(),
        }
    }

    /// Player ids (MAC addresses) travel percent-encoded
    pub fn wire_id(&self) -> String {
        urlencoding::encode(&self.playerid).into_owned()
    }

    fn players_line(&self, index: usize, count: usize) -> String {
        format!(
            "players {} 1 count%3A{} playerindex%3A{} playerid%3A{} modelname%3A{} isplaying%3A{} power%3A{}",
            index,
            count,
            index,
            self.wire_id(),
            urlencoding::encode(&self.model),
            u8::from(self.mode == "play"),
            u8::from(self.power),
        )
    }

    fn status_line(&self, flags: &str) -> String {
        format!(
            "{} status - 1 subscribe%3A{} player_name%3A{} player_connected%3A1 power%3A{} mode%3A{} title%3A{}",
            self.wire_id(),
            flags,
            urlencoding::encode(&self.name),
            u8::from(self.power),
            self.mode,
            urlencoding::encode(&self.title),
        )
    }
}

#[derive(Debug, Clone)]
enum Push {
    Line(String),
    HangUp,
}

#[derive(Default)]
struct MockCliState {
    players: Vec<MockPlayer>,
    received: Vec<String>,
    connections: usize,
}

impl MockCliState {
    fn reply(&self, command: &str) -> Option<String> {
        if let Some(rest) = command.strip_prefix("players ") {
            let index: usize = rest.split(' ').next()?.parse().ok()?;
            let count = self.players.len();
            return Some(match self.players.get(index) {
                Some(p) => p.players_line(index, count),
                None => format!("players {} 1 count%3A{}", index, count),
            });
        }
        if let Some((id, flags)) = command.split_once(" status - 1 subscribe:") {
            return self
                .players
                .iter()
                .find(|p| p.wire_id() == id)
                .map(|p| p.status_line(flags));
        }
        None
    }
}

/// Mock LMS CLI server
pub struct MockLmsCli {
    addr: SocketAddr,
    state: Arc<RwLock<MockCliState>>,
    push: broadcast::Sender<Push>,
    handle: JoinHandle<()>,
}

impl MockLmsCli {
    /// Start a mock CLI on a random port
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockCliState::default()));
        let (push, _) = broadcast::channel(64);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_state = state.clone();
        let accept_push = push.clone();
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_state.write().await.connections += 1;
                tokio::spawn(serve(socket, accept_state.clone(), accept_push.subscribe()));
            }
        });

        Self {
            addr,
            state,
            push,
            handle,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn add_player(&self, player: MockPlayer) {
        self.state.write().await.players.push(player);
    }

    /// Change a player and push its new status to every client
    pub async fn update_player(&self, playerid: &str, f: impl FnOnce(&mut MockPlayer)) {
        let line = {
            let mut state = self.state.write().await;
            let Some(player) = state.players.iter_mut().find(|p| p.playerid == playerid) else {
                return;
            };
            f(player);
            player.status_line("CJK")
        };
        let _ = self.push.send(Push::Line(line));
    }

    pub fn push_raw(&self, line: &str) {
        let _ = self.push.send(Push::Line(line.to_string()));
    }

    /// Close every open client connection
    pub fn hang_up(&self) {
        let _ = self.push.send(Push::HangUp);
    }

    pub async fn received(&self) -> Vec<String> {
        self.state.read().await.received.clone()
    }

    pub async fn connections(&self) -> usize {
        self.state.read().await.connections
    }

    pub async fn stop(self) {
        self.hang_up();
        self.handle.abort();
    }
}

async fn serve(
    socket: TcpStream,
    state: Arc<RwLock<MockCliState>>,
    mut push: broadcast::Receiver<Push>,
) {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(command)) = line else { break };
                let reply = {
                    let mut state = state.write().await;
                    state.received.push(command.clone());
                    state.reply(&command)
                };
                if let Some(reply) = reply {
                    if writer.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                        break;
                    }
                }
            }
            pushed = push.recv() => match pushed {
                Ok(Push::Line(line)) => {
                    if writer.write_all(format!("{}\n", line).as_bytes()).await.is_err() {
                        break;
                    }
                }
                Ok(Push::HangUp) | Err(_) => break,
            },
        }
    }
}
