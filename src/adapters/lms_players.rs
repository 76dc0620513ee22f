//! Bounded, insertion-ordered table of known LMS players

use tracing::info;

use crate::error::LmsError;

/// Default number of players tracked; enumeration stops here.
pub const DEFAULT_MAX_PLAYERS: usize = 10;

/// Titles longer than this are shortened in the status dump
const DUMP_TITLE_CHARS: usize = 20;

/// One LMS player as last seen on the CLI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Player {
    /// Player id exactly as sent by the server (percent-encoded MAC)
    pub id: String,
    pub model: String,
    pub name: String,
    playing: bool,
    /// Only non-empty while `playing`
    title: String,
    /// Set when the title changed while playing; cleared every tick
    updated: bool,
}

impl Player {
    /// A player as reported by `players <index> 1`
    pub fn discovered(id: String, model: String, playing: bool) -> Self {
        Self {
            id,
            model,
            playing,
            ..Default::default()
        }
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn updated(&self) -> bool {
        self.updated
    }

    /// Apply the fields of a status line.
    ///
    /// `updated` is raised only if the player is playing and the title differs
    /// from what we had. The title is dropped whenever the player is not playing.
    pub fn apply_status(&mut self, name: String, playing: bool, title: String) {
        self.name = name;
        self.updated = playing && self.title != title;
        self.title = if playing { title } else { String::new() };
        self.playing = playing;
    }

    fn clear_updated(&mut self) {
        self.updated = false;
    }
}

#[derive(Debug, Clone)]
pub struct PlayerTable {
    players: Vec<Player>,
    capacity: usize,
}

impl PlayerTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            players: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    /// Append a player. Never grows past capacity.
    pub fn push(&mut self, player: Player) -> Result<(), LmsError> {
        if self.players.len() >= self.capacity {
            return Err(LmsError::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.players.push(player);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// First player (in table order) whose id is a prefix of `line`
    pub fn find_line_owner_mut(&mut self, line: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| line.starts_with(&p.id))
    }

    pub fn first_playing(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.playing)
    }

    pub fn clear_updated(&mut self) {
        self.players.iter_mut().for_each(Player::clear_updated);
    }

    /// Log every player, marking `selected` with `*`
    pub fn dump(&self, selected: Option<&str>) {
        let total = self.players.len();
        for (ix, p) in self.players.iter().enumerate() {
            let marker = if selected == Some(p.id.as_str()) { '*' } else { ' ' };
            info!(
                "lms: {}Player {}/{}: id=[{}] model=[{}] name=[{}] playing={} title=[{}] updated={}",
                marker,
                ix + 1,
                total,
                p.id,
                p.model,
                p.name,
                yes_no(p.playing),
                shorten(&p.title, DUMP_TITLE_CHARS),
                yes_no(p.updated),
            );
        }
    }
}

impl Default for PlayerTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLAYERS)
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

/// First `max` chars of `s`, with "..." appended if anything was cut
pub(crate) fn shorten(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
