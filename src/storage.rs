//! Durable client-side state: reconnection records, the matchmaking
//! "still searching" flag, and the chosen theme.
//!
//! Everything is a plain JSON blob under a string key, no schema
//! versioning. Writes are last-writer-wins with no locking; only one
//! process is expected to own a given game id at a time.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::paddle::Side;

pub const SEARCHING_KEY: &str = "matchmaking-searching";
pub const PENDING_MATCH_KEY: &str = "pending-match";
pub const THEME_KEY: &str = "theme";

pub fn reconnection_key(game_id: &str) -> String {
    format!("reconnect-{game_id}")
}

/// Per-game resume state. Written on match start and after every successful
/// reconnect; stale records are overwritten by the next match with the same
/// id, never garbage-collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectionRecord {
    pub player_side: Side,
    pub player1: String,
    pub player2: String,
    pub player1_id: String,
    pub player2_id: String,
    pub last_reconnection_ms: u64,
}

/// Metadata of a matched game, persisted by the matchmaking session for the
/// handoff into the game channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMatch {
    pub game_id: String,
    pub side: Side,
    pub opponent: String,
    pub opponent_id: String,
}

/// Abstraction over blob storage so the sessions stay testable without a
/// filesystem.
pub trait SessionStore: Send + Sync {
    fn save(&self, key: &str, value: &str);
    fn load(&self, key: &str) -> Option<String>;
    fn clear(&self, key: &str);
}

pub fn save_json<T: Serialize>(store: &dyn SessionStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => store.save(key, &json),
        Err(err) => warn!(key, %err, "failed to serialize persisted state"),
    }
}

pub fn load_json<T: DeserializeOwned>(store: &dyn SessionStore, key: &str) -> Option<T> {
    let raw = store.load(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, %err, "ignoring unreadable persisted state");
            None
        }
    }
}

/// One JSON file per key under a data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStore for FileStore {
    fn save(&self, key: &str, value: &str) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), %err, "cannot create data directory");
            return;
        }
        if let Err(err) = fs::write(self.path_for(key), value) {
            warn!(key, %err, "failed to persist state");
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn clear(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl SessionStore for MemoryStore {
    fn save(&self, key: &str, value: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key.to_owned(), value.to_owned());
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    fn clear(&self, key: &str) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(key);
        }
    }
}
