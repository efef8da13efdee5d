//! JSONL session store with an in-memory cache.
//!
//! File format: `~/.reagent/sessions/{safe_key}.jsonl`
//! - Line 1: `{"_type":"metadata","created_at":"...","updated_at":"...","metadata":{}}`
//! - Line 2+: `{"role":"user","content":"hello"}`
//!
//! Lines that fail to parse are skipped on load, so a hand-edited or
//! truncated file still yields whatever history is readable.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{Message, Session};
use crate::utils;

const METADATA_RECORD: &str = "metadata";

/// First line of each session file.
#[derive(Debug, Serialize, Deserialize)]
struct SessionHeader {
    #[serde(rename = "_type")]
    record_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl SessionHeader {
    fn of(session: &Session) -> Self {
        SessionHeader {
            record_type: METADATA_RECORD.to_string(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            metadata: session.metadata.clone(),
        }
    }
}

// ─────────────────────────────────────────────
// SessionStore
// ─────────────────────────────────────────────

/// Conversation logs keyed by session id, cached in memory and persisted as JSONL.
///
/// Safe to share between request handlers; the lock is never held across I/O
/// that could block on another session.
pub struct SessionStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Open a store rooted at `dir` (default `~/.reagent/sessions/`), creating it if needed.
    pub fn open(dir: Option<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.unwrap_or_else(utils::get_sessions_path);
        std::fs::create_dir_all(&dir)?;
        Ok(SessionStore {
            dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // A poisoned lock only means another thread panicked mid-insert; the map is still usable.
    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached session, else the one on disk, else a fresh empty session.
    pub fn load(&self, key: &str) -> Session {
        if let Some(session) = self.read_cache().get(key) {
            return session.clone();
        }

        let session = self.read_file(key).unwrap_or_else(|| Session::new(key));
        self.write_cache()
            .entry(key.to_string())
            .or_insert(session)
            .clone()
    }

    /// The last `limit` messages of a session, oldest first.
    pub fn history(&self, key: &str, limit: usize) -> Vec<Message> {
        let messages = self.load(key).messages;
        let skip = messages.len().saturating_sub(limit);
        messages.into_iter().skip(skip).collect()
    }

    /// Append messages to a session and persist it.
    pub fn append(&self, key: &str, messages: impl IntoIterator<Item = Message>) {
        let mut session = self.load(key);
        session.messages.extend(messages);
        session.updated_at = Utc::now();
        self.store(session);
    }

    /// Drop all messages but keep the session file.
    pub fn clear(&self, key: &str) {
        let mut session = self.load(key);
        session.messages.clear();
        session.updated_at = Utc::now();
        self.store(session);
    }

    /// Remove a session from cache and disk. Returns `true` if a file was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.write_cache().remove(key);

        let path = self.path_for(key);
        if !path.exists() {
            return false;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted session file {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to delete session file {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Sessions on disk, most recently updated first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read sessions directory: {}", e);
                return Vec::new();
            }
        };

        let mut summaries: Vec<SessionSummary> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|path| {
                let header = read_header(&path)?;
                let key = path.file_stem()?.to_str()?.replacen('_', ":", 1);
                Some(SessionSummary {
                    key,
                    message_count: count_lines(&path).saturating_sub(1),
                    updated_at: header.updated_at,
                    path,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    fn store(&self, session: Session) {
        if let Err(e) = self.write_file(&session) {
            warn!("Failed to persist session {}: {}", session.key, e);
        }
        self.write_cache().insert(session.key.clone(), session);
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe_key = utils::safe_filename(&key.replace(':', "_"));
        self.dir.join(format!("{safe_key}.jsonl"))
    }

    fn read_file(&self, key: &str) -> Option<Session> {
        let path = self.path_for(key);
        let file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to open session file {}: {}", path.display(), e);
                return None;
            }
        };

        let mut session = Session::new(key);
        for line in std::io::BufReader::new(file).lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(header) = serde_json::from_str::<SessionHeader>(&line) {
                if header.record_type == METADATA_RECORD {
                    session.created_at = header.created_at;
                    session.updated_at = header.updated_at;
                    session.metadata = header.metadata;
                    continue;
                }
            }
            match serde_json::from_str::<Message>(&line) {
                Ok(msg) => session.messages.push(msg),
                Err(e) => debug!("Skipping unreadable line in {}: {}", path.display(), e),
            }
        }

        debug!(
            "Loaded session '{}' with {} messages",
            key,
            session.messages.len()
        );
        Some(session)
    }

    fn write_file(&self, session: &Session) -> std::io::Result<()> {
        let path = self.path_for(&session.key);
        let mut out = std::io::BufWriter::new(std::fs::File::create(&path)?);

        writeln!(out, "{}", serde_json::to_string(&SessionHeader::of(session))?)?;
        for msg in &session.messages {
            writeln!(out, "{}", serde_json::to_string(msg)?)?;
        }
        out.flush()?;

        debug!(
            "Saved session '{}' ({} messages) to {}",
            session.key,
            session.messages.len(),
            path.display()
        );
        Ok(())
    }
}

fn read_header(path: &Path) -> Option<SessionHeader> {
    let file = std::fs::File::open(path).ok()?;
    let line = std::io::BufReader::new(file).lines().next()?.ok()?;
    serde_json::from_str(&line).ok()
}

fn count_lines(path: &Path) -> usize {
    std::fs::File::open(path)
        .map(|f| std::io::BufReader::new(f).lines().count())
        .unwrap_or(0)
}

/// One row of `reagent sessions`-style listings.
#[derive(Clone, Debug)]
pub struct SessionSummary {
    /// Session key (e.g. `"cli:default"`).
    pub key: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
    pub path: PathBuf,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
