//! Persistent state store
//!
//! Two JSON documents under a fixed namespace: a durable map of
//! [`DisplayState`] records and a session-scoped map of view counters.
//! Any KV backend with string get/set satisfies the contract; corrupt or
//! unreadable documents are logged and treated as empty state so every popup
//! starts eligible rather than the engine failing.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{DayCount, DisplayState};

/// Durable document key: `Record<popupId, DisplayState>`.
pub const DISPLAY_STATES_KEY: &str = "promo.display_states";
/// Session document key: `Record<popupId, u32>`.
pub const SESSION_COUNTS_KEY: &str = "promo.session_counts";

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state document codec: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Minimal KV contract the engine persists through.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// Backends
// =============================================================================

/// In-memory backend for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// State Store
// =============================================================================

/// Owns the in-memory view of both documents and writes through to the
/// backend on every mutation. Write failures are logged and swallowed; the
/// in-memory state stays authoritative for the current page view.
pub struct StateStore {
    backend: Box<dyn StorageBackend>,
    display_states: HashMap<String, DisplayState>,
    session_counts: HashMap<String, u32>,
}

impl StateStore {
    pub fn open(backend: Box<dyn StorageBackend>) -> Self {
        let display_states = load_document(backend.as_ref(), DISPLAY_STATES_KEY);
        let session_counts = load_document(backend.as_ref(), SESSION_COUNTS_KEY);
        Self {
            backend,
            display_states,
            session_counts,
        }
    }

    pub fn in_memory() -> Self {
        Self::open(Box::<MemoryBackend>::default())
    }

    pub fn display_state(&self, popup_id: &str) -> Option<&DisplayState> {
        self.display_states.get(popup_id)
    }

    pub fn session_count(&self, popup_id: &str) -> u32 {
        self.session_counts.get(popup_id).copied().unwrap_or(0)
    }

    /// Record one successful display: bumps the monotonic and per-day
    /// counters, stamps `last_displayed`, and bumps the session counter.
    pub fn record_display(&mut self, popup_id: &str, now: NaiveDateTime) {
        let state = self
            .display_states
            .entry(popup_id.to_string())
            .or_insert_with(|| DisplayState::new(popup_id));

        state.display_count += 1;
        state.last_displayed = Some(now);

        let today = now.date();
        match &mut state.day_count {
            Some(day) if day.date == today => day.count += 1,
            other => *other = Some(DayCount { date: today, count: 1 }),
        }

        *self.session_counts.entry(popup_id.to_string()).or_insert(0) += 1;

        self.persist_display_states();
        self.persist_session_counts();
    }

    /// Permanently mark a popup as dismissed.
    pub fn mark_dismissed(&mut self, popup_id: &str) {
        self.display_states
            .entry(popup_id.to_string())
            .or_insert_with(|| DisplayState::new(popup_id))
            .dismissed = true;
        self.persist_display_states();
    }

    pub fn mark_converted(&mut self, popup_id: &str) {
        self.display_states
            .entry(popup_id.to_string())
            .or_insert_with(|| DisplayState::new(popup_id))
            .converted = true;
        self.persist_display_states();
    }

    /// Wipe both documents. This is the external "clear" that lifts
    /// permanent dismissals.
    pub fn clear(&mut self) {
        self.display_states.clear();
        self.session_counts.clear();
        if let Err(e) = self.backend.remove(DISPLAY_STATES_KEY) {
            log::warn!("failed to clear display states: {e}");
        }
        if let Err(e) = self.backend.remove(SESSION_COUNTS_KEY) {
            log::warn!("failed to clear session counts: {e}");
        }
    }

    /// Start a fresh browsing session: session counters only.
    pub fn reset_session(&mut self) {
        self.session_counts.clear();
        if let Err(e) = self.backend.remove(SESSION_COUNTS_KEY) {
            log::warn!("failed to reset session counts: {e}");
        }
    }

    pub fn display_states(&self) -> &HashMap<String, DisplayState> {
        &self.display_states
    }

    fn persist_display_states(&mut self) {
        persist_document(self.backend.as_mut(), DISPLAY_STATES_KEY, &self.display_states);
    }

    fn persist_session_counts(&mut self) {
        persist_document(self.backend.as_mut(), SESSION_COUNTS_KEY, &self.session_counts);
    }
}

fn load_document<T: DeserializeOwned + Default>(backend: &dyn StorageBackend, key: &str) -> T {
    let raw = match backend.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            log::warn!("failed to read '{key}', starting empty: {e}");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("corrupt document '{key}', starting empty: {e}");
            T::default()
        }
    }
}

fn persist_document<T: Serialize>(backend: &mut dyn StorageBackend, key: &str, value: &T) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            log::warn!("failed to encode '{key}': {e}");
            return;
        }
    };
    if let Err(e) = backend.set(key, &encoded) {
        log::warn!("failed to persist '{key}': {e}");
    }
}
