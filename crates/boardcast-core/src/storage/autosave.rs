//! Auto-save for the ordered stroke list.
//!
//! Pushes the board to durable storage on a ten second cadence while edits
//! are outstanding, leaving the backend choice to the embedder via the
//! [`Storage`] trait.

use super::{Storage, StorageResult};
use crate::board::BoardDocument;
use std::sync::Arc;

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};
#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 10;

/// Manages periodic board persistence.
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    /// Whether the board has unsaved changes.
    dirty: bool,
    current_board_id: Option<String>,
}

impl<S: Storage> AutoSaveManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            dirty: false,
            current_board_id: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the board as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_board_id(&mut self, id: Option<String>) {
        self.current_board_id = id;
    }

    pub fn board_id(&self) -> Option<&str> {
        self.current_board_id.as_deref()
    }

    /// Check if enough time has passed for an auto-save.
    pub fn should_save(&self) -> bool {
        if !self.dirty {
            return false;
        }

        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save the board if needed (dirty + interval elapsed).
    /// Returns true if a save was performed.
    pub async fn maybe_save(&mut self, board: &BoardDocument) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }

        self.save(board).await?;
        Ok(true)
    }

    /// Force save the board immediately.
    pub async fn save(&mut self, board: &BoardDocument) -> StorageResult<()> {
        let board_id = self
            .current_board_id
            .clone()
            .unwrap_or_else(|| board.id.clone());

        self.storage.save(&board_id, board).await?;

        self.last_save = Some(Instant::now());
        self.dirty = false;

        Ok(())
    }

    /// Load a board by ID.
    pub async fn load(&mut self, id: &str) -> StorageResult<BoardDocument> {
        let board = self.storage.load(id).await?;
        self.current_board_id = Some(id.to_string());
        self.dirty = false;
        self.last_save = Some(Instant::now());
        Ok(board)
    }

    /// Delete a board by ID.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// List all saved board IDs.
    pub async fn list_boards(&self) -> StorageResult<Vec<String>> {
        self.storage.list().await
    }

    pub async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.storage.exists(id).await
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}
