//! Supervisor state machine for a multi-file upload
//!
//! `UploadSession` owns the ordered list of items, aggregates their byte
//! progress and derives the overall [`SessionState`] from a scan of all item
//! states. It is synchronous and runtime-agnostic: the supervisor task feeds
//! it one event at a time, and items are reached through the [`ItemRef`]
//! trait so the machine can be driven directly in tests.
//!
//! Transitions:
//!
//! ```text
//! idle      --UPLOAD (idle item exists)-->  uploading
//! error     --UPLOAD (idle item exists)-->  uploading
//! uploading --UPLOAD_DONE (all uploaded)--> uploaded
//! uploading --UPLOAD_DONE (all terminal)--> error
//! uploading --UPLOAD_ERROR-->               error
//! uploading --CANCEL-->                     idle
//! idle | uploaded | error --CLEAR-->        idle
//! ```

use crate::model::command::{Cycle, ItemCommand};
use crate::model::item_state::ItemState;
use crate::model::session_state::SessionState;
use crate::model::snapshot::{ItemSnapshot, SessionSnapshot};
use crate::model::upload_file::ItemId;
use crate::settings::file_credentials::FileCredential;
use std::collections::HashSet;

/// The supervisor's view of one child actor
pub trait ItemRef {
    fn id(&self) -> ItemId;
    fn name(&self) -> &str;
    /// Declared size in bytes, fixed at creation
    fn size(&self) -> u64;
    /// Latest state published by the child
    fn state(&self) -> ItemState;
    /// Deliver a command to the child's inbox without waiting
    fn send(&self, command: ItemCommand);
}

/// Round-half-up integer percentage of `loaded` over `total`, capped at 100.
///
/// An empty total reports 0.
pub fn percentage(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let loaded = loaded as u128;
    let total = total as u128;
    let rounded = (200 * loaded + total) / (2 * total);
    rounded.min(100) as u8
}

/// Aggregate state of an upload session
pub struct UploadSession<I> {
    state: SessionState,
    items: Vec<I>,
    loaded: u64,
    total: u64,
    progress: Option<u8>,
    cycle: Cycle,
    /// Items whose size is part of `total`
    counted: HashSet<ItemId>,
}

impl<I: ItemRef> Default for UploadSession<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ItemRef> UploadSession<I> {
    pub fn new() -> Self {
        UploadSession {
            state: SessionState::Idle,
            items: Vec::new(),
            loaded: 0,
            total: 0,
            progress: None,
            cycle: 0,
            counted: HashSet::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of the current (or last) upload cycle
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&I> {
        self.items.iter().find(|item| item.id() == id)
    }

    // ==================== Guards ====================

    fn has_file_to_upload(&self) -> bool {
        self.items.iter().any(|item| item.state().is_idle())
    }

    fn is_all_uploaded(&self) -> bool {
        self.items.iter().all(|item| item.state().is_uploaded())
    }

    fn is_all_uploaded_or_error(&self) -> bool {
        self.items.iter().all(|item| item.state().is_terminal())
    }

    /// Sum of the sizes of every item not uploaded yet
    fn pending_total(&self) -> u64 {
        self.items
            .iter()
            .filter(|item| !item.state().is_uploaded())
            .map(|item| item.size())
            .sum()
    }

    /// Recompute `total` from every item not uploaded yet
    fn recount_total(&mut self) {
        self.counted = self
            .items
            .iter()
            .filter(|item| !item.state().is_uploaded())
            .map(|item| item.id())
            .collect();
        self.total = self.pending_total();
    }

    fn uploaded_total(&self) -> u64 {
        self.items
            .iter()
            .filter(|item| item.state().is_uploaded())
            .map(|item| item.size())
            .sum()
    }

    fn is_current(&self, cycle: Cycle) -> bool {
        self.state == SessionState::Uploading && cycle == self.cycle
    }

    // ==================== State entry ====================

    fn enter_idle(&mut self) {
        self.state = SessionState::Idle;
        self.progress = None;
        self.loaded = 0;
        self.total = 0;
        self.counted.clear();
    }

    fn enter_uploaded(&mut self) {
        self.state = SessionState::Uploaded;
        self.progress = Some(100);
        self.loaded = self.uploaded_total();
    }

    fn broadcast(&self, command: ItemCommand) {
        for item in &self.items {
            item.send(command.clone());
        }
    }

    // ==================== Events ====================

    /// ADD: append new items and recompute the total. Never changes the state.
    pub fn add(&mut self, items: Vec<I>) {
        if items.is_empty() {
            return;
        }
        tracing::debug!("Adding {} item(s) to the session", items.len());
        self.items.extend(items);
        self.recount_total();
        if self.progress.is_some() {
            self.progress = Some(percentage(self.loaded, self.total));
        }
    }

    /// UPLOAD: start a new cycle if the session is idle or failed and at least
    /// one item is idle. Returns whether the command was accepted.
    pub fn start_upload(
        &mut self,
        bucket_id: Option<String>,
        credential: Option<FileCredential>,
    ) -> bool {
        if !matches!(self.state, SessionState::Idle | SessionState::Error) {
            tracing::debug!("Ignoring upload command while {}", self.state);
            return false;
        }
        if !self.has_file_to_upload() {
            tracing::debug!("Ignoring upload command, no idle item to upload");
            return false;
        }

        self.state = SessionState::Uploading;
        self.cycle += 1;
        self.loaded = 0;
        self.recount_total();
        self.progress = Some(0);
        tracing::info!(
            "Upload cycle {} started: {} item(s), {} bytes",
            self.cycle,
            self.items.len(),
            self.total
        );

        self.broadcast(ItemCommand::Upload {
            cycle: self.cycle,
            bucket_id,
            credential,
        });
        true
    }

    /// UPLOAD_PROGRESS: add transferred bytes reported by an item
    pub fn record_progress(&mut self, cycle: Cycle, additions: u64) {
        if !self.is_current(cycle) {
            tracing::debug!("Dropping progress of {} bytes from cycle {}", additions, cycle);
            return;
        }
        self.loaded = self.loaded.saturating_add(additions);
        self.progress = Some(percentage(self.loaded, self.total));
    }

    /// UPLOAD_DONE: an item reached a terminal state (uploaded or failed).
    ///
    /// The outcome is derived from every item's current state, so the order in
    /// which completions arrive does not matter.
    pub fn item_finished(&mut self, cycle: Cycle) {
        if !self.is_current(cycle) {
            tracing::debug!("Dropping completion from cycle {}", cycle);
            return;
        }
        self.settle();
    }

    /// End the running cycle once every item is terminal
    fn settle(&mut self) {
        if self.is_all_uploaded() {
            self.enter_uploaded();
            tracing::info!("Upload cycle {} finished: all items uploaded", self.cycle);
        } else if self.is_all_uploaded_or_error() {
            self.state = SessionState::Error;
            tracing::warn!("Upload cycle {} finished with failures", self.cycle);
        }
    }

    /// UPLOAD_ERROR: session-level failure, does not wait for other items
    pub fn fail(&mut self) -> bool {
        if self.state != SessionState::Uploading {
            tracing::debug!("Ignoring session failure while {}", self.state);
            return false;
        }
        self.state = SessionState::Error;
        tracing::warn!("Upload cycle {} failed at session level", self.cycle);
        true
    }

    /// CANCEL: tell every item to stop and reset the counters
    pub fn cancel(&mut self) -> bool {
        if self.state != SessionState::Uploading {
            tracing::debug!("Ignoring cancel while {}", self.state);
            return false;
        }
        self.broadcast(ItemCommand::Cancel);
        self.enter_idle();
        tracing::info!("Upload cycle {} cancelled", self.cycle);
        true
    }

    /// CLEAR: destroy every item and go back to idle
    pub fn clear(&mut self) -> bool {
        if self.state == SessionState::Uploading {
            tracing::debug!("Ignoring clear while uploading");
            return false;
        }
        self.broadcast(ItemCommand::Destroy);
        self.enter_idle();
        true
    }

    /// Destroy a single item; it is dropped once it reports stopped
    pub fn destroy_item(&mut self, id: ItemId) -> bool {
        match self.item(id) {
            Some(item) => {
                item.send(ItemCommand::Destroy);
                true
            }
            None => {
                tracing::debug!("Ignoring destroy for unknown {}", id);
                false
            }
        }
    }

    /// REMOVE: drop every stopped item and hand them back for release
    pub fn remove_stopped(&mut self) -> Vec<I> {
        let (stopped, live): (Vec<I>, Vec<I>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| item.state().is_stopped());
        self.items = live;
        if stopped.is_empty() {
            return stopped;
        }
        tracing::debug!("Removed {} stopped item(s)", stopped.len());

        if self.state == SessionState::Uploading {
            let removed: u64 = stopped
                .iter()
                .filter(|item| self.counted.remove(&item.id()))
                .map(|item| item.size())
                .sum();
            self.total = self.total.saturating_sub(removed);
            if self.items.is_empty() {
                tracing::info!("Upload cycle {} ended, every item was removed", self.cycle);
                self.enter_idle();
            } else {
                self.progress = Some(percentage(self.loaded, self.total));
                self.settle();
            }
        }
        stopped
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            progress: self.progress,
            loaded: self.loaded,
            total: self.total,
            items: self
                .items
                .iter()
                .map(|item| ItemSnapshot {
                    id: item.id(),
                    name: item.name().to_string(),
                    size: item.size(),
                    state: item.state(),
                })
                .collect(),
        }
    }
}
