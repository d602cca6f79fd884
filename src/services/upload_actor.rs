//! Upload actor: one task per file
//!
//! The actor owns its file and its [`ItemState`]. It consumes commands from its
//! own inbox, drives the transport while uploading and forwards progress and
//! outcome to the supervisor without waiting for acknowledgment. Its state is
//! published through a watch channel so the supervisor can scan every item
//! without asking.

use crate::model::command::{Cycle, ItemCommand, ItemEvent};
use crate::model::error::TransportResult;
use crate::model::item_state::ItemState;
use crate::model::upload_file::{ItemId, UploadFile};
use crate::model::upload_session::ItemRef;
use crate::services::transport::{ProgressReporter, Transport, UploadRequest};
use crate::settings::file_credentials::FileCredential;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Supervisor-side reference to a running actor
#[derive(Debug)]
pub struct ItemHandle {
    id: ItemId,
    name: String,
    size: u64,
    inbox: UnboundedSender<ItemCommand>,
    state: watch::Receiver<ItemState>,
}

impl ItemRef for ItemHandle {
    fn id(&self) -> ItemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn state(&self) -> ItemState {
        self.state.borrow().clone()
    }

    fn send(&self, command: ItemCommand) {
        if self.inbox.send(command).is_err() {
            tracing::debug!("{} is no longer running, command dropped", self.id);
        }
    }
}

/// Message from a transfer task back to its actor
#[derive(Debug)]
struct TransferEvent {
    generation: u64,
    kind: TransferKind,
}

#[derive(Debug)]
enum TransferKind {
    Progress(u64),
    Finished(TransportResult),
}

/// The transfer currently driven by the actor; dropping it aborts the task
struct ActiveTransfer {
    cycle: Cycle,
    generation: u64,
    task: JoinHandle<()>,
}

impl Drop for ActiveTransfer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct UploadActor {
    id: ItemId,
    file: UploadFile,
    transport: Arc<dyn Transport>,
    inbox: UnboundedReceiver<ItemCommand>,
    state: watch::Sender<ItemState>,
    parent: UnboundedSender<ItemEvent>,
    transfer_tx: UnboundedSender<TransferEvent>,
    transfer_rx: UnboundedReceiver<TransferEvent>,
    transfer: Option<ActiveTransfer>,
    generation: u64,
}

impl UploadActor {
    /// Create an idle actor for `file` and the handle the supervisor keeps
    pub fn new(
        id: ItemId,
        file: UploadFile,
        transport: Arc<dyn Transport>,
        parent: UnboundedSender<ItemEvent>,
    ) -> (Self, ItemHandle) {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(ItemState::Idle);
        let (transfer_tx, transfer_rx) = mpsc::unbounded_channel();

        let handle = ItemHandle {
            id,
            name: file.name().to_string(),
            size: file.size(),
            inbox: inbox_tx,
            state: state_rx,
        };
        let actor = UploadActor {
            id,
            file,
            transport,
            inbox,
            state,
            parent,
            transfer_tx,
            transfer_rx,
            transfer: None,
            generation: 0,
        };
        (actor, handle)
    }

    /// Process commands and transfer events until destroyed or orphaned
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.inbox.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("{} lost its supervisor", self.id);
                        self.abort_transfer();
                        break;
                    }
                },
                Some(event) = self.transfer_rx.recv() => self.handle_transfer(event),
            }
        }
    }

    fn current(&self) -> ItemState {
        self.state.borrow().clone()
    }

    /// Publish the new state, then tell the supervisor to refresh its view
    fn transition(&mut self, state: ItemState) {
        tracing::debug!("{}: {} -> {}", self.id, self.current().label(), state.label());
        self.state.send_replace(state);
        self.notify(ItemEvent::StateChanged { item: self.id });
    }

    fn notify(&self, event: ItemEvent) {
        // The supervisor may already be gone during shutdown
        let _ = self.parent.send(event);
    }

    /// Returns false once the actor has stopped
    fn handle_command(&mut self, command: ItemCommand) -> bool {
        match command {
            ItemCommand::Upload {
                cycle,
                bucket_id,
                credential,
            } => {
                let current = self.current();
                if current.is_idle() || current.is_error() {
                    self.start_transfer(cycle, bucket_id, credential);
                } else {
                    tracing::debug!("{} ignores upload while {}", self.id, current.label());
                }
                true
            }
            ItemCommand::Cancel => {
                if !self.current().is_idle() {
                    self.abort_transfer();
                    self.transition(ItemState::Idle);
                }
                true
            }
            ItemCommand::Destroy => {
                self.abort_transfer();
                self.transition(ItemState::Stopped);
                self.notify(ItemEvent::Stopped { item: self.id });
                false
            }
        }
    }

    fn start_transfer(
        &mut self,
        cycle: Cycle,
        bucket_id: Option<String>,
        credential: Option<FileCredential>,
    ) {
        self.generation += 1;
        let generation = self.generation;

        let progress_tx = self.transfer_tx.clone();
        let reporter = ProgressReporter::new(move |additions| {
            let _ = progress_tx.send(TransferEvent {
                generation,
                kind: TransferKind::Progress(additions),
            });
        });
        let request = UploadRequest {
            item: self.id,
            file: self.file.clone(),
            bucket_id,
            credential,
        };
        tracing::info!(
            "{}: uploading {} ({} bytes)",
            self.id,
            self.file.name(),
            self.file.size()
        );
        let upload = self.transport.upload(request, reporter);

        let done_tx = self.transfer_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = upload.await;
            let _ = done_tx.send(TransferEvent {
                generation,
                kind: TransferKind::Finished(outcome),
            });
        });

        self.transfer = Some(ActiveTransfer {
            cycle,
            generation,
            task,
        });
        self.transition(ItemState::Uploading);
    }

    fn abort_transfer(&mut self) {
        if self.transfer.take().is_some() {
            tracing::info!("{}: transfer aborted", self.id);
        }
    }

    fn handle_transfer(&mut self, event: TransferEvent) {
        let cycle = match &self.transfer {
            Some(transfer) if transfer.generation == event.generation => transfer.cycle,
            _ => return, // late event of an aborted transfer
        };

        match event.kind {
            TransferKind::Progress(additions) => {
                self.notify(ItemEvent::Progress {
                    item: self.id,
                    cycle,
                    additions,
                });
            }
            TransferKind::Finished(Ok(())) => {
                self.transfer = None;
                tracing::info!("{}: {} uploaded", self.id, self.file.name());
                self.transition(ItemState::Uploaded);
                self.notify(ItemEvent::Done {
                    item: self.id,
                    cycle,
                });
            }
            TransferKind::Finished(Err(error)) => {
                self.transfer = None;
                tracing::warn!("{}: upload of {} failed: {}", self.id, self.file.name(), error);
                self.transition(ItemState::Error(error.to_string()));
                self.notify(ItemEvent::Failed {
                    item: self.id,
                    cycle,
                    error,
                });
            }
        }
    }
}
