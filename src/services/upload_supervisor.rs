//! Upload supervisor: the single task that owns an [`UploadSession`]
//!
//! Caller commands and actor events are consumed one at a time by
//! [`UploadSupervisor::main_loop`]; after each one the latest
//! [`SessionSnapshot`] is published to every [`UploadHandle`].

use crate::model::command::{ItemEvent, SessionCommand};
use crate::model::error::SupervisorGone;
use crate::model::snapshot::SessionSnapshot;
use crate::model::upload_file::{FileBatch, ItemId};
use crate::model::upload_session::{ItemRef, UploadSession};
use crate::services::task_registry::TaskRegistry;
use crate::services::transport::Transport;
use crate::services::upload_actor::{ItemHandle, UploadActor};
use crate::settings::file_credentials::FileCredential;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_futures::Instrument;

/// Messages accepted by the supervisor loop
#[derive(Debug)]
enum SupervisorMessage {
    Command(SessionCommand),
    Shutdown,
}

/// Cloneable command surface of a running supervisor
#[derive(Clone)]
pub struct UploadHandle {
    commands: UnboundedSender<SupervisorMessage>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl UploadHandle {
    pub fn send(&self, command: SessionCommand) -> Result<(), SupervisorGone> {
        self.commands
            .send(SupervisorMessage::Command(command))
            .map_err(|_| SupervisorGone)
    }

    /// Add one file or a batch of files
    pub fn add_files(&self, files: impl Into<FileBatch>) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::Add {
            files: files.into(),
        })
    }

    pub fn start_upload(
        &self,
        bucket_id: Option<String>,
        credential: Option<FileCredential>,
    ) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::Upload {
            bucket_id,
            credential,
        })
    }

    pub fn cancel_upload(&self) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::Cancel)
    }

    pub fn clear_all(&self) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::Clear)
    }

    pub fn remove_stopped(&self) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::RemoveStopped)
    }

    /// Destroy one item; it leaves the session once stopped
    pub fn remove_file(&self, item: ItemId) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::RemoveFile { item })
    }

    /// Fail the running cycle at session level
    pub fn fail_session(&self, reason: impl Into<String>) -> Result<(), SupervisorGone> {
        self.send(SessionCommand::Fail {
            reason: reason.into(),
        })
    }

    /// Stop every actor and end the supervisor loop
    pub fn shutdown(&self) -> Result<(), SupervisorGone> {
        self.commands
            .send(SupervisorMessage::Shutdown)
            .map_err(|_| SupervisorGone)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SupervisorGone> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.map_err(|_| SupervisorGone)?;
        Ok(snapshot.clone())
    }
}

/// Owns the session, spawns one actor per file and routes events
pub struct UploadSupervisor {
    transport: Arc<dyn Transport>,
    session: UploadSession<ItemHandle>,
    registry: TaskRegistry,
    next_item_id: u64,
    commands_rx: UnboundedReceiver<SupervisorMessage>,
    events_tx: UnboundedSender<ItemEvent>,
    events_rx: UnboundedReceiver<ItemEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl UploadSupervisor {
    pub fn new(transport: Arc<dyn Transport>) -> (Self, UploadHandle) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let supervisor = UploadSupervisor {
            transport,
            session: UploadSession::new(),
            registry: TaskRegistry::new(),
            next_item_id: 1,
            commands_rx,
            events_tx,
            events_rx,
            snapshot_tx,
        };
        let handle = UploadHandle {
            commands: commands_tx,
            snapshots: snapshot_rx,
        };
        (supervisor, handle)
    }

    /// Create a supervisor and run its loop on the current runtime
    pub fn spawn(transport: Arc<dyn Transport>) -> (UploadHandle, JoinHandle<()>) {
        let (supervisor, handle) = Self::new(transport);
        let task = tokio::spawn(
            supervisor
                .main_loop()
                .instrument(tracing::info_span!("upload_supervisor")),
        );
        (handle, task)
    }

    pub async fn main_loop(mut self) {
        tracing::debug!("Upload supervisor started");
        loop {
            tokio::select! {
                message = self.commands_rx.recv() => match message {
                    Some(SupervisorMessage::Command(command)) => self.handle_command(command).await,
                    Some(SupervisorMessage::Shutdown) | None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
            self.publish();
        }

        let stopped = self.registry.stop_all().await;
        tracing::debug!("Upload supervisor stopped, {} actor task(s) aborted", stopped);
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.session.snapshot());
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Add { files } => self.add_files(files).await,
            SessionCommand::Upload {
                bucket_id,
                credential,
            } => {
                self.session.start_upload(bucket_id, credential);
            }
            SessionCommand::Cancel => {
                self.session.cancel();
            }
            SessionCommand::Clear => {
                self.session.clear();
            }
            SessionCommand::RemoveStopped => self.remove_stopped().await,
            SessionCommand::RemoveFile { item } => {
                self.session.destroy_item(item);
            }
            SessionCommand::Fail { reason } => {
                if self.session.fail() {
                    tracing::error!("Upload session failed: {}", reason);
                }
            }
        }
    }

    async fn handle_event(&mut self, event: ItemEvent) {
        match event {
            ItemEvent::Progress {
                cycle, additions, ..
            } => self.session.record_progress(cycle, additions),
            ItemEvent::Done { cycle, .. } => self.session.item_finished(cycle),
            ItemEvent::Failed { item, cycle, error } => {
                tracing::debug!("{} failed in cycle {}: {}", item, cycle, error);
                self.session.item_finished(cycle);
            }
            ItemEvent::Stopped { .. } => self.remove_stopped().await,
            ItemEvent::StateChanged { .. } => {}
        }
    }

    async fn add_files(&mut self, files: FileBatch) {
        let mut handles = Vec::with_capacity(files.len());
        for file in files.into_files() {
            let id = ItemId::from(self.next_item_id);
            self.next_item_id += 1;

            let span = tracing::info_span!("upload_actor", item = %id, file = %file.name());
            let (actor, handle) =
                UploadActor::new(id, file, self.transport.clone(), self.events_tx.clone());
            self.registry
                .spawn_tracked(id, actor.run().instrument(span))
                .await;
            handles.push(handle);
        }
        self.session.add(handles);
    }

    async fn remove_stopped(&mut self) {
        for handle in self.session.remove_stopped() {
            self.registry.stop(handle.id()).await;
        }
    }
}
