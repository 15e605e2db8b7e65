//! The uploader session loop.
//!
//! A single task owns the registry, the dispatcher and the user log. User
//! commands, backend push events and completions of the session's own
//! background work all arrive on channels and are applied one at a time, so
//! no two mutations ever interleave.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::UploaderBackend;
use super::dispatcher::UploadDispatcher;
use super::error::{UploaderError, UploaderResult};
use super::events::{reconcile, UploadEvent};
use super::extension_filter::ExtensionFilter;
use super::handle::{UploaderCommand, UploaderHandle};
use super::message_log::MessageLog;
use super::models::{AlbumId, FileId};
use super::registry::{AdmissionReport, AlbumRegistry};
use super::snapshot::UploaderSnapshot;

/// Tuning for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub command_channel_capacity: usize,
    pub message_log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_channel_capacity: 100,
            message_log_capacity: 500,
        }
    }
}

/// An `add_files` batch waiting for its turn, with its target fixed.
struct PendingAdmission {
    album_id: AlbumId,
    paths: Vec<String>,
    response: oneshot::Sender<UploaderResult<AdmissionReport>>,
}

/// Files that passed the extension filter, each with a generated id.
struct PreparedBatch {
    disallowed: Vec<String>,
    candidates: Vec<(String, FileId)>,
}

/// Completions of work the session spawned off its own loop.
enum SessionMessage {
    AdmissionReady {
        album_id: AlbumId,
        prepared: Result<PreparedBatch>,
        response: oneshot::Sender<UploaderResult<AdmissionReport>>,
    },
    UploadFinished {
        album_id: AlbumId,
        result: Result<String>,
    },
}

pub struct UploaderSession {
    registry: AlbumRegistry,
    dispatcher: UploadDispatcher,
    log: MessageLog,
    backend: Arc<dyn UploaderBackend>,
    command_rx: mpsc::Receiver<UploaderCommand>,
    event_rx: mpsc::Receiver<UploadEvent>,
    internal_tx: mpsc::UnboundedSender<SessionMessage>,
    internal_rx: mpsc::UnboundedReceiver<SessionMessage>,
    snapshot_tx: watch::Sender<UploaderSnapshot>,
    /// Batches are prepared one at a time so they land in call order
    admissions: VecDeque<PendingAdmission>,
    admitting: bool,
    /// Responses held back until the state they describe is published
    pending_replies: Vec<Box<dyn FnOnce() + Send>>,
    shutdown_token: CancellationToken,
}

/// Create a session and a handle for interacting with it.
///
/// `event_rx` is the inbound push channel; whoever implements the backend
/// holds the matching sender.
pub fn create_session(
    backend: Arc<dyn UploaderBackend>,
    event_rx: mpsc::Receiver<UploadEvent>,
    shutdown_token: CancellationToken,
    config: SessionConfig,
) -> (UploaderSession, UploaderHandle) {
    let registry = AlbumRegistry::new();
    let dispatcher = UploadDispatcher::new();
    let log = MessageLog::new(config.message_log_capacity);
    let (snapshot_tx, snapshot_rx) =
        watch::channel(UploaderSnapshot::capture(&registry, &dispatcher, &log));
    let (command_tx, command_rx) = mpsc::channel(config.command_channel_capacity);
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();

    let session = UploaderSession {
        registry,
        dispatcher,
        log,
        backend,
        command_rx,
        event_rx,
        internal_tx,
        internal_rx,
        snapshot_tx,
        admissions: VecDeque::new(),
        admitting: false,
        pending_replies: Vec::new(),
        shutdown_token,
    };
    (session, UploaderHandle::new(command_tx, snapshot_rx))
}

impl UploaderSession {
    /// Main session loop.
    pub async fn run(mut self) {
        info!("Starting uploader session");

        loop {
            // Push events are drained before completions so that reports sent
            // ahead of an upload call's return are applied first.
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Uploader session received shutdown signal");
                    break;
                }
                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event);
                }
                Some(message) = self.internal_rx.recv() => {
                    self.handle_internal(message);
                }
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd);
                }
                else => break,
            }

            self.pump_dispatcher();
            self.publish();
            for reply in self.pending_replies.drain(..) {
                reply();
            }
        }

        if !self.dispatcher.is_idle() {
            warn!(
                "Uploader session stopped with {} queued albums and busy={}",
                self.dispatcher.queue_len(),
                self.dispatcher.is_busy()
            );
        }
        info!("Uploader session stopped");
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(UploaderSnapshot::capture(
            &self.registry,
            &self.dispatcher,
            &self.log,
        ));
    }

    /// Queue a command response to be sent after the next publish, so callers
    /// always observe their own mutation in the snapshot.
    fn reply<T: Send + 'static>(&mut self, response: oneshot::Sender<T>, value: T) {
        self.pending_replies.push(Box::new(move || {
            let _ = response.send(value);
        }));
    }

    fn handle_event(&mut self, event: UploadEvent) {
        debug!("Push event: {:?}", event);
        if let Some(message) = reconcile(&mut self.registry, event) {
            self.log.push(message);
        }
    }

    fn handle_command(&mut self, cmd: UploaderCommand) {
        match cmd {
            UploaderCommand::CreateAndSelectAlbum { response } => {
                let id = self.registry.create_and_select_album();
                self.reply(response, id);
            }
            UploaderCommand::SetAlbumName { name, response } => {
                let result = self.registry.set_album_name(&name);
                let result = self.log_failure(result);
                self.reply(response, result);
            }
            UploaderCommand::SetAlbumArtist { artist, response } => {
                let result = self.registry.set_album_artist(&artist);
                let result = self.log_failure(result);
                self.reply(response, result);
            }
            UploaderCommand::SelectAlbum { album_id, response } => {
                let result = self.registry.select_album(album_id);
                if let Err(e) = &result {
                    debug!("Ignoring selection: {}", e);
                }
                self.reply(response, result);
            }
            UploaderCommand::CloseAlbum { album_id, response } => {
                let result = match self.registry.close_album(album_id) {
                    Err(UploaderError::AlbumBusy(id)) => {
                        self.log
                            .push(format!("Cannot close album {}, it is uploading", id));
                        Err(UploaderError::AlbumBusy(id))
                    }
                    other => self.log_failure(other),
                };
                self.reply(response, result);
            }
            UploaderCommand::AddFiles { paths, response } => {
                self.admissions.push_back(PendingAdmission {
                    album_id: self.registry.selected_id(),
                    paths,
                    response,
                });
                self.start_next_admission();
            }
            UploaderCommand::RequestUpload { album_id, response } => {
                let result = self.dispatcher.request_upload(&mut self.registry, album_id);
                let result = match result {
                    Err(UploaderError::Validation(issues)) => {
                        for issue in &issues {
                            self.log.push(issue.to_string());
                        }
                        Err(UploaderError::Validation(issues))
                    }
                    other => self.log_failure(other),
                };
                self.reply(response, result);
            }
            UploaderCommand::AppendLog { text, response } => {
                self.log.push(text);
                self.reply(response, ());
            }
            UploaderCommand::ClearLog { response } => {
                self.log.clear();
                self.reply(response, ());
            }
        }
    }

    /// Write a failed operation's error to the user log and pass it through.
    fn log_failure<T>(&mut self, result: UploaderResult<T>) -> UploaderResult<T> {
        if let Err(e) = &result {
            warn!("{}", e);
            self.log.push(e.to_string());
        }
        result
    }

    /// Fetch the allow-list and generate ids off the loop, then come back.
    ///
    /// The target album was fixed when the command arrived, so a selection
    /// change while the batch is being prepared does not redirect it.
    fn start_next_admission(&mut self) {
        if self.admitting {
            return;
        }
        let Some(PendingAdmission {
            album_id,
            paths,
            response,
        }) = self.admissions.pop_front()
        else {
            return;
        };
        self.admitting = true;
        let backend = self.backend.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let prepared = prepare_batch(backend.as_ref(), paths).await;
            let _ = internal_tx.send(SessionMessage::AdmissionReady {
                album_id,
                prepared,
                response,
            });
        });
    }

    fn handle_internal(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::AdmissionReady {
                album_id,
                prepared,
                response,
            } => {
                let result = self.finish_admission(album_id, prepared);
                self.reply(response, result);
                self.admitting = false;
                self.start_next_admission();
            }
            SessionMessage::UploadFinished { album_id, result } => {
                self.dispatcher.complete();
                match result {
                    Ok(message) => {
                        info!("Upload call for album {} returned", album_id);
                        self.log.push(message);
                    }
                    Err(e) => {
                        warn!("Upload call for album {} failed: {:#}", album_id, e);
                        self.log
                            .push(format!("Upload of album {} failed: {:#}", album_id, e));
                    }
                }
            }
        }
    }

    fn finish_admission(
        &mut self,
        album_id: AlbumId,
        prepared: Result<PreparedBatch>,
    ) -> UploaderResult<AdmissionReport> {
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.log.push(format!("Could not add files: {:#}", e));
                return Err(UploaderError::Backend(e));
            }
        };

        let mut report = AdmissionReport {
            admitted: Vec::new(),
            rejected: prepared
                .disallowed
                .into_iter()
                .map(UploaderError::DisallowedExtension)
                .collect(),
        };
        match self.registry.admit_files(album_id, prepared.candidates) {
            Ok(admitted) => report.merge(admitted),
            Err(UploaderError::AlbumBusy(id)) => {
                self.log.push(format!(
                    "Cannot add files to album {}, it is queued or uploading",
                    id
                ));
                return Err(UploaderError::AlbumBusy(id));
            }
            Err(e) => {
                self.log.push(format!(
                    "Album {} was closed before its files could be added",
                    album_id
                ));
                return Err(e);
            }
        }

        for rejection in &report.rejected {
            self.log.push(rejection.to_string());
        }
        debug!(
            "Admitted {} files into album {}",
            report.admitted.len(),
            album_id
        );
        Ok(report)
    }

    /// Hand the next queued album to the backend if nothing is in flight.
    fn pump_dispatcher(&mut self) {
        let Some(job) = self.dispatcher.next_dispatch(&self.registry) else {
            return;
        };
        let album_id = job.album.id;
        info!("Starting upload of album {}", album_id);
        let backend = self.backend.clone();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let result = backend.upload_album(job.album, job.songs).await;
            let _ = internal_tx.send(SessionMessage::UploadFinished { album_id, result });
        });
    }
}

async fn prepare_batch(backend: &dyn UploaderBackend, paths: Vec<String>) -> Result<PreparedBatch> {
    let filter = ExtensionFilter::new(backend.allowed_extensions().await?);
    let mut batch = PreparedBatch {
        disallowed: Vec::new(),
        candidates: Vec::with_capacity(paths.len()),
    };
    for path in paths {
        if filter.is_admissible(&path) {
            let id = backend.generate_id().await?;
            batch.candidates.push((path, id));
        } else {
            batch.disallowed.push(path);
        }
    }
    Ok(batch)
}
