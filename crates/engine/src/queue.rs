//! Strictly sequential ingestion, paused until the readiness gate resolves.

use crate::active::SharedTargets;
use crate::readiness::ReadinessGate;
use crate::router::{ChannelEvent, ChannelSubscriber, ConnectionId};
use crate::scheduler::FlushHandle;
use crate::writer::SvgFile;
use crate::{Result, TrackerConfig, TrackerError};
use chrono::Utc;
use geotrail_protocol::{parse_record, WireRecord};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub(crate) enum TaskKind {
    Message {
        connection: ConnectionId,
        payload: String,
    },
    ClientGone(ConnectionId),
    /// Completes once every earlier task has.
    Barrier,
    Shutdown,
}

pub(crate) struct IngestTask {
    kind: TaskKind,
    ack: Option<oneshot::Sender<Result<()>>>,
}

/// Producer side of the ingestion queue. Also the location channel's subscriber.
#[derive(Clone)]
pub(crate) struct IngestQueue {
    tx: mpsc::UnboundedSender<IngestTask>,
}

impl IngestQueue {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<IngestTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn push(&self, kind: TaskKind) -> bool {
        self.tx.send(IngestTask { kind, ack: None }).is_ok()
    }

    /// Enqueue and wait for the task to complete.
    pub(crate) async fn submit(&self, kind: TaskKind) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(IngestTask {
                kind,
                ack: Some(ack),
            })
            .map_err(|_| TrackerError::ShuttingDown)?;
        rx.await.map_err(|_| TrackerError::ShuttingDown)?
    }
}

impl ChannelSubscriber for IngestQueue {
    fn deliver(&self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Message {
                connection,
                payload,
            } => self.push(TaskKind::Message {
                connection,
                payload,
            }),
            ChannelEvent::ClientGone(connection) => self.push(TaskKind::ClientGone(connection)),
            ChannelEvent::End => true,
        }
    }
}

pub(crate) struct IngestWorker {
    pub(crate) rx: mpsc::UnboundedReceiver<IngestTask>,
    pub(crate) gate: Arc<ReadinessGate>,
    pub(crate) targets: SharedTargets,
    pub(crate) flush: FlushHandle,
    pub(crate) config: Arc<TrackerConfig>,
}

impl IngestWorker {
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        if let Err(reason) = self.gate.wait().await {
            error!("Ingestion queue will not resume: {reason}");
            self.reject_all(&reason).await;
            return;
        }
        info!("Ingestion queue resumed");

        while let Some(task) = self.rx.recv().await {
            let stop = matches!(task.kind, TaskKind::Shutdown);
            let result = match task.kind {
                TaskKind::Message {
                    connection,
                    payload,
                } => self.ingest(connection, &payload).await,
                TaskKind::ClientGone(connection) => self.client_gone(connection).await,
                TaskKind::Barrier => Ok(()),
                TaskKind::Shutdown => self.flush.shutdown().await.map(|_| ()),
            };
            if let Some(ack) = task.ack {
                let _ = ack.send(result);
            }
            if stop {
                break;
            }
        }
        debug!("Ingestion queue stopped");
    }

    /// Fail every queued and future task until shutdown.
    async fn reject_all(&mut self, reason: &str) {
        while let Some(task) = self.rx.recv().await {
            let stop = matches!(task.kind, TaskKind::Shutdown);
            let result = if stop {
                self.flush.shutdown().await.map(|_| ())
            } else {
                debug!("Dropping {:?}: dependency failed", task.kind);
                Err(TrackerError::DependencyFailed(reason.to_string()))
            };
            if let Some(ack) = task.ack {
                let _ = ack.send(result);
            }
            if stop {
                break;
            }
        }
    }

    async fn ingest(&self, connection: ConnectionId, payload: &str) -> Result<()> {
        let WireRecord {
            target_id,
            location,
        } = parse_record(payload).map_err(|e| {
            warn!("Malformed message from {connection}: {e}");
            TrackerError::MalformedMessage(e)
        })?;

        let created = self
            .targets
            .lock()
            .await
            .append(&target_id, location, connection, Utc::now());

        if created {
            info!("Opening target {target_id}");
            let dir = self.config.target_dir(&target_id);
            match SvgFile::open(&dir, self.config.reduction.precision).await {
                Ok(file) => {
                    if let Some(orphan) = self.targets.lock().await.attach_file(&target_id, file) {
                        warn!("{target_id} vanished while opening {}", orphan.path().display());
                    }
                }
                Err(e) => {
                    error!("Could not open output for {target_id}: {e}");
                    self.targets.lock().await.remove(&target_id);
                    return Err(TrackerError::io(&target_id, e));
                }
            }
        }

        self.flush.trigger();
        Ok(())
    }

    async fn client_gone(&self, connection: ConnectionId) -> Result<()> {
        let orphaned = self.targets.lock().await.release_connection(connection);
        if orphaned.is_empty() {
            return Ok(());
        }
        info!("{connection} gone; finalizing {}", orphaned.join(", "));
        self.flush.finalize(orphaned).await.map(|_| ())
    }
}
