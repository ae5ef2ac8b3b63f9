use crate::active::{ActiveTargets, SharedTargets, TargetStatus};
use crate::connection::Connection;
use crate::flush::{FlushContext, FlushReport};
use crate::persist::PersistenceBatcher;
use crate::queue::{IngestQueue, IngestWorker, TaskKind};
use crate::readiness::{Dependency, Readiness, ReadinessGate};
use crate::router::{ChannelRouter, ConnectionId, SharedRouter};
use crate::scheduler::FlushHandle;
use crate::{Result, TrackerConfig, TrackerError};
use geotrail_store::PathStore;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

/// The ingestion pipeline: router, queue, active targets, flush scheduler and store.
///
/// Cloning is cheap. Dropping the last clone without calling [`Tracker::shutdown`] asks the
/// workers to stop but does not wait for them.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: Arc<TrackerConfig>,
    store: Arc<dyn PathStore>,
    router: SharedRouter,
    location_prefix: String,
    gate: Arc<ReadinessGate>,
    queue: IngestQueue,
    flush: FlushHandle,
    targets: SharedTargets,
    next_connection: AtomicU64,
    stopped: AtomicBool,
    startup: Mutex<Vec<JoinHandle<()>>>,
    workers: TokioMutex<Vec<JoinHandle<()>>>,
}

impl Tracker {
    /// Wire the pipeline and start connecting its dependencies. Must be called from within
    /// a tokio runtime. Ingestion stays paused until the store and the output directory are
    /// both ready.
    pub fn start(config: TrackerConfig, store: Arc<dyn PathStore>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let (queue, rx) = IngestQueue::new();
        let mut router = ChannelRouter::new(config.prefix_width, config.max_message_len);
        let location_prefix = router.create_channel()?;
        router.subscribe(&location_prefix, Arc::new(queue.clone()))?;
        let router = router.shared();

        let gate = Arc::new(ReadinessGate::new());
        let startup = vec![
            spawn_store_connect(Arc::clone(&store), Arc::clone(&gate)),
            spawn_output_dir(&config, Arc::clone(&gate)),
        ];

        let targets: SharedTargets = Arc::new(TokioMutex::new(ActiveTargets::default()));
        let (flush, flush_task) = FlushHandle::spawn(
            FlushContext {
                config: Arc::clone(&config),
                targets: Arc::clone(&targets),
                batcher: PersistenceBatcher::new(Arc::clone(&store)),
            },
            config.flush_interval(),
        );
        let ingest_task = IngestWorker {
            rx,
            gate: Arc::clone(&gate),
            targets: Arc::clone(&targets),
            flush: flush.clone(),
            config: Arc::clone(&config),
        }
        .spawn();

        info!(
            "Tracker started: locations on channel {location_prefix}, output in {}",
            config.output_dir.display()
        );

        Ok(Self {
            inner: Arc::new(TrackerInner {
                config,
                store,
                router,
                location_prefix,
                gate,
                queue,
                flush,
                targets,
                next_connection: AtomicU64::new(1),
                stopped: AtomicBool::new(false),
                startup: Mutex::new(startup),
                workers: TokioMutex::new(vec![ingest_task, flush_task]),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    /// Prefix of the channel carrying location records.
    #[must_use]
    pub fn location_prefix(&self) -> &str {
        &self.inner.location_prefix
    }

    #[must_use]
    pub fn router(&self) -> SharedRouter {
        Arc::clone(&self.inner.router)
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn PathStore> {
        Arc::clone(&self.inner.store)
    }

    /// Register a new transport connection.
    #[must_use]
    pub fn open_connection(&self) -> Connection {
        let id = ConnectionId(self.inner.next_connection.fetch_add(1, Ordering::SeqCst));
        Connection::new(id, self.router())
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.inner.gate.status()
    }

    /// Resolves once both dependencies are ready. Every waiter sees the same outcome.
    pub async fn when_ready(&self) -> Result<()> {
        self.inner
            .gate
            .wait()
            .await
            .map_err(TrackerError::DependencyFailed)
    }

    /// Ingest one location payload (no channel prefix) on behalf of `connection` and wait
    /// until it has been buffered. Waits while dependencies are pending.
    pub async fn submit(&self, connection: ConnectionId, payload: impl Into<String>) -> Result<()> {
        self.inner
            .queue
            .submit(TaskKind::Message {
                connection,
                payload: payload.into(),
            })
            .await
    }

    /// Wait until every task queued so far, routed messages included, has been processed.
    pub async fn drain(&self) -> Result<()> {
        self.inner.queue.submit(TaskKind::Barrier).await
    }

    /// Run a flush cycle now instead of waiting for the throttle.
    pub async fn flush_now(&self) -> Result<FlushReport> {
        match self.readiness() {
            Readiness::Ready => self.inner.flush.flush_now().await,
            Readiness::Pending => Err(TrackerError::DependencyNotReady(
                "store or output directory still connecting".to_string(),
            )),
            Readiness::Failed(reason) => Err(TrackerError::DependencyFailed(reason)),
        }
    }

    /// Live targets in id order.
    pub async fn targets(&self) -> Vec<TargetStatus> {
        self.inner.targets.lock().await.status()
    }

    /// Close the location channel, process everything already queued, finalize every live
    /// target and wait for the workers. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Tracker shutting down");

        self.inner.gate.abort("tracker shut down before dependencies were ready");
        if let Ok(mut startup) = self.inner.startup.lock() {
            for task in startup.drain(..) {
                task.abort();
            }
        }
        match self.inner.router.lock() {
            Ok(mut router) => {
                router.close_channel(&self.inner.location_prefix);
            }
            Err(_) => warn!("Router lock poisoned; location channel left open"),
        }

        let outcome = self.inner.queue.submit(TaskKind::Shutdown).await;

        let workers: Vec<JoinHandle<()>> = self.inner.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Tracker worker ended abnormally: {e}");
            }
        }
        info!("Tracker stopped");
        outcome
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 && !self.inner.stopped.load(Ordering::SeqCst) {
            debug!("Last tracker handle dropped; stopping workers");
            self.inner.gate.abort("tracker dropped");
            let _ = self.inner.queue.push(TaskKind::Shutdown);
        }
    }
}

fn spawn_store_connect(store: Arc<dyn PathStore>, gate: Arc<ReadinessGate>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.connect().await {
            Ok(()) => gate.mark_ready(Dependency::Store),
            Err(e) => gate.mark_failed(Dependency::Store, e.to_string()),
        }
    })
}

fn spawn_output_dir(config: &TrackerConfig, gate: Arc<ReadinessGate>) -> JoinHandle<()> {
    let dir = config.output_dir.clone();
    tokio::spawn(async move {
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => gate.mark_ready(Dependency::OutputDir),
            Err(e) => gate.mark_failed(Dependency::OutputDir, format!("{}: {e}", dir.display())),
        }
    })
}
