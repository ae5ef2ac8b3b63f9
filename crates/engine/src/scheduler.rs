//! Throttled flush scheduling.
//!
//! A single task owns every flush, so at most one cycle (drawing plus persistence) is in
//! flight. Triggers only mark the state dirty; the cycle runs once the throttle deadline
//! passes. Triggers that arrive while a cycle runs are picked up afterwards and schedule
//! the next one.

use crate::flush::{Finalized, FlushContext, FlushReport};
use crate::{Result, TrackerError};
use log::{debug, info};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

enum FlushCommand {
    Trigger,
    FlushNow(oneshot::Sender<FlushReport>),
    Finalize {
        targets: Vec<String>,
        ack: oneshot::Sender<Vec<Finalized>>,
    },
    Shutdown(oneshot::Sender<Vec<Finalized>>),
}

/// Trailing throttle: a cycle runs one interval after the first trigger of a burst, and
/// never sooner than one interval after the previous cycle started.
#[derive(Debug)]
struct ThrottleState {
    interval: Duration,
    dirty: bool,
    first_trigger: Option<Instant>,
    last_started: Option<Instant>,
}

impl ThrottleState {
    const fn new(interval: Duration) -> Self {
        Self {
            interval,
            dirty: false,
            first_trigger: None,
            last_started: None,
        }
    }

    fn record_trigger(&mut self) {
        self.dirty = true;
        self.first_trigger.get_or_insert_with(Instant::now);
    }

    const fn should_run(&self) -> bool {
        self.dirty
    }

    fn next_deadline(&self) -> Option<Instant> {
        if !self.dirty {
            return None;
        }
        let after_trigger = self.first_trigger.map(|t| t + self.interval);
        let after_last = self.last_started.map(|t| t + self.interval);
        match (after_trigger, after_last) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn begin_cycle(&mut self) {
        self.dirty = false;
        self.first_trigger = None;
        self.last_started = Some(Instant::now());
    }
}

/// Handle to the flush task.
#[derive(Clone)]
pub(crate) struct FlushHandle {
    tx: mpsc::UnboundedSender<FlushCommand>,
}

impl FlushHandle {
    pub(crate) fn spawn(ctx: FlushContext, interval: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_flush_loop(ctx, interval, rx));
        (Self { tx }, handle)
    }

    /// Note new data. Never blocks.
    pub(crate) fn trigger(&self) {
        if self.tx.send(FlushCommand::Trigger).is_err() {
            debug!("Flush task gone; trigger dropped");
        }
    }

    pub(crate) async fn flush_now(&self) -> Result<FlushReport> {
        let (ack, rx) = oneshot::channel();
        self.send(FlushCommand::FlushNow(ack))?;
        rx.await.map_err(|_| TrackerError::ShuttingDown)
    }

    pub(crate) async fn finalize(&self, targets: Vec<String>) -> Result<Vec<Finalized>> {
        let (ack, rx) = oneshot::channel();
        self.send(FlushCommand::Finalize { targets, ack })?;
        rx.await.map_err(|_| TrackerError::ShuttingDown)
    }

    pub(crate) async fn shutdown(&self) -> Result<Vec<Finalized>> {
        let (ack, rx) = oneshot::channel();
        self.send(FlushCommand::Shutdown(ack))?;
        rx.await.map_err(|_| TrackerError::ShuttingDown)
    }

    fn send(&self, command: FlushCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| TrackerError::ShuttingDown)
    }
}

async fn run_flush_loop(
    ctx: FlushContext,
    interval: Duration,
    mut rx: mpsc::UnboundedReceiver<FlushCommand>,
) {
    let mut state = ThrottleState::new(interval);

    loop {
        let next_deadline = state.next_deadline();

        tokio::select! {
            command = rx.recv() => {
                match command {
                    Some(FlushCommand::Trigger) => state.record_trigger(),
                    Some(FlushCommand::FlushNow(ack)) => {
                        state.begin_cycle();
                        let report = ctx.flush_cycle(None).await;
                        let _ = ack.send(report);
                    }
                    Some(FlushCommand::Finalize { targets, ack }) => {
                        let done = ctx.finalize(&targets).await;
                        let _ = ack.send(done);
                    }
                    Some(FlushCommand::Shutdown(ack)) => {
                        let done = ctx.finalize_all().await;
                        info!("Flush task stopped; {} target(s) finalized", done.len());
                        let _ = ack.send(done);
                        break;
                    }
                    None => break,
                }
            }
            () = async {
                if let Some(deadline) = next_deadline {
                    time::sleep_until(deadline).await;
                }
            }, if state.should_run() && next_deadline.is_some() => {
                state.begin_cycle();
                ctx.flush_cycle(None).await;
            }
        }
    }
}
