use log::{error, info};
use tokio::sync::watch;

/// External dependencies the ingestion queue waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Store,
    OutputDir,
}

impl Dependency {
    const fn label(self) -> &'static str {
        match self {
            Self::Store => "STORE",
            Self::OutputDir => "FS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
struct GateState {
    store: bool,
    output_dir: bool,
    failed: Option<String>,
}

impl GateState {
    fn readiness(&self) -> Readiness {
        match &self.failed {
            Some(reason) => Readiness::Failed(reason.clone()),
            None if self.store && self.output_dir => Readiness::Ready,
            None => Readiness::Pending,
        }
    }
}

/// Resolves once every dependency is ready, or as soon as one fails. The first
/// resolution is final.
#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<GateState>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::default());
        Self { tx }
    }

    pub fn mark_ready(&self, dependency: Dependency) {
        self.tx.send_if_modified(|state| {
            if state.failed.is_some() {
                return false;
            }
            match dependency {
                Dependency::Store => state.store = true,
                Dependency::OutputDir => state.output_dir = true,
            }
            info!("{} ready", dependency.label());
            if state.readiness() == Readiness::Ready {
                info!("READY");
            }
            true
        });
    }

    pub fn mark_failed(&self, dependency: Dependency, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|state| {
            if state.failed.is_some() || state.readiness() == Readiness::Ready {
                return false;
            }
            error!("{} FAIL: {reason}", dependency.label());
            state.failed = Some(format!("{}: {reason}", dependency.label()));
            true
        });
    }

    /// Resolve a still-pending gate as failed without blaming a dependency.
    pub(crate) fn abort(&self, reason: &str) {
        self.tx.send_if_modified(|state| {
            if state.readiness() != Readiness::Pending {
                return false;
            }
            state.failed = Some(reason.to_string());
            true
        });
    }

    #[must_use]
    pub fn status(&self) -> Readiness {
        self.tx.borrow().readiness()
    }

    /// Wait for the gate to resolve. `Err` carries the failure reason.
    pub async fn wait(&self) -> Result<(), String> {
        let mut rx = self.tx.subscribe();
        let resolved = rx
            .wait_for(|state| state.readiness() != Readiness::Pending)
            .await
            .map_err(|_| "readiness gate dropped".to_string())?
            .readiness();
        match resolved {
            Readiness::Failed(reason) => Err(reason),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn ready_after_both_dependencies() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait().await })
        };
        gate.mark_ready(Dependency::Store);
        assert_eq!(gate.status(), Readiness::Pending);
        gate.mark_ready(Dependency::OutputDir);
        assert_eq!(gate.status(), Readiness::Ready);
        assert_eq!(waiter.await.unwrap(), Ok(()));
        // Resolution is final.
        gate.mark_failed(Dependency::Store, "late");
        assert_eq!(gate.status(), Readiness::Ready);
    }

    #[tokio::test]
    async fn first_failure_wins() {
        let gate = ReadinessGate::new();
        gate.mark_ready(Dependency::Store);
        gate.mark_failed(Dependency::OutputDir, "permission denied");
        gate.mark_failed(Dependency::Store, "second");
        gate.mark_ready(Dependency::OutputDir);
        assert_eq!(gate.wait().await, Err("FS: permission denied".to_string()));
    }

    #[tokio::test]
    async fn abort_only_resolves_pending_gates() {
        let gate = ReadinessGate::new();
        gate.abort("stopped");
        assert_eq!(gate.status(), Readiness::Failed("stopped".to_string()));

        let ready = ReadinessGate::new();
        ready.mark_ready(Dependency::Store);
        ready.mark_ready(Dependency::OutputDir);
        ready.abort("stopped");
        assert_eq!(ready.status(), Readiness::Ready);
    }
}
