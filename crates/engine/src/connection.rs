use crate::router::{ConnectionId, RouteOutcome, SharedRouter};
use log::{debug, error};
use std::sync::atomic::{AtomicBool, Ordering};

/// One transport connection's view of the router.
///
/// Messages are routed synchronously in call order. Closing (explicitly or on drop) turns
/// into a "client gone" event on every channel the connection delivered to.
pub struct Connection {
    id: ConnectionId,
    router: SharedRouter,
    closed: AtomicBool,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, router: SharedRouter) -> Self {
        debug!("{id} opened");
        Self {
            id,
            router,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn on_message(&self, raw: &str) -> RouteOutcome {
        if self.closed.load(Ordering::SeqCst) {
            return RouteOutcome::Rejected("connection closed".to_string());
        }
        match self.router.lock() {
            Ok(mut router) => router.route(self.id, raw),
            Err(_) => {
                error!("Router lock poisoned; dropping message from {}", self.id);
                RouteOutcome::Rejected("router unavailable".to_string())
            }
        }
    }

    /// Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.router.lock() {
            Ok(mut router) => {
                let channels = router.disconnect(self.id);
                debug!("{} closed, {channels} channel(s) notified", self.id);
            }
            Err(_) => error!("Router lock poisoned; {} not disconnected", self.id),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
