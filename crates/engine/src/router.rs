//! Prefix-based channel demultiplexing over a shared transport.

use crate::{Result, TrackerError};
use geotrail_protocol::{check_len, format_prefix, split_prefix, STATUS_CHECK};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Identity of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a channel subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Payload with the prefix stripped, tagged with its sender.
    Message {
        connection: ConnectionId,
        payload: String,
    },
    /// A connection that delivered to this channel has gone away.
    ClientGone(ConnectionId),
    /// The channel was closed.
    End,
}

/// Receiver side of a channel. Delivery is synchronous and must not block.
pub trait ChannelSubscriber: Send + Sync {
    /// Returns `false` once the subscriber can no longer accept events.
    fn deliver(&self, event: ChannelEvent) -> bool;
}

impl ChannelSubscriber for mpsc::UnboundedSender<ChannelEvent> {
    fn deliver(&self, event: ChannelEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Result of routing one transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded to this many subscribers.
    Delivered(usize),
    /// Liveness check on a known channel; nothing forwarded.
    StatusCheck,
    /// Dropped; the reason has been logged.
    Rejected(String),
}

#[derive(Default)]
struct ChannelEntry {
    subscribers: Vec<Arc<dyn ChannelSubscriber>>,
    contributors: HashSet<ConnectionId>,
}

/// Registry of channels keyed by their fixed-width prefix.
pub struct ChannelRouter {
    width: usize,
    max_len: usize,
    next_ordinal: u64,
    channels: HashMap<String, ChannelEntry>,
}

/// Router shared between the tracker and its connections.
pub type SharedRouter = Arc<Mutex<ChannelRouter>>;

impl ChannelRouter {
    #[must_use]
    pub fn new(width: usize, max_len: usize) -> Self {
        Self {
            width,
            max_len,
            next_ordinal: 0,
            channels: HashMap::new(),
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedRouter {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Allocate the next prefix. Prefixes are never reused.
    pub fn create_channel(&mut self) -> Result<String> {
        let prefix = format_prefix(self.next_ordinal, self.width)
            .map_err(|e| TrackerError::Router(e.to_string()))?;
        self.next_ordinal += 1;
        self.channels.insert(prefix.clone(), ChannelEntry::default());
        info!("Channel {prefix} created");
        Ok(prefix)
    }

    pub fn subscribe(&mut self, prefix: &str, subscriber: Arc<dyn ChannelSubscriber>) -> Result<()> {
        let entry = self
            .channels
            .get_mut(prefix)
            .ok_or_else(|| TrackerError::Router(format!("unknown channel {prefix}")))?;
        entry.subscribers.push(subscriber);
        Ok(())
    }

    #[must_use]
    pub fn has_channel(&self, prefix: &str) -> bool {
        self.channels.contains_key(prefix)
    }

    /// Deliver `raw` to the channel named by its prefix.
    pub fn route(&mut self, connection: ConnectionId, raw: &str) -> RouteOutcome {
        if let Err(e) = check_len(raw, self.max_len) {
            warn!("Rejected message from {connection}: {e}");
            return RouteOutcome::Rejected(e.to_string());
        }
        let Some((prefix, payload)) = split_prefix(raw, self.width) else {
            warn!("Rejected message from {connection}: missing channel prefix");
            return RouteOutcome::Rejected("missing channel prefix".to_string());
        };
        let Some(entry) = self.channels.get_mut(prefix) else {
            warn!("Rejected message from {connection}: unknown channel {prefix}");
            return RouteOutcome::Rejected(format!("unknown channel {prefix}"));
        };
        if payload == STATUS_CHECK {
            debug!("Status check on {prefix} from {connection}");
            return RouteOutcome::StatusCheck;
        }

        entry.contributors.insert(connection);
        let event = ChannelEvent::Message {
            connection,
            payload: payload.to_string(),
        };
        entry.subscribers.retain(|s| s.deliver(event.clone()));
        RouteOutcome::Delivered(entry.subscribers.len())
    }

    /// Tell every channel `connection` delivered to that it is gone.
    pub fn disconnect(&mut self, connection: ConnectionId) -> usize {
        let mut notified = 0;
        for (prefix, entry) in &mut self.channels {
            if entry.contributors.remove(&connection) {
                debug!("{connection} gone from channel {prefix}");
                entry
                    .subscribers
                    .retain(|s| s.deliver(ChannelEvent::ClientGone(connection)));
                notified += 1;
            }
        }
        notified
    }

    /// Remove the channel and signal end to its subscribers.
    pub fn close_channel(&mut self, prefix: &str) -> bool {
        let Some(entry) = self.channels.remove(prefix) else {
            return false;
        };
        for subscriber in &entry.subscribers {
            subscriber.deliver(ChannelEvent::End);
        }
        info!("Channel {prefix} closed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn router_with_channel() -> (ChannelRouter, String, mpsc::UnboundedReceiver<ChannelEvent>) {
        let mut router = ChannelRouter::new(4, 64);
        let prefix = router.create_channel().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        router.subscribe(&prefix, Arc::new(tx)).unwrap();
        (router, prefix, rx)
    }

    #[test]
    fn prefixes_increase_from_zero() {
        let mut router = ChannelRouter::new(4, 64);
        assert_eq!(router.create_channel().unwrap(), "0000");
        assert_eq!(router.create_channel().unwrap(), "0001");
        router.close_channel("0000");
        assert_eq!(router.create_channel().unwrap(), "0002");
    }

    #[test]
    fn capacity_is_bounded_by_width() {
        let mut router = ChannelRouter::new(1, 64);
        for _ in 0..10 {
            router.create_channel().unwrap();
        }
        assert!(router.create_channel().is_err());
    }

    #[test]
    fn routes_in_order_with_sender() {
        let (mut router, prefix, mut rx) = router_with_channel();
        let conn = ConnectionId(7);
        assert_eq!(router.route(conn, &format!("{prefix}a")), RouteOutcome::Delivered(1));
        assert_eq!(router.route(conn, &format!("{prefix}b")), RouteOutcome::Delivered(1));
        for expected in ["a", "b"] {
            assert_eq!(
                rx.try_recv().unwrap(),
                ChannelEvent::Message {
                    connection: conn,
                    payload: expected.to_string()
                }
            );
        }
    }

    #[test]
    fn rejects_unknown_short_and_long() {
        let (mut router, _, mut rx) = router_with_channel();
        let conn = ConnectionId(1);
        assert!(matches!(router.route(conn, "0009{}"), RouteOutcome::Rejected(_)));
        assert!(matches!(router.route(conn, "00"), RouteOutcome::Rejected(_)));
        let long = format!("0000{}", "x".repeat(61));
        assert!(matches!(router.route(conn, &long), RouteOutcome::Rejected(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn status_check_is_not_forwarded() {
        let (mut router, prefix, mut rx) = router_with_channel();
        let conn = ConnectionId(3);
        assert_eq!(
            router.route(conn, &format!("{prefix}{STATUS_CHECK}")),
            RouteOutcome::StatusCheck
        );
        assert!(rx.try_recv().is_err());
        // A status check alone does not make the connection a contributor.
        assert_eq!(router.disconnect(conn), 0);
    }

    #[test]
    fn disconnect_notifies_only_contributed_channels() {
        let (mut router, prefix, mut rx) = router_with_channel();
        let quiet = ConnectionId(1);
        let talker = ConnectionId(2);
        router.route(talker, &format!("{prefix}hi"));
        let _ = rx.try_recv();

        assert_eq!(router.disconnect(quiet), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(router.disconnect(talker), 1);
        assert_eq!(rx.try_recv().unwrap(), ChannelEvent::ClientGone(talker));
    }

    #[test]
    fn close_signals_end() {
        let (mut router, prefix, mut rx) = router_with_channel();
        assert!(router.close_channel(&prefix));
        assert_eq!(rx.try_recv().unwrap(), ChannelEvent::End);
        assert!(!router.has_channel(&prefix));
        assert!(!router.close_channel(&prefix));
    }
}
