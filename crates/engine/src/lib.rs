//! # Geotrail Engine
//!
//! Streaming ingestion of location pings into incrementally written SVG tracks.
//!
//! ## Architecture
//!
//! ```text
//! Connection ──► ChannelRouter ──► IngestQueue ──► ActiveTargets ──► flush scheduler
//!   (per socket)   (prefix demux)    (paused until      (buffer per       (throttled, one
//!                                     store + fs ready)   target)          cycle in flight)
//!                                                                             │
//!                                          ┌──────────────────────────────────┤
//!                                          ▼                                  ▼
//!                                   SvgFile per target               PersistenceBatcher
//!                                   _active.svg ─► <millis>.svg      locations + pathref
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use geotrail_engine::{Tracker, TrackerConfig};
//! use geotrail_store::SqliteStore;
//! use std::sync::Arc;
//!
//! # async fn demo() -> geotrail_engine::Result<()> {
//! let store = Arc::new(SqliteStore::open("geotrail.db"));
//! let tracker = Tracker::start(TrackerConfig::default(), store)?;
//! tracker.when_ready().await?;
//!
//! let conn = tracker.open_connection();
//! let frame = format!(
//!     "{}{}",
//!     tracker.location_prefix(),
//!     r#"{"targetId":"a1","location":{"coordinates":[-122.4,37.7],"time":"2016-03-01T10:00:00Z"}}"#
//! );
//! conn.on_message(&frame);
//! conn.close();
//!
//! tracker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod active;
mod config;
mod connection;
mod error;
mod flush;
mod persist;
mod queue;
mod readiness;
mod router;
mod scheduler;
mod service;
mod writer;

pub use active::{ActiveStream, ActiveTargets, TargetStatus};
pub use config::{TrackerConfig, ACTIVE_FILENAME, ARCHIVE_EXTENSION};
pub use connection::Connection;
pub use error::{Result, TrackerError};
pub use flush::{Finalized, FlushReport};
pub use persist::{PersistenceBatcher, TargetAnchors};
pub use readiness::{Dependency, Readiness, ReadinessGate};
pub use router::{
    ChannelEvent, ChannelRouter, ChannelSubscriber, ConnectionId, RouteOutcome, SharedRouter,
};
pub use service::Tracker;
pub use writer::{viewbox_offset, FileState, SvgFile, VIEWBOX_WIDTH};
