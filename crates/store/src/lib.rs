//! # Geotrail Store
//!
//! Persistence for anchors and path references.
//!
//! ```text
//! locations (id, time, coordinates POINTZ, heading, speed, accuracy)
//!      ▲
//!      │ ids
//! pathref   (id, filename, target, locations [ids], line_style)   index svg_path(target, filename)
//! ```
//!
//! [`SqliteStore`] is the production backend; [`InMemoryStore`] backs tests and can be told
//! to fail individual operations.

mod error;
mod memory;
mod sqlite;
mod store;
mod types;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use store::PathStore;
pub use types::{parse_pointz, pointz, LocationId, LocationRow, PathRef, PathRefRow};
