use crate::{LocationId, LocationRow, PathRef, PathRefRow, Result};
use async_trait::async_trait;

/// Relational store for anchors and path references.
///
/// Implementations must hand out collision-free location ids: the engine issues inserts from
/// a single worker but never retries a failed batch.
#[async_trait]
pub trait PathStore: Send + Sync {
    /// Open the store and make sure the schema exists.
    async fn connect(&self) -> Result<()>;

    /// Insert all rows as one batch. Returns one id per row, in row order.
    async fn insert_locations(&self, rows: &[LocationRow]) -> Result<Vec<LocationId>>;

    /// Insert all path references as one batch.
    async fn insert_path_refs(&self, rows: &[PathRefRow]) -> Result<()>;

    /// Point every path reference of `target` whose filename is `old` at `new`.
    /// Returns the number of rows changed.
    async fn update_filename(&self, old: &str, target: &str, new: &str) -> Result<u64>;

    /// Every path reference recorded for `target`, oldest first.
    async fn path_refs_for_target(&self, target: &str) -> Result<Vec<PathRef>>;
}
