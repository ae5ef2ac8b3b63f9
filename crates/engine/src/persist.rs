use crate::config::ACTIVE_FILENAME;
use crate::{Result, TrackerError};
use geotrail_geometry::LineStyle;
use geotrail_protocol::Location;
use geotrail_store::{pointz, LocationRow, PathRefRow, PathStore, StoreError};
use log::{debug, info};
use std::sync::Arc;

/// Anchors one flush kept for one (target, style).
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAnchors {
    pub target: String,
    pub style: LineStyle,
    pub anchors: Vec<Location>,
}

/// Turns flush anchors into store rows.
///
/// Location and path-reference inserts are two separate batches with no transaction
/// spanning them; a failure in between leaves locations without a path reference.
#[derive(Clone)]
pub struct PersistenceBatcher {
    store: Arc<dyn PathStore>,
}

impl PersistenceBatcher {
    #[must_use]
    pub fn new(store: Arc<dyn PathStore>) -> Self {
        Self { store }
    }

    /// Insert every anchor of one flush, then one path reference per (target, style)
    /// pointing at the active filename. Returns the rows written to `pathref`.
    pub async fn insert_anchors(&self, batch: &[TargetAnchors]) -> Result<Vec<PathRefRow>> {
        let rows: Vec<LocationRow> = batch
            .iter()
            .flat_map(|group| group.anchors.iter().map(location_row))
            .collect();
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.store.insert_locations(&rows).await?;
        if ids.len() != rows.len() {
            return Err(TrackerError::Persistence(StoreError::IdMismatch {
                inserted: rows.len(),
                ids: ids.len(),
            }));
        }

        let mut remaining = ids.as_slice();
        let refs: Vec<PathRefRow> = batch
            .iter()
            .map(|group| {
                let (mine, rest) = remaining.split_at(group.anchors.len());
                remaining = rest;
                PathRefRow {
                    filename: ACTIVE_FILENAME.to_string(),
                    target: group.target.clone(),
                    locations: mine.to_vec(),
                    line_style: group.style,
                }
            })
            .collect();
        self.store.insert_path_refs(&refs).await?;
        debug!(
            "Persisted {} anchors across {} path refs",
            rows.len(),
            refs.len()
        );
        Ok(refs)
    }

    /// Redirect `target`'s path references from the active file to `filename`.
    pub async fn update_anchors_filename(&self, target: &str, filename: &str) -> Result<u64> {
        let changed = self
            .store
            .update_filename(ACTIVE_FILENAME, target, filename)
            .await?;
        info!("Redirected {changed} path refs of {target} to {filename}");
        Ok(changed)
    }
}

fn location_row(location: &Location) -> LocationRow {
    let c = &location.coordinates;
    LocationRow {
        time: location.time.to_rfc3339(),
        coordinates: pointz(c.lon, c.lat, c.alt_or_sentinel()),
        heading: location.heading,
        speed: location.speed,
        accuracy: location.accuracy,
    }
}
