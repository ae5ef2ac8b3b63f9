//! In-process [`PathStore`] with failure injection.

use crate::{LocationId, LocationRow, PathRef, PathRefRow, PathStore, Result, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct State {
    connected: bool,
    next_location: i64,
    next_path_ref: i64,
    locations: BTreeMap<LocationId, LocationRow>,
    path_refs: Vec<PathRef>,
    connect_delay: Option<Duration>,
}

/// Keeps everything in memory. Each operation can be made to fail on demand.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    fail_connect: AtomicBool,
    fail_locations: AtomicBool,
    fail_path_refs: AtomicBool,
    fail_updates: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, on: bool) {
        self.fail_connect.store(on, Ordering::SeqCst);
    }

    pub fn fail_location_inserts(&self, on: bool) {
        self.fail_locations.store(on, Ordering::SeqCst);
    }

    pub fn fail_path_ref_inserts(&self, on: bool) {
        self.fail_path_refs.store(on, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, on: bool) {
        self.fail_updates.store(on, Ordering::SeqCst);
    }

    /// Delay `connect` so callers can observe the not-ready window.
    pub fn set_connect_delay(&self, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.connect_delay = Some(delay);
        }
    }

    /// Snapshot of every stored location.
    #[must_use]
    pub fn locations(&self) -> BTreeMap<LocationId, LocationRow> {
        self.state
            .lock()
            .map(|s| s.locations.clone())
            .unwrap_or_default()
    }

    /// Snapshot of every stored path reference.
    #[must_use]
    pub fn path_refs(&self) -> Vec<PathRef> {
        self.state
            .lock()
            .map(|s| s.path_refs.clone())
            .unwrap_or_default()
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected {what} failure")));
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Other("state lock poisoned".to_string()))?;
        if !state.connected {
            return Err(StoreError::NotConnected);
        }
        f(&mut state)
    }
}

#[async_trait]
impl PathStore for InMemoryStore {
    async fn connect(&self) -> Result<()> {
        let delay = self
            .state
            .lock()
            .map_err(|_| StoreError::Other("state lock poisoned".to_string()))?
            .connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::injected(&self.fail_connect, "connect")?;
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Other("state lock poisoned".to_string()))?;
        state.connected = true;
        Ok(())
    }

    async fn insert_locations(&self, rows: &[LocationRow]) -> Result<Vec<LocationId>> {
        Self::injected(&self.fail_locations, "location insert")?;
        self.with_state(|state| {
            let ids = rows
                .iter()
                .map(|row| {
                    state.next_location += 1;
                    let id = LocationId(state.next_location);
                    state.locations.insert(id, row.clone());
                    id
                })
                .collect();
            Ok(ids)
        })
    }

    async fn insert_path_refs(&self, rows: &[PathRefRow]) -> Result<()> {
        Self::injected(&self.fail_path_refs, "path ref insert")?;
        self.with_state(|state| {
            for row in rows {
                state.next_path_ref += 1;
                state.path_refs.push(PathRef {
                    id: state.next_path_ref,
                    row: row.clone(),
                });
            }
            Ok(())
        })
    }

    async fn update_filename(&self, old: &str, target: &str, new: &str) -> Result<u64> {
        Self::injected(&self.fail_updates, "filename update")?;
        self.with_state(|state| {
            let mut changed = 0;
            for r in &mut state.path_refs {
                if r.row.target == target && r.row.filename == old {
                    r.row.filename = new.to_string();
                    changed += 1;
                }
            }
            Ok(changed)
        })
    }

    async fn path_refs_for_target(&self, target: &str) -> Result<Vec<PathRef>> {
        self.with_state(|state| {
            Ok(state
                .path_refs
                .iter()
                .filter(|r| r.row.target == target)
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointz;
    use geotrail_geometry::LineStyle;

    fn row() -> LocationRow {
        LocationRow {
            time: "2016-03-01T10:00:00+00:00".to_string(),
            coordinates: pointz(1.0, 2.0, -999.0),
            heading: None,
            speed: None,
            accuracy: None,
        }
    }

    #[tokio::test]
    async fn injected_failures_surface() {
        let store = InMemoryStore::new();
        store.fail_connect(true);
        assert!(store.connect().await.is_err());
        store.fail_connect(false);
        store.connect().await.unwrap();

        store.fail_location_inserts(true);
        assert!(matches!(
            store.insert_locations(&[row()]).await,
            Err(StoreError::Unavailable(_))
        ));
        store.fail_location_inserts(false);
        let ids = store.insert_locations(&[row(), row()]).await.unwrap();
        assert_eq!(ids, vec![LocationId(1), LocationId(2)]);

        store.fail_path_ref_inserts(true);
        let pr = PathRefRow {
            filename: "_active.svg".to_string(),
            target: "t".to_string(),
            locations: ids,
            line_style: LineStyle::Raw,
        };
        assert!(store.insert_path_refs(&[pr.clone()]).await.is_err());
        store.fail_path_ref_inserts(false);
        store.insert_path_refs(&[pr]).await.unwrap();
        assert_eq!(store.path_refs().len(), 1);
    }

    #[tokio::test]
    async fn requires_connect() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.path_refs_for_target("t").await,
            Err(StoreError::NotConnected)
        ));
    }
}
