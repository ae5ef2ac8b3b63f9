//! SQLite-backed [`PathStore`].
//!
//! A single connection behind a mutex; every call runs on the blocking pool. Row ids come
//! from `AUTOINCREMENT`, so concurrent batches can never collide on a key.

use crate::{LocationId, LocationRow, PathRef, PathRefRow, PathStore, Result, StoreError};
use async_trait::async_trait;
use geotrail_geometry::LineStyle;
use log::{debug, info};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Where the database lives.
#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

pub struct SqliteStore {
    target: Target,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Store backed by the database file at `path`. Nothing is opened until
    /// [`PathStore::connect`].
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Private in-memory database, mostly for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::File(path) => Some(path),
            Target::Memory => None,
        }
    }

    /// Read back one persisted location.
    pub async fn location(&self, id: LocationId) -> Result<Option<LocationRow>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT time, coordinates, heading, speed, accuracy FROM locations WHERE id = ?1",
            )?;
            let mut rows = stmt.query_map(params![id.0], |row| {
                Ok(LocationRow {
                    time: row.get(0)?,
                    coordinates: row.get(1)?,
                    heading: row.get(2)?,
                    speed: row.get(3)?,
                    accuracy: row.get(4)?,
                })
            })?;
            let found = rows.next().transpose()?;
            Ok(found)
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Other("connection lock poisoned".to_string()))?;
            let conn = guard.as_mut().ok_or(StoreError::NotConnected)?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Other(format!("store task failed: {e}")))?
    }

    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }
}

#[async_trait]
impl PathStore for SqliteStore {
    async fn connect(&self) -> Result<()> {
        let target = self.target.clone();
        let slot = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = match &target {
                Target::File(path) => {
                    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                        std::fs::create_dir_all(parent)?;
                    }
                    Connection::open(path)?
                }
                Target::Memory => Connection::open_in_memory()?,
            };
            Self::apply_schema(&conn)?;
            let mut guard = slot
                .lock()
                .map_err(|_| StoreError::Other("connection lock poisoned".to_string()))?;
            *guard = Some(conn);
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Other(format!("store task failed: {e}")))??;

        match self.path() {
            Some(path) => info!("Store ready at {}", path.display()),
            None => info!("Store ready (in-memory)"),
        }
        Ok(())
    }

    async fn insert_locations(&self, rows: &[LocationRow]) -> Result<Vec<LocationId>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let rows = rows.to_vec();
        let ids = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let mut ids = Vec::with_capacity(rows.len());
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO locations (time, coordinates, heading, speed, accuracy)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            row.time,
                            row.coordinates,
                            row.heading,
                            row.speed,
                            row.accuracy
                        ])?;
                        ids.push(LocationId(tx.last_insert_rowid()));
                    }
                }
                tx.commit()?;
                Ok(ids)
            })
            .await?;
        debug!("Inserted {} locations", ids.len());
        Ok(ids)
    }

    async fn insert_path_refs(&self, rows: &[PathRefRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let encoded = rows
            .iter()
            .map(|row| -> Result<(PathRefRow, String)> {
                let ids: Vec<i64> = row.locations.iter().map(|id| id.0).collect();
                Ok((row.clone(), serde_json::to_string(&ids)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let count = encoded.len();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO pathref (filename, target, locations, line_style)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (row, locations) in &encoded {
                    stmt.execute(params![
                        row.filename,
                        row.target,
                        locations,
                        row.line_style.as_str()
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?;
        debug!("Inserted {count} path refs");
        Ok(())
    }

    async fn update_filename(&self, old: &str, target: &str, new: &str) -> Result<u64> {
        let (old, target, new) = (old.to_string(), target.to_string(), new.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE pathref SET filename = ?1 WHERE target = ?2 AND filename = ?3",
                params![new, target, old],
            )?;
            Ok(changed as u64)
        })
        .await
    }

    async fn path_refs_for_target(&self, target: &str) -> Result<Vec<PathRef>> {
        let target = target.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, filename, target, locations, line_style
                 FROM pathref WHERE target = ?1 ORDER BY id",
            )?;
            let raw = stmt
                .query_map(params![target], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            raw.into_iter()
                .map(|(id, filename, target, locations, style)| -> Result<PathRef> {
                    let ids: Vec<i64> = serde_json::from_str(&locations)?;
                    let line_style = LineStyle::parse(&style)
                        .ok_or_else(|| StoreError::Corrupt(format!("unknown line style {style:?}")))?;
                    Ok(PathRef {
                        id,
                        row: PathRefRow {
                            filename,
                            target,
                            locations: ids.into_iter().map(LocationId).collect(),
                            line_style,
                        },
                    })
                })
                .collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointz;
    use pretty_assertions::assert_eq;

    fn row(lon: f64, lat: f64) -> LocationRow {
        LocationRow {
            time: "2016-03-01T10:00:00+00:00".to_string(),
            coordinates: pointz(lon, lat, -999.0),
            heading: None,
            speed: Some(1.5),
            accuracy: None,
        }
    }

    #[tokio::test]
    async fn calls_before_connect_fail() {
        let store = SqliteStore::in_memory();
        assert!(matches!(
            store.insert_locations(&[row(1.0, 2.0)]).await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn ids_are_sequential_and_unique() {
        let store = SqliteStore::in_memory();
        store.connect().await.unwrap();
        let first = store
            .insert_locations(&[row(1.0, 2.0), row(3.0, 4.0)])
            .await
            .unwrap();
        let second = store.insert_locations(&[row(5.0, 6.0)]).await.unwrap();
        assert_eq!(first, vec![LocationId(1), LocationId(2)]);
        assert_eq!(second, vec![LocationId(3)]);

        let stored = store.location(LocationId(2)).await.unwrap().unwrap();
        assert_eq!(stored, row(3.0, 4.0));
        assert_eq!(store.location(LocationId(99)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_only_touches_matching_filename() {
        let store = SqliteStore::in_memory();
        store.connect().await.unwrap();
        let refs = [
            PathRefRow {
                filename: "_active.svg".to_string(),
                target: "a".to_string(),
                locations: vec![LocationId(1), LocationId(2)],
                line_style: LineStyle::Raw,
            },
            PathRefRow {
                filename: "1457000000000.svg".to_string(),
                target: "a".to_string(),
                locations: vec![LocationId(3)],
                line_style: LineStyle::Simplified,
            },
            PathRefRow {
                filename: "_active.svg".to_string(),
                target: "b".to_string(),
                locations: vec![],
                line_style: LineStyle::CumulativeAngle,
            },
        ];
        store.insert_path_refs(&refs).await.unwrap();

        let changed = store
            .update_filename("_active.svg", "a", "1457000099999.svg")
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let a = store.path_refs_for_target("a").await.unwrap();
        let names: Vec<&str> = a.iter().map(|r| r.row.filename.as_str()).collect();
        assert_eq!(names, vec!["1457000099999.svg", "1457000000000.svg"]);
        assert_eq!(a[0].row.locations, vec![LocationId(1), LocationId(2)]);

        let b = store.path_refs_for_target("b").await.unwrap();
        assert_eq!(b[0].row.filename, "_active.svg");
    }
}
