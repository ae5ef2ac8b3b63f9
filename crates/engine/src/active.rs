use crate::router::ConnectionId;
use crate::writer::{FileState, SvgFile};
use chrono::{DateTime, Utc};
use geotrail_geometry::Bounds;
use geotrail_protocol::Location;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-target buffering and file state.
#[derive(Debug)]
pub struct ActiveStream {
    /// Points received since the last flush, oldest first.
    pub(crate) buffer: Vec<Location>,
    /// `None` while the file is still being opened.
    pub(crate) file: Option<SvgFile>,
    /// Bounds of everything drawn so far, across flushes.
    pub(crate) bounds: Option<Bounds>,
    /// Last point of the previous flush; prefixes the next run.
    pub(crate) last_anchor: Option<Location>,
    /// Receipt time of the latest message.
    pub(crate) last_seen: DateTime<Utc>,
    /// Connections that delivered points for this target.
    pub(crate) contributors: HashSet<ConnectionId>,
}

impl ActiveStream {
    fn new(first: Location, connection: ConnectionId, seen: DateTime<Utc>) -> Self {
        Self {
            buffer: vec![first],
            file: None,
            bounds: None,
            last_anchor: None,
            last_seen: seen,
            contributors: HashSet::from([connection]),
        }
    }

    #[must_use]
    pub fn file_state(&self) -> FileState {
        self.file.as_ref().map_or(FileState::Opening, SvgFile::state)
    }
}

/// Snapshot of one live target, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStatus {
    pub target: String,
    pub buffered: usize,
    pub file_size: u64,
    pub last_seen: DateTime<Utc>,
    pub contributors: usize,
}

/// All live targets, iterated in id order.
#[derive(Debug, Default)]
pub struct ActiveTargets {
    streams: BTreeMap<String, ActiveStream>,
}

pub(crate) type SharedTargets = Arc<Mutex<ActiveTargets>>;

impl ActiveTargets {
    /// Buffer `location` for `target`. Returns `true` when this created the target.
    pub(crate) fn append(
        &mut self,
        target: &str,
        location: Location,
        connection: ConnectionId,
        seen: DateTime<Utc>,
    ) -> bool {
        if let Some(stream) = self.streams.get_mut(target) {
            stream.buffer.push(location);
            stream.contributors.insert(connection);
            stream.last_seen = seen;
            return false;
        }
        self.streams.insert(
            target.to_string(),
            ActiveStream::new(location, connection, seen),
        );
        true
    }

    /// Hand a freshly opened file to its stream. Gives the file back if the target is gone.
    pub(crate) fn attach_file(&mut self, target: &str, file: SvgFile) -> Option<SvgFile> {
        match self.streams.get_mut(target) {
            Some(stream) if stream.file.is_none() => {
                stream.file = Some(file);
                None
            }
            _ => Some(file),
        }
    }

    /// Drop `connection` from every target. Returns targets left without contributors.
    pub(crate) fn release_connection(&mut self, connection: ConnectionId) -> Vec<String> {
        let mut orphaned = Vec::new();
        for (id, stream) in &mut self.streams {
            if stream.contributors.remove(&connection) && stream.contributors.is_empty() {
                orphaned.push(id.clone());
            }
        }
        orphaned
    }

    pub(crate) fn get_mut(&mut self, target: &str) -> Option<&mut ActiveStream> {
        self.streams.get_mut(target)
    }

    pub(crate) fn remove(&mut self, target: &str) -> Option<ActiveStream> {
        self.streams.remove(target)
    }

    #[must_use]
    pub fn contains(&self, target: &str) -> bool {
        self.streams.contains_key(target)
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[must_use]
    pub fn status(&self) -> Vec<TargetStatus> {
        self.streams
            .iter()
            .map(|(id, stream)| TargetStatus {
                target: id.clone(),
                buffered: stream.buffer.len(),
                file_size: stream.file.as_ref().map_or(0, SvgFile::size),
                last_seen: stream.last_seen,
                contributors: stream.contributors.len(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use geotrail_protocol::Coordinates;
    use pretty_assertions::assert_eq;

    fn loc(lon: f64) -> Location {
        let time = Utc.with_ymd_and_hms(2016, 3, 1, 10, 0, 0).single().unwrap();
        Location::new(Coordinates::new(lon, 37.0), time)
    }

    #[test]
    fn first_message_creates_entry_synchronously() {
        let mut targets = ActiveTargets::default();
        let now = Utc::now();
        assert!(targets.append("a", loc(1.0), ConnectionId(1), now));
        assert!(!targets.append("a", loc(2.0), ConnectionId(1), now));
        let stream = targets.get_mut("a").unwrap();
        assert_eq!(stream.buffer.len(), 2);
        assert_eq!(stream.file_state(), FileState::Opening);
    }

    #[test]
    fn release_reports_only_orphaned_targets() {
        let mut targets = ActiveTargets::default();
        let now = Utc::now();
        targets.append("shared", loc(1.0), ConnectionId(1), now);
        targets.append("shared", loc(2.0), ConnectionId(2), now);
        targets.append("solo", loc(3.0), ConnectionId(1), now);
        targets.append("other", loc(4.0), ConnectionId(3), now);

        assert_eq!(targets.release_connection(ConnectionId(1)), vec!["solo".to_string()]);
        assert_eq!(targets.release_connection(ConnectionId(2)), vec!["shared".to_string()]);
        assert_eq!(targets.release_connection(ConnectionId(9)), Vec::<String>::new());
        assert_eq!(targets.ids(), vec!["other", "shared", "solo"]);
    }
}
