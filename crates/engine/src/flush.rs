//! One flush cycle and disconnect-driven finalization.

use crate::active::{ActiveStream, SharedTargets};
use crate::persist::{PersistenceBatcher, TargetAnchors};
use crate::{TrackerConfig, TrackerError};
use geotrail_geometry::{Bounds, Point};
use geotrail_protocol::Location;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Summary of one flush cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Targets drawn this cycle.
    pub targets: usize,
    /// Buffered points consumed.
    pub points: usize,
    /// Anchors handed to persistence, all styles.
    pub anchors: usize,
    pub bytes_written: u64,
    /// Path references written to the store.
    pub path_refs: usize,
    /// Targets whose file failed during this cycle.
    pub failed_targets: Vec<String>,
    pub persistence_error: Option<String>,
}

/// Outcome of finalizing one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finalized {
    pub target: String,
    pub archived_as: Option<String>,
}

/// Shared state a flush needs.
#[derive(Clone)]
pub(crate) struct FlushContext {
    pub(crate) config: Arc<TrackerConfig>,
    pub(crate) targets: SharedTargets,
    pub(crate) batcher: PersistenceBatcher,
}

impl FlushContext {
    /// Draw every buffered target (or only `only`), then persist the cycle's anchors.
    pub(crate) async fn flush_cycle(&self, only: Option<&HashSet<String>>) -> FlushReport {
        let mut report = FlushReport::default();
        let mut batch: Vec<TargetAnchors> = Vec::new();

        {
            let mut targets = self.targets.lock().await;
            for id in targets.ids() {
                if only.is_some_and(|set| !set.contains(&id)) {
                    continue;
                }
                let Some(stream) = targets.get_mut(&id) else {
                    continue;
                };
                if stream.buffer.is_empty() || stream.file.is_none() {
                    continue;
                }
                let points = stream.buffer.len();
                let before = stream.file.as_ref().map_or(0, |f| f.size());
                match draw(&id, stream, &self.config).await {
                    Ok(anchors) => {
                        report.targets += 1;
                        report.points += points;
                        report.anchors += anchors.iter().map(|a| a.anchors.len()).sum::<usize>();
                        report.bytes_written +=
                            stream.file.as_ref().map_or(0, |f| f.size()) - before;
                        batch.extend(anchors);
                    }
                    Err(e) => {
                        error!("Halting {id}: {e}");
                        if let Some(file) = stream.file.as_mut() {
                            file.fail();
                        }
                        targets.remove(&id);
                        report.failed_targets.push(id);
                    }
                }
            }
        }

        if !batch.is_empty() {
            match self.batcher.insert_anchors(&batch).await {
                Ok(refs) => report.path_refs = refs.len(),
                Err(e) => {
                    error!("Persistence failed for {} anchors: {e}", report.anchors);
                    report.persistence_error = Some(e.to_string());
                }
            }
        }

        if report.targets > 0 || !report.failed_targets.is_empty() {
            info!(
                "Flush: {} target(s), {} point(s), {} anchor(s), {} byte(s), {} path ref(s)",
                report.targets, report.points, report.anchors, report.bytes_written, report.path_refs
            );
        }
        report
    }

    /// Flush the remaining points of `targets`, close and archive their files, and redirect
    /// their path references to the archived names.
    pub(crate) async fn finalize(&self, targets: &[String]) -> Vec<Finalized> {
        let only: HashSet<String> = targets.iter().cloned().collect();
        self.flush_cycle(Some(&only)).await;

        let mut archived = Vec::new();
        {
            let mut live = self.targets.lock().await;
            for target in targets {
                let Some(stream) = live.get_mut(target) else {
                    continue;
                };
                if !stream.contributors.is_empty() {
                    warn!("{target} regained a connection; not finalizing");
                    continue;
                }
                let name = archive(target, stream).await;
                live.remove(target);
                archived.push(Finalized {
                    target: target.clone(),
                    archived_as: name,
                });
            }
        }

        for done in &archived {
            let Some(name) = &done.archived_as else {
                continue;
            };
            if let Err(e) = self.batcher.update_anchors_filename(&done.target, name).await {
                error!("Could not redirect path refs of {} to {name}: {e}", done.target);
            }
        }
        archived
    }

    /// Final flush, then finalize every live target regardless of connections.
    pub(crate) async fn finalize_all(&self) -> Vec<Finalized> {
        let ids = {
            let mut live = self.targets.lock().await;
            let ids = live.ids();
            for id in &ids {
                if let Some(stream) = live.get_mut(id) {
                    stream.contributors.clear();
                }
            }
            ids
        };
        self.finalize(&ids).await
    }
}

/// Reduce one target's buffer with every style and append the fragments.
async fn draw(
    target: &str,
    stream: &mut ActiveStream,
    config: &TrackerConfig,
) -> Result<Vec<TargetAnchors>, TrackerError> {
    let candidate = stream.buffer.last().cloned();
    let carried = usize::from(stream.last_anchor.is_some());
    let run: Vec<Location> = stream
        .last_anchor
        .iter()
        .chain(stream.buffer.iter())
        .cloned()
        .collect();
    let points: Vec<Point> = run.iter().map(|l| Point::new(l.lon(), l.lat())).collect();

    let mut fragments = Vec::with_capacity(config.line_styles.len());
    let mut anchors = Vec::with_capacity(config.line_styles.len());
    for style in &config.line_styles {
        let reduction = style.reduce(&points, &config.reduction);
        stream.bounds = Bounds::merge(stream.bounds, reduction.bounds);
        anchors.push(TargetAnchors {
            target: target.to_string(),
            style: *style,
            // The carried anchor was persisted by the flush that produced it.
            anchors: reduction
                .anchors
                .iter()
                .filter(|&&i| i >= carried)
                .map(|&i| run[i].clone())
                .collect(),
        });
        fragments.push(reduction.fragment);
    }

    let file = stream
        .file
        .as_mut()
        .ok_or_else(|| TrackerError::io(target, std::io::Error::other("no open file")))?;
    if !file.has_header() {
        if let Some(bounds) = stream.bounds {
            file.write_header(&bounds)
                .await
                .map_err(|e| TrackerError::io(target, e))?;
        }
    }
    for fragment in &fragments {
        file.append(fragment)
            .await
            .map_err(|e| TrackerError::io(target, e))?;
    }

    stream.buffer.clear();
    stream.last_anchor = candidate;
    Ok(anchors)
}

/// Close and rename one target's file. `None` if it failed or never opened.
async fn archive(target: &str, stream: &mut ActiveStream) -> Option<String> {
    let Some(file) = stream.file.as_mut() else {
        warn!("{target} has no open file to archive");
        return None;
    };
    let millis = stream.last_seen.timestamp_millis();
    match file.finalize(stream.bounds.as_ref(), millis).await {
        Ok(name) => Some(name),
        Err(e) => {
            error!("Archive failed for {target}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::ActiveTargets;
    use crate::router::ConnectionId;
    use crate::writer::SvgFile;
    use chrono::{TimeZone, Utc};
    use geotrail_protocol::Coordinates;
    use geotrail_store::{InMemoryStore, PathStore};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    fn loc(lon: f64, lat: f64) -> Location {
        let time = Utc.with_ymd_and_hms(2016, 3, 1, 10, 0, 0).single().unwrap();
        Location::new(Coordinates::new(lon, lat), time)
    }

    async fn context(tmp: &TempDir) -> FlushContext {
        let store = Arc::new(InMemoryStore::new());
        store.connect().await.unwrap();
        FlushContext {
            config: Arc::new(TrackerConfig {
                output_dir: tmp.path().to_path_buf(),
                ..TrackerConfig::default()
            }),
            targets: Arc::new(Mutex::new(ActiveTargets::default())),
            batcher: PersistenceBatcher::new(store),
        }
    }

    async fn add_target(ctx: &FlushContext, target: &str) {
        let file = SvgFile::open(&ctx.config.target_dir(target), 5).await.unwrap();
        let mut targets = ctx.targets.lock().await;
        let now = Utc::now();
        targets.append(target, loc(1.0, 1.0), ConnectionId(1), now);
        targets.append(target, loc(1.001, 1.002), ConnectionId(1), now);
        assert!(targets.attach_file(target, file).is_none());
    }

    #[tokio::test]
    async fn write_failure_halts_only_that_target() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp).await;
        add_target(&ctx, "broken").await;
        add_target(&ctx, "healthy").await;
        if let Some(stream) = ctx.targets.lock().await.get_mut("broken") {
            stream.file.as_mut().unwrap().fail();
        }

        let report = ctx.flush_cycle(None).await;
        assert_eq!(report.failed_targets, vec!["broken".to_string()]);
        assert_eq!(report.targets, 1);
        assert_eq!(report.path_refs, 3);
        assert_eq!(ctx.targets.lock().await.ids(), vec!["healthy".to_string()]);
    }

    #[tokio::test]
    async fn finalize_skips_targets_that_regained_a_connection() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp).await;
        add_target(&ctx, "busy").await;

        let done = ctx.finalize(&["busy".to_string()]).await;
        assert!(done.is_empty());
        assert!(ctx.targets.lock().await.contains("busy"));
    }
}
