//! Incremental SVG file writer.
//!
//! ```text
//! OPENING ──open──► ACTIVE ──finalize──► FINALIZING ──rename──► ARCHIVED
//!    │                │                       │
//!    └────────────────┴───────── io error ────┴──────────────► FAILED
//! ```
//!
//! The header is written lazily on the first flush with a fixed-width viewbox so the true
//! bounds can be patched in place at finalization without moving any other byte.

use crate::config::{ACTIVE_FILENAME, ARCHIVE_EXTENSION};
use geotrail_geometry::{padded_viewbox, Bounds};
use log::{debug, info, warn};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Column width reserved for the viewbox value.
pub const VIEWBOX_WIDTH: usize = 64;

/// Everything before the viewbox value. Its length is the patch offset.
const HEADER_PREFIX: &str = "<svg version=\"1.1\" baseProfile=\"full\" viewBox=\"";
const HEADER_SUFFIX: &str =
    "\" width=\"100%\" height=\"100%\" xmlns=\"http://www.w3.org/2000/svg\">\n";
const CLOSING_TAG: &str = "</svg>\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Opening,
    Active,
    Finalizing,
    Archived,
    Failed,
}

/// Byte offset of the viewbox value inside every header.
#[must_use]
pub const fn viewbox_offset() -> u64 {
    HEADER_PREFIX.len() as u64
}

/// A target's live output file.
#[derive(Debug)]
pub struct SvgFile {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    state: FileState,
    precision: usize,
    written_viewbox: Option<String>,
}

impl SvgFile {
    /// Ensure `dir` exists and create (or truncate) the active file inside it.
    pub async fn open(dir: &Path, precision: usize) -> std::io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(ACTIVE_FILENAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        let size = file.metadata().await?.len();
        debug!("Opened {}", path.display());
        Ok(Self {
            path,
            file: Some(file),
            size,
            state: FileState::Active,
            precision,
            written_viewbox: None,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn state(&self) -> FileState {
        self.state
    }

    #[must_use]
    pub const fn has_header(&self) -> bool {
        self.written_viewbox.is_some()
    }

    /// Write the header with `bounds` as the placeholder viewbox. Only the first call writes.
    pub async fn write_header(&mut self, bounds: &Bounds) -> std::io::Result<()> {
        if self.has_header() {
            return Ok(());
        }
        let viewbox = self.render_viewbox(bounds)?;
        let header = format!("{HEADER_PREFIX}{viewbox}{HEADER_SUFFIX}");
        self.append_raw(header.as_bytes()).await?;
        self.written_viewbox = Some(viewbox);
        Ok(())
    }

    /// Append path elements at the current end of file.
    pub async fn append(&mut self, fragment: &str) -> std::io::Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        self.append_raw(fragment.as_bytes()).await
    }

    /// Close the document, patch the viewbox if `bounds` moved since the header was written,
    /// and rename to `<archive_millis>.svg`. Returns the archived filename.
    pub async fn finalize(
        &mut self,
        bounds: Option<&Bounds>,
        archive_millis: i64,
    ) -> std::io::Result<String> {
        let bounds = bounds.copied().unwrap_or(Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        });
        if !self.has_header() {
            self.write_header(&bounds).await?;
        }
        self.state = FileState::Finalizing;
        let result = self.close_and_archive(&bounds, archive_millis).await;
        if result.is_err() {
            self.state = FileState::Failed;
        }
        result
    }

    /// Mark the file failed and release the descriptor.
    pub fn fail(&mut self) {
        self.state = FileState::Failed;
        self.file = None;
    }

    async fn close_and_archive(
        &mut self,
        bounds: &Bounds,
        archive_millis: i64,
    ) -> std::io::Result<String> {
        self.append_raw(CLOSING_TAG.as_bytes()).await?;

        let final_viewbox = self.render_viewbox(bounds)?;
        if self.written_viewbox.as_deref() != Some(final_viewbox.as_str()) {
            let file = self.file_mut()?;
            file.seek(SeekFrom::Start(viewbox_offset())).await?;
            file.write_all(final_viewbox.as_bytes()).await?;
            file.flush().await?;
            debug!("Patched viewbox of {}", self.path.display());
            self.written_viewbox = Some(final_viewbox);
        }

        let mut file = self
            .file
            .take()
            .ok_or_else(|| std::io::Error::other("file already closed"))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let mut millis = archive_millis;
        let mut filename = format!("{millis}.{ARCHIVE_EXTENSION}");
        let mut archived = self.path.with_file_name(&filename);
        while fs::try_exists(&archived).await? {
            warn!("{} already exists; trying the next millisecond", archived.display());
            millis += 1;
            filename = format!("{millis}.{ARCHIVE_EXTENSION}");
            archived = self.path.with_file_name(&filename);
        }
        fs::rename(&self.path, &archived).await?;
        info!("Archived {} as {}", self.path.display(), archived.display());
        self.path = archived;
        self.state = FileState::Archived;
        Ok(filename)
    }

    async fn append_raw(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let offset = self.size;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    fn file_mut(&mut self) -> std::io::Result<&mut File> {
        if self.state == FileState::Failed {
            return Err(std::io::Error::other("file is in failed state"));
        }
        self.file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("file is not open"))
    }

    fn render_viewbox(&self, bounds: &Bounds) -> std::io::Result<String> {
        padded_viewbox(bounds, self.precision, VIEWBOX_WIDTH).ok_or_else(|| {
            warn!("Viewbox for {} exceeds {VIEWBOX_WIDTH} columns", self.path.display());
            std::io::Error::other("viewbox does not fit its placeholder")
        })
    }
}
