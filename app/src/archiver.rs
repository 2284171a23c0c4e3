/// archiver.rs — Write the loaded document into a sibling single-entry ZIP
/// and measure the result.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs::{self, Metadata},
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::info;

use crate::{config::Config, error::ZipperError, loader::SourceDocument, zip_utils::write_single_entry};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub extension:      String,
    pub compress_level: u32,
    pub chunk_bytes:    usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self { extension: "zip".to_string(), compress_level: 6, chunk_bytes: 64 * 1024 }
    }
}

impl ArchiveOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            extension:      cfg.archive_extension.clone(),
            compress_level: cfg.zip_compress_level,
            chunk_bytes:    cfg.write_chunk_bytes,
        }
    }
}

/// What the user is told after a successful archive.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub source_path:   PathBuf,
    pub archive_path:  PathBuf,
    pub entry_name:    String,
    pub original_size: u64,
    pub archive_size:  u64,
    pub reduction_pct: f64,
    pub created_at:    String,
}

impl ArchiveSummary {
    pub fn report(&self) -> String {
        format!(
            "Archive created: {}\nOriginal size: {} bytes\nArchive size: {} bytes\nSize reduction: {:.2}%",
            self.created_at, self.original_size, self.archive_size, self.reduction_pct,
        )
    }
}

/// `notes.txt` → `notes.zip`; an extension-less path gets one appended.
pub fn archive_path_for(source: &Path, extension: &str) -> PathBuf {
    source.with_extension(extension)
}

/// `(original − archive) / original × 100`, or 0 for an empty original.
pub fn reduction_percent(original: u64, archive: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - archive as f64) / original as f64 * 100.0
}

pub fn format_timestamp(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).format(TIMESTAMP_FORMAT).to_string()
}

// Birth time is unsupported on some filesystems.
fn creation_time(meta: &Metadata) -> io::Result<SystemTime> {
    meta.created().or_else(|_| meta.modified())
}

/// Archive `doc` next to its source file and stat both files.
pub fn write_archive(
    doc: &SourceDocument,
    opts: &ArchiveOptions,
    on_progress: impl FnMut(u8),
) -> Result<ArchiveSummary, ZipperError> {
    let dest = archive_path_for(&doc.path, &opts.extension);
    if dest == doc.path {
        return Err(ZipperError::write(
            &dest,
            io::Error::new(io::ErrorKind::InvalidInput, "archive path equals source path"),
        ));
    }

    // The source must still exist when the archive is requested.
    fs::metadata(&doc.path).map_err(|e| ZipperError::write(&doc.path, e))?;

    let entry_name = doc.file_name();
    write_single_entry(
        &dest,
        &entry_name,
        doc.text.as_bytes(),
        opts.compress_level,
        opts.chunk_bytes,
        on_progress,
    )
    .map_err(|e| ZipperError::write(&dest, e))?;

    let original_size = fs::metadata(&doc.path).map_err(|e| ZipperError::write(&doc.path, e))?.len();
    let archive_meta  = fs::metadata(&dest).map_err(|e| ZipperError::write(&dest, e))?;
    let created       = creation_time(&archive_meta).map_err(|e| ZipperError::write(&dest, e))?;

    let summary = ArchiveSummary {
        source_path:   doc.path.clone(),
        archive_path:  dest,
        entry_name,
        original_size,
        archive_size:  archive_meta.len(),
        reduction_pct: reduction_percent(original_size, archive_meta.len()),
        created_at:    format_timestamp(created),
    };
    info!(
        "🗜️  {} → {} ({} → {} bytes, {:.2}%)",
        summary.source_path.display(),
        summary.archive_path.display(),
        summary.original_size,
        summary.archive_size,
        summary.reduction_pct,
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn extension_is_swapped_not_substring_replaced() {
        assert_eq!(archive_path_for(Path::new("/data/txt/notes.txt"), "zip"), PathBuf::from("/data/txt/notes.zip"));
        assert_eq!(archive_path_for(Path::new("README"), "zip"), PathBuf::from("README.zip"));
        assert_eq!(archive_path_for(Path::new("a.tar.txt"), "zip"), PathBuf::from("a.tar.zip"));
    }

    #[test]
    fn reduction_of_empty_original_is_zero() {
        assert_eq!(reduction_percent(0, 120), 0.0);
        assert_eq!(reduction_percent(200, 50), 75.0);
        assert!(reduction_percent(10, 130) < 0.0);
    }

    #[test]
    fn timestamp_format() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(format_timestamp(t), "2023-11-14 22:13:20");
    }

    #[test]
    fn report_lists_all_four_figures() {
        let s = ArchiveSummary {
            source_path:   "a.txt".into(),
            archive_path:  "a.zip".into(),
            entry_name:    "a.txt".into(),
            original_size: 1000,
            archive_size:  250,
            reduction_pct: 75.0,
            created_at:    "2024-01-02 03:04:05".into(),
        };
        let r = s.report();
        assert!(r.contains("2024-01-02 03:04:05"));
        assert!(r.contains("Original size: 1000 bytes"));
        assert!(r.contains("Archive size: 250 bytes"));
        assert!(r.contains("75.00%"));
    }

    #[test]
    fn zip_source_cannot_overwrite_itself() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("already.zip");
        fs::write(&path, b"x").unwrap();
        let doc = SourceDocument { path: path.clone(), text: "x\r\n".into(), line_count: 1, size_bytes: 1, load_ms: 0 };
        let err = write_archive(&doc, &ArchiveOptions::default(), |_| {}).unwrap_err();
        assert!(matches!(err, ZipperError::WriteFailure { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"x");
    }
}
