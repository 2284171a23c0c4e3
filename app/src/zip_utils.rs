/// zip_utils.rs — Single-entry ZIP write/read helpers.
use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::loader::percent;

/// Level 0 stores the entry uncompressed; 1–9 deflate it.
pub fn entry_options(compress_level: u32) -> SimpleFileOptions {
    let method = if compress_level == 0 {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    SimpleFileOptions::default()
        .compression_method(method)
        .compression_level(if compress_level == 0 { None } else { Some(compress_level as i64) })
}

/// Write `payload` as the only entry `entry_name` of a new ZIP at `dest`.
///
/// The archive is built in a temporary file beside `dest` and renamed over it
/// once complete, so a failed write leaves any previous archive untouched and
/// a successful one is always a freshly created file. Progress (0–100) follows
/// payload bytes written and reaches 100 once the archive is in place.
pub fn write_single_entry(
    dest:            &Path,
    entry_name:      &str,
    payload:         &[u8],
    compress_level:  u32,
    chunk_bytes:     usize,
    mut on_progress: impl FnMut(u8),
) -> io::Result<()> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _                                    => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    let mut zip = ZipWriter::new(tmp);
    zip.start_file(entry_name, entry_options(compress_level))?;

    let total = payload.len() as u64;
    let mut written: u64 = 0;
    let mut last_pct: Option<u8> = None;
    for chunk in payload.chunks(chunk_bytes.max(1)) {
        zip.write_all(chunk)?;
        written += chunk.len() as u64;
        let pct = percent(written, total).min(99);
        if last_pct != Some(pct) {
            on_progress(pct);
            last_pct = Some(pct);
        }
    }

    let mut tmp = zip.finish()?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest)?;
    on_progress(100);
    Ok(())
}

/// Read the first entry of the archive at `path`: its name and bytes.
pub fn read_single_entry(path: &Path) -> io::Result<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    if archive.len() == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "archive has no entries"));
    }
    let mut entry = archive.by_index(0)?;
    let mut out = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut out)?;
    Ok((entry.name().to_string(), out))
}

/// Number of entries in the archive at `path`.
pub fn entry_count(path: &Path) -> io::Result<usize> {
    Ok(ZipArchive::new(File::open(path)?)?.len())
}
