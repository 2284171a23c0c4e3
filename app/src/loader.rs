/// loader.rs — Read a text file into a CRLF-normalised display buffer.
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::debug;

use crate::error::ZipperError;

pub const CRLF: &str = "\r\n";

/// A file that has been read and normalised.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path:       PathBuf,
    pub text:       String,
    pub line_count: usize,
    pub size_bytes: u64,
    pub load_ms:    u64,
}

impl SourceDocument {
    /// Lines in file order, without their terminators.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split_terminator(CRLF)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Integer percentage of `done` over `total`; an empty total counts as done.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}

/// Splits on `\n`, `\r` and `\r\n`, re-terminating every line with CRLF.
#[derive(Default)]
struct LineNormalizer {
    out:      String,
    line:     Vec<u8>,
    after_cr: bool,
    lines:    usize,
}

impl LineNormalizer {
    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                b'\r' => {
                    self.end_line();
                    self.after_cr = true;
                }
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' => self.end_line(),
                _ => {
                    self.after_cr = false;
                    self.line.push(b);
                }
            }
        }
    }

    fn end_line(&mut self) {
        // lossy: invalid UTF-8 becomes U+FFFD
        self.out.push_str(&String::from_utf8_lossy(&self.line));
        self.out.push_str(CRLF);
        self.line.clear();
        self.lines += 1;
    }

    fn finish(mut self) -> (String, usize) {
        if !self.line.is_empty() {
            self.end_line();
        }
        (self.out, self.lines)
    }
}

/// Normalise an in-memory buffer the same way [`load_text`] does.
pub fn normalize(bytes: &[u8]) -> (String, usize) {
    let mut n = LineNormalizer::default();
    n.feed(bytes);
    n.finish()
}

/// Read `path` fully, reporting byte progress (0–100) through `on_progress`.
///
/// Progress is reported only when the integer percentage changes and always
/// ends with 100 on success.
pub fn load_text(
    path: &Path,
    buffer_bytes: usize,
    mut on_progress: impl FnMut(u8),
) -> Result<SourceDocument, ZipperError> {
    let started = Instant::now();
    let file = File::open(path).map_err(|e| ZipperError::read(path, e))?;
    let meta = file.metadata().map_err(|e| ZipperError::read(path, e))?;
    if meta.is_dir() {
        return Err(ZipperError::read(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "path is a directory"),
        ));
    }

    let total = meta.len();
    let mut reader = BufReader::with_capacity(buffer_bytes.max(1), file);
    let mut normalizer = LineNormalizer::default();
    let mut bytes_read: u64 = 0;
    let mut last_pct: Option<u8> = None;

    loop {
        let n = {
            let buf = reader.fill_buf().map_err(|e| ZipperError::read(path, e))?;
            if buf.is_empty() {
                break;
            }
            normalizer.feed(buf);
            buf.len()
        };
        reader.consume(n);
        bytes_read += n as u64;

        // 100 is reserved for completion
        let pct = percent(bytes_read, total).min(99);
        if last_pct != Some(pct) {
            on_progress(pct);
            last_pct = Some(pct);
        }
    }

    let (text, line_count) = normalizer.finish();
    on_progress(100);

    let load_ms = started.elapsed().as_millis() as u64;
    debug!("📖 loaded {} ({bytes_read} bytes, {line_count} lines, {load_ms}ms)", path.display());

    Ok(SourceDocument {
        path: path.to_path_buf(),
        text,
        line_count,
        size_bytes: bytes_read,
        load_ms,
    })
}
