/// session.rs — Session controller: owns the loaded document, runs the load and
/// archive operations off the request thread, and broadcasts their progress.
use serde::Serialize;
use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{sync::broadcast, task::JoinError};
use tracing::{info, warn};

use crate::{
    archiver::{write_archive, ArchiveOptions, ArchiveSummary},
    config::Config,
    error::{Operation, SessionError, ZipperError},
    loader::{load_text, SourceDocument},
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loaded,
    Archived,
}

/// Metadata of the loaded document, without its text.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub path:       PathBuf,
    pub line_count: usize,
    pub size_bytes: u64,
    pub load_ms:    u64,
}

impl From<&SourceDocument> for DocumentInfo {
    fn from(d: &SourceDocument) -> Self {
        Self {
            path:       d.path.clone(),
            line_count: d.line_count,
            size_bytes: d.size_bytes,
            load_ms:    d.load_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    Progress { operation: Operation, percent: u8 },
    Loaded   { document: DocumentInfo },
    Archived { summary: ArchiveSummary },
    Failed   { operation: Operation, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase:        Phase,
    pub document:     Option<DocumentInfo>,
    pub loading:      bool,
    pub archiving:    bool,
    pub last_archive: Option<ArchiveSummary>,
}

#[derive(Default)]
struct Inner {
    document:  Option<Arc<SourceDocument>>,
    summary:   Option<ArchiveSummary>,
    loading:   bool,
    archiving: bool,
}

impl Inner {
    fn phase(&self) -> Phase {
        match (&self.document, &self.summary) {
            (None, _)          => Phase::Idle,
            (Some(_), None)    => Phase::Loaded,
            (Some(_), Some(_)) => Phase::Archived,
        }
    }
}

pub struct Session {
    inner:        Mutex<Inner>,
    events:       broadcast::Sender<SessionEvent>,
    read_buffer:  usize,
    archive_opts: ArchiveOptions,
}

/// Clears the busy flag of one operation when dropped, panics included.
struct BusyGuard {
    session:   Arc<Session>,
    operation: Operation,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let mut inner = self.session.lock();
        match self.operation {
            Operation::Load    => inner.loading = false,
            Operation::Archive => inner.archiving = false,
        }
    }
}

impl Session {
    pub fn new(cfg: &Config) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            inner:        Mutex::new(Inner::default()),
            events,
            read_buffer:  cfg.read_buffer_bytes,
            archive_opts: ArchiveOptions::from_config(cfg),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            phase:        inner.phase(),
            document:     inner.document.as_deref().map(DocumentInfo::from),
            loading:      inner.loading,
            archiving:    inner.archiving,
            last_archive: inner.summary.clone(),
        }
    }

    pub fn document(&self) -> Option<Arc<SourceDocument>> {
        self.lock().document.clone()
    }

    fn begin_load(self: &Arc<Self>) -> Result<BusyGuard, SessionError> {
        let mut inner = self.lock();
        if inner.loading {
            return Err(SessionError::Busy(Operation::Load));
        }
        inner.loading = true;
        Ok(BusyGuard { session: Arc::clone(self), operation: Operation::Load })
    }

    fn begin_archive(self: &Arc<Self>) -> Result<(BusyGuard, Arc<SourceDocument>), SessionError> {
        let mut inner = self.lock();
        if inner.archiving {
            return Err(SessionError::Busy(Operation::Archive));
        }
        if inner.loading {
            return Err(SessionError::Busy(Operation::Load));
        }
        let doc = inner.document.clone().ok_or(SessionError::NothingLoaded)?;
        inner.archiving = true;
        Ok((BusyGuard { session: Arc::clone(self), operation: Operation::Archive }, doc))
    }

    /// Load `path` and make it the current document. On failure the previous
    /// document stays in place.
    pub async fn open(self: &Arc<Self>, path: PathBuf) -> Result<Arc<SourceDocument>, SessionError> {
        let guard = self.begin_load()?;
        info!("📂 Opening {}", path.display());

        let session = Arc::clone(self);
        let task_path = path.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = load_text(&task_path, session.read_buffer, |percent| {
                session.emit(SessionEvent::Progress { operation: Operation::Load, percent });
            });
            session.finish_load(result)
        })
        .await;

        joined.unwrap_or_else(|e| Err(self.task_failed(Operation::Load, path, e)))
    }

    fn finish_load(&self, result: Result<SourceDocument, ZipperError>) -> Result<Arc<SourceDocument>, SessionError> {
        match result {
            Ok(doc) => {
                let doc = Arc::new(doc);
                {
                    let mut inner = self.lock();
                    inner.document = Some(Arc::clone(&doc));
                    inner.summary  = None;
                }
                info!("✅ Loaded {} ({} lines, {}ms)", doc.path.display(), doc.line_count, doc.load_ms);
                self.emit(SessionEvent::Loaded { document: DocumentInfo::from(doc.as_ref()) });
                Ok(doc)
            }
            Err(e) => Err(self.fail(Operation::Load, e)),
        }
    }

    /// Archive the current document next to its source file.
    pub async fn archive(self: &Arc<Self>) -> Result<ArchiveSummary, SessionError> {
        let (guard, doc) = self.begin_archive()?;
        info!("🗜️  Archiving {}", doc.path.display());

        let session = Arc::clone(self);
        let source = doc.path.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let result = write_archive(&doc, &session.archive_opts, |percent| {
                session.emit(SessionEvent::Progress { operation: Operation::Archive, percent });
            });
            session.finish_archive(&doc, result)
        })
        .await;

        joined.unwrap_or_else(|e| Err(self.task_failed(Operation::Archive, source, e)))
    }

    fn finish_archive(
        &self,
        doc: &Arc<SourceDocument>,
        result: Result<ArchiveSummary, ZipperError>,
    ) -> Result<ArchiveSummary, SessionError> {
        match result {
            Ok(summary) => {
                {
                    let mut inner = self.lock();
                    // a newer document may have been opened meanwhile
                    if inner.document.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, doc)) {
                        inner.summary = Some(summary.clone());
                    }
                }
                self.emit(SessionEvent::Archived { summary: summary.clone() });
                Ok(summary)
            }
            Err(e) => Err(self.fail(Operation::Archive, e)),
        }
    }

    fn fail(&self, operation: Operation, e: ZipperError) -> SessionError {
        warn!("❌ {operation} failed: {e}");
        self.emit(SessionEvent::Failed { operation, message: e.to_string() });
        SessionError::File(e)
    }

    fn task_failed(&self, operation: Operation, path: PathBuf, e: JoinError) -> SessionError {
        let source = io::Error::other(format!("background task failed: {e}"));
        let err = match operation {
            Operation::Load    => ZipperError::read(path, source),
            Operation::Archive => ZipperError::write(path, source),
        };
        self.fail(operation, err)
    }
}
