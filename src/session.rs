use crate::commit::{CommitRequest, CommitSink, FirmId};
use crate::io::{DocumentReader, RawDocument, MAX_DOCUMENT_BYTES};
use crate::parse::{FieldMode, ParsedTable, TableParser};
use crate::schema::{ImportKind, ImportSchema};
use crate::validate::{validate, RejectedRow};
use crate::{CsvResult, ImportError};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Number of data rows shown in a preview, regardless of document size.
pub const PREVIEW_ROWS: usize = 5;

/// Lifecycle of one import attempt.
///
/// `Succeeded` is terminal until [`ImportSession::reset`]; `Failed` allows
/// either a retry of the same document or selecting a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FileSelected,
    Previewing,
    Submitting,
    Succeeded,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::FileSelected => "file-selected",
            SessionState::Previewing => "previewing",
            SessionState::Submitting => "submitting",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Pipeline knobs for a session. The defaults match the interactive
/// import flow: quoted parsing, 10 MiB cap, 30 second commit timeout.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub commit_timeout: Duration,
    pub field_mode: FieldMode,
    pub max_bytes: u64,
    pub charset: &'static encoding_rs::Encoding,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            commit_timeout: Duration::from_secs(30),
            field_mode: FieldMode::default(),
            max_bytes: MAX_DOCUMENT_BYTES,
            charset: encoding_rs::UTF_8,
        }
    }
}

/// Bounded view of a parsed document: header row plus the first
/// [`PREVIEW_ROWS`] records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Total data records in the document, not just the previewed ones.
    pub total: usize,
}

impl Preview {
    fn of(table: &ParsedTable) -> Self {
        Self {
            headers: table.headers.clone(),
            rows: table
                .records
                .iter()
                .take(PREVIEW_ROWS)
                .map(|r| r.values.clone())
                .collect(),
            total: table.records.len(),
        }
    }
}

/// Final accounting of a successful import.
///
/// `rejected` is the accept-partial warning list: rows that failed
/// validation and were left out of the commit, never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub kind: ImportKind,
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
    pub total: usize,
}

struct Inner {
    state: SessionState,
    generation: u64,
    document: Option<RawDocument>,
    table: Option<ParsedTable>,
    report: Option<ImportReport>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            document: None,
            table: None,
            report: None,
        }
    }
}

/// Orchestrates one import: read → parse → preview → validate → commit.
///
/// All methods take `&self`, so a session can be shared behind an `Arc`
/// and polled from several tasks; a second submit while one is in flight
/// fails with [`ImportError::SessionBusy`] rather than queueing. State is
/// guarded by a `std::sync::Mutex` that is never held across an await.
pub struct ImportSession<S> {
    sink: S,
    firm: FirmId,
    schema: ImportSchema,
    config: SessionConfig,
    reader: DocumentReader,
    parser: TableParser,
    inner: Mutex<Inner>,
}

impl<S: CommitSink> ImportSession<S> {
    pub fn new(schema: ImportSchema, firm: FirmId, sink: S) -> Self {
        Self::with_config(schema, firm, sink, SessionConfig::default())
    }

    pub fn with_config(schema: ImportSchema, firm: FirmId, sink: S, config: SessionConfig) -> Self {
        let reader = DocumentReader::new()
            .with_max_bytes(config.max_bytes)
            .with_charset(config.charset);
        let parser = TableParser::new().with_mode(config.field_mode);
        Self {
            sink,
            firm,
            schema,
            config,
            reader,
            parser,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn kind(&self) -> ImportKind {
        self.schema.kind()
    }

    pub fn firm(&self) -> &FirmId {
        &self.firm
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The report of the last successful import, if any.
    pub fn report(&self) -> Option<ImportReport> {
        self.lock().report.clone()
    }

    /// Name and byte size of the currently staged document.
    pub fn document(&self) -> Option<(String, u64)> {
        self.lock()
            .document
            .as_ref()
            .map(|d| (d.name.clone(), d.size_bytes))
    }

    pub fn preview(&self) -> Option<Preview> {
        self.lock().table.as_ref().map(Preview::of)
    }

    /// Select a document from a file path.
    ///
    /// On success the session lands in `Previewing`. A read failure leaves
    /// the previous state untouched; a parse failure keeps the document
    /// and leaves the session in `FileSelected`.
    pub async fn select_file(&self, path: &Path) -> CsvResult<Preview> {
        self.check_selectable()?;
        let document = self.reader.read_path(path).await?;
        self.stage(document)
    }

    /// Select a document from any async byte source under a file name.
    pub async fn select_source<R>(&self, reader: R, name: &str) -> CsvResult<Preview>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.check_selectable()?;
        let document = self.reader.read_from(reader, name).await?;
        self.stage(document)
    }

    /// Validate the staged table and commit the accepted rows.
    ///
    /// Validation always re-runs here; a stale preview is never trusted.
    /// Accept-partial policy: rejected rows become the report's warning
    /// list and only a fully rejected document fails the import. Allowed
    /// from `Previewing` and, as an explicit retry, from `Failed`.
    pub async fn submit(&self, vendor_id: &str) -> CsvResult<ImportReport> {
        let (table, generation) = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Submitting => return Err(ImportError::SessionBusy),
                SessionState::Succeeded => return Err(ImportError::AlreadyCompleted),
                SessionState::Idle | SessionState::FileSelected => {
                    return Err(ImportError::NothingStaged)
                }
                SessionState::Previewing | SessionState::Failed => {}
            }
            let table = match inner.table.clone() {
                Some(table) => table,
                None => return Err(ImportError::NothingStaged),
            };
            inner.generation += 1;
            let generation = inner.generation;
            set_state(&mut inner, SessionState::Submitting);
            (table, generation)
        };

        let outcome = self.run_commit(&table, vendor_id).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            // The session was reset while the commit was in flight; the
            // result no longer has a home.
            warn!(generation, "discarding stale submit result");
            return Err(ImportError::Cancelled);
        }
        match outcome {
            Ok(report) => {
                inner.report = Some(report.clone());
                set_state(&mut inner, SessionState::Succeeded);
                Ok(report)
            }
            Err(err) => {
                // A missing required column means the wrong schema or the
                // wrong file, not a dead import: back to the preview.
                let next = match &err {
                    ImportError::MissingColumns(_) => SessionState::Previewing,
                    _ => SessionState::Failed,
                };
                set_state(&mut inner, next);
                Err(err)
            }
        }
    }

    /// Drop all staged state and return to `Idle`.
    ///
    /// Safe in any state: an in-flight commit keeps running but its result
    /// is discarded when it lands, via the generation check.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.document = None;
        inner.table = None;
        inner.report = None;
        set_state(&mut inner, SessionState::Idle);
    }

    async fn run_commit(&self, table: &ParsedTable, vendor_id: &str) -> CsvResult<ImportReport> {
        let result = validate(table, &self.schema)?;
        let total = result.total();
        if result.all_rejected() {
            return Err(ImportError::RowValidation {
                rejected: result.rejected,
            });
        }

        let request = CommitRequest {
            firm: &self.firm,
            kind: self.schema.kind(),
            vendor_id,
            rows: &result.accepted,
        };
        let receipt = match timeout(self.config.commit_timeout, self.sink.commit(request)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => return Err(ImportError::Commit(err)),
            Err(_) => return Err(ImportError::Timeout(self.config.commit_timeout)),
        };

        info!(
            kind = %self.schema.kind(),
            accepted = receipt.accepted,
            rejected = result.rejected.len(),
            "commit confirmed"
        );
        Ok(ImportReport {
            kind: self.schema.kind(),
            accepted: receipt.accepted,
            rejected: result.rejected,
            total,
        })
    }

    fn check_selectable(&self) -> CsvResult<()> {
        let inner = self.lock();
        match inner.state {
            SessionState::Submitting => Err(ImportError::SessionBusy),
            SessionState::Succeeded => Err(ImportError::AlreadyCompleted),
            _ => Ok(()),
        }
    }

    fn stage(&self, document: RawDocument) -> CsvResult<Preview> {
        // Parse outside the lock; only the state swap needs it.
        let parsed = self.parser.parse(&document.content);

        let mut inner = self.lock();
        match inner.state {
            SessionState::Submitting => return Err(ImportError::SessionBusy),
            SessionState::Succeeded => return Err(ImportError::AlreadyCompleted),
            _ => {}
        }
        inner.table = None;
        inner.report = None;
        debug!(name = %document.name, bytes = document.size_bytes, "document staged");
        inner.document = Some(document);
        match parsed {
            Ok(table) => {
                let preview = Preview::of(&table);
                inner.table = Some(table);
                set_state(&mut inner, SessionState::Previewing);
                Ok(preview)
            }
            Err(err) => {
                set_state(&mut inner, SessionState::FileSelected);
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn set_state(inner: &mut Inner, next: SessionState) {
    if inner.state != next {
        debug!(from = %inner.state, to = %next, "session transition");
        inner.state = next;
    }
}
