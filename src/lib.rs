//! CSV import pipeline for bulk vendor/query uploads.
//!
//! - Read: [`DocumentReader`] gates on the `.csv` extension and a size cap,
//!   decodes to UTF-8, and yields an immutable [`RawDocument`].
//! - Parse: [`TableParser`] turns text into a [`ParsedTable`]: header plus
//!   ordered records, with defective rows retained alongside their original
//!   line numbers.
//! - Validate: [`validate`] checks a table against an [`ImportSchema`] and
//!   splits records into accepted [`Row`]s and [`RejectedRow`]s.
//! - Commit: an [`ImportSession`] drives select → preview → submit and hands
//!   accepted rows to a caller-supplied [`CommitSink`].

mod codec;
mod commit;
mod io;
mod parse;
mod schema;
mod session;
mod validate;

pub use crate::commit::{CommitError, CommitReceipt, CommitRequest, CommitSink, FirmId};
pub use crate::io::{DocumentReader, RawDocument, MAX_DOCUMENT_BYTES};
pub use crate::parse::{serialize_rows, FieldMode, ParsedTable, Record, TableParser};
pub use crate::schema::{FieldRule, ImportKind, ImportSchema, SchemaBuilder, VENDOR_CATEGORIES};
pub use crate::session::{
    ImportReport, ImportSession, Preview, SessionConfig, SessionState, PREVIEW_ROWS,
};
pub use crate::validate::{
    validate, ImportResult, RejectedRow, Row, RowError, ValidationOutcome,
};

use std::time::Duration;
use thiserror::Error;

/// Everything that can fail between selecting a file and committing it.
///
/// Reader, parser, and schema errors are fatal to the current attempt.
/// Per-row failures are not errors at this level; they aggregate into
/// [`ImportResult::rejected`] and only surface here as [`RowValidation`]
/// when an entire document is rejected at submit time.
///
/// [`RowValidation`]: ImportError::RowValidation
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported format: {0:?} is not a .csv file")]
    UnsupportedFormat(String),
    #[error("file too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("document must have a header and at least one data row")]
    EmptyDocument,
    #[error("duplicate header column {0:?}")]
    DuplicateHeader(String),
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("all {} data rows failed validation", .rejected.len())]
    RowValidation { rejected: Vec<RejectedRow> },
    #[error("another submit is already in flight")]
    SessionBusy,
    #[error("commit timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Commit(#[from] CommitError),
    #[error("import was cancelled before the commit result arrived")]
    Cancelled,
    #[error("no parsed document is staged for submission")]
    NothingStaged,
    #[error("session already completed; reset() starts a new import")]
    AlreadyCompleted,
}

pub type CsvResult<T> = std::result::Result<T, ImportError>;

/// One-shot parse + validate with default parser settings.
///
/// The [`ImportSession`] runs the same two stages; this entry point exists
/// for callers that already hold text and do not need orchestration.
pub fn parse_and_validate(content: &str, schema: &ImportSchema) -> CsvResult<ImportResult> {
    let table = TableParser::new().parse(content)?;
    validate(&table, schema)
}
