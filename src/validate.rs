use crate::parse::{ParsedTable, Record};
use crate::schema::{FieldRule, ImportSchema};
use crate::{CsvResult, ImportError};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// One accepted data record as a column → value mapping, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    line: usize,
    fields: Vec<(String, String)>,
}

impl Row {
    pub(crate) fn from_pairs(line: usize, fields: Vec<(String, String)>) -> Self {
        Self { line, fields }
    }

    /// Physical line this row came from in the source document.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Why a single row was rejected. Non-fatal: collected per row, never
/// aborting the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("column count mismatch: expected {expected}, got {got}")]
    ColumnCountMismatch { expected: usize, got: usize },
    #[error("{column} is required")]
    MissingValue { column: String },
    #[error("{column} must be an integer, got {value:?}")]
    NotAnInteger { column: String, value: String },
    #[error("{column} must be between {min} and {max}, got {value}")]
    OutOfRange {
        column: String,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{column} must be one of {}, got {value:?}", allowed.join(", "))]
    NotInSet {
        column: String,
        value: String,
        allowed: &'static [&'static str],
    },
    #[error("{column} is not a valid email address: {value:?}")]
    InvalidEmail { column: String, value: String },
}

impl Serialize for RowError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A rejected row with every reason that applied, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based ordinal among data rows.
    pub row: usize,
    /// Physical line number in the source document.
    pub line: usize,
    pub reasons: Vec<RowError>,
}

/// Per-row verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted(Row),
    Rejected(RejectedRow),
}

/// Aggregate of one validation pass over a parsed table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub accepted: Vec<Row>,
    pub rejected: Vec<RejectedRow>,
}

impl ImportResult {
    pub fn push(&mut self, outcome: ValidationOutcome) {
        match outcome {
            ValidationOutcome::Accepted(row) => self.accepted.push(row),
            ValidationOutcome::Rejected(rejected) => self.rejected.push(rejected),
        }
    }

    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn all_rejected(&self) -> bool {
        self.accepted.is_empty() && !self.rejected.is_empty()
    }
}

/// Check a parsed table against a schema.
///
/// Fails fast with [`ImportError::MissingColumns`] when a required column
/// is absent from the header; otherwise every row is classified and the
/// pass never fails. Pure: the same inputs always produce the same result.
pub fn validate(table: &ParsedTable, schema: &ImportSchema) -> CsvResult<ImportResult> {
    let missing: Vec<String> = schema
        .required_columns()
        .iter()
        .filter(|c| table.column_index(c.as_str()).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    // Resolve each rule's column once, not per row. A rule naming a column
    // the document does not have is skipped: only `required` makes a
    // column mandatory.
    let rule_slots: Vec<Option<usize>> = schema
        .rules()
        .iter()
        .map(|(column, _)| table.column_index(column))
        .collect();

    let mut result = ImportResult::default();
    for (idx, record) in table.records.iter().enumerate() {
        result.push(check_record(table, schema, &rule_slots, idx + 1, record));
    }
    Ok(result)
}

fn check_record(
    table: &ParsedTable,
    schema: &ImportSchema,
    rule_slots: &[Option<usize>],
    row: usize,
    record: &Record,
) -> ValidationOutcome {
    let expected = table.headers.len();
    if record.values.len() != expected {
        // Fields cannot be mapped to columns, so per-field rules are
        // skipped for this row.
        return ValidationOutcome::Rejected(RejectedRow {
            row,
            line: record.line,
            reasons: vec![RowError::ColumnCountMismatch {
                expected,
                got: record.values.len(),
            }],
        });
    }

    let mut reasons = Vec::new();
    for ((column, rule), slot) in schema.rules().iter().zip(rule_slots) {
        let Some(i) = slot else { continue };
        if let Some(err) = apply_rule(*rule, column, &record.values[*i]) {
            reasons.push(err);
        }
    }

    if reasons.is_empty() {
        let fields = table
            .headers
            .iter()
            .cloned()
            .zip(record.values.iter().cloned())
            .collect();
        ValidationOutcome::Accepted(Row::from_pairs(record.line, fields))
    } else {
        ValidationOutcome::Rejected(RejectedRow {
            row,
            line: record.line,
            reasons,
        })
    }
}

fn apply_rule(rule: FieldRule, column: &str, value: &str) -> Option<RowError> {
    let value = value.trim();
    match rule {
        FieldRule::NonEmpty => value.is_empty().then(|| RowError::MissingValue {
            column: column.to_string(),
        }),
        FieldRule::IntRange { min, max } => {
            if value.is_empty() {
                return None;
            }
            match value.parse::<i64>() {
                Err(_) => Some(RowError::NotAnInteger {
                    column: column.to_string(),
                    value: value.to_string(),
                }),
                Ok(n) if n < min || n > max => Some(RowError::OutOfRange {
                    column: column.to_string(),
                    value: n,
                    min,
                    max,
                }),
                Ok(_) => None,
            }
        }
        FieldRule::OneOf(allowed) => {
            if value.is_empty() {
                return None;
            }
            (!allowed.contains(&value)).then(|| RowError::NotInSet {
                column: column.to_string(),
                value: value.to_string(),
                allowed,
            })
        }
        FieldRule::Email => {
            if value.is_empty() {
                return None;
            }
            (!email_like(value)).then(|| RowError::InvalidEmail {
                column: column.to_string(),
                value: value.to_string(),
            })
        }
    }
}

// local@host.tld with no whitespace anywhere and non-empty parts.
fn email_like(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.chars().any(char::is_whitespace) {
        return false;
    }
    if domain.contains('@') || domain.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
