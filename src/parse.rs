use crate::validate::Row;
use crate::{CsvResult, ImportError};

/// How fields are split within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldMode {
    /// Split on every comma and trim each field. No quoting support; a
    /// quoted field containing a comma breaks into two fields.
    Naive,
    /// RFC 4180 quoting: a field wrapped in double quotes may contain
    /// commas and newlines, with `""` as an escaped quote.
    #[default]
    Quoted,
}

/// One physical record: the line it started on and its raw field values.
///
/// `line` is 1-based over the original document, counting blank lines and
/// any lines consumed by embedded newlines in quoted fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub values: Vec<String>,
}

/// Header row plus every data record, in original file order.
///
/// Records whose field count differs from the header count are retained
/// here, not dropped; the validator rejects them with their line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl ParsedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Splits decoded CSV text into a [`ParsedTable`].
///
/// Line endings may be `\n` or `\r\n`. Fully blank lines are skipped but
/// still counted toward line numbers. The first non-blank line is the
/// header; a document with no data rows after it fails with
/// [`ImportError::EmptyDocument`].
#[derive(Debug, Clone, Default)]
pub struct TableParser {
    mode: FieldMode,
}

impl TableParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: FieldMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn parse(&self, content: &str) -> CsvResult<ParsedTable> {
        let mut raw = match self.mode {
            FieldMode::Naive => naive_records(content),
            FieldMode::Quoted => quoted_records(content),
        }
        .into_iter();

        let header = match raw.next() {
            Some(record) => record,
            None => return Err(ImportError::EmptyDocument),
        };
        let records: Vec<Record> = raw.collect();
        if records.is_empty() {
            return Err(ImportError::EmptyDocument);
        }

        let headers: Vec<String> = header
            .values
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        for (i, name) in headers.iter().enumerate() {
            if headers[..i].iter().any(|seen| seen == name) {
                return Err(ImportError::DuplicateHeader(name.clone()));
            }
        }

        Ok(ParsedTable { headers, records })
    }
}

fn naive_records(content: &str) -> Vec<Record> {
    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        records.push(Record {
            line: idx + 1,
            values: line.split(',').map(|f| f.trim().to_string()).collect(),
        });
    }
    records
}

fn quoted_records(content: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut buf = String::new();
    let mut line = 1usize;
    let mut start = 1usize;
    let mut in_quotes = false;
    let mut field_blank = true;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    buf.push_str("\"\"");
                }
                '"' => {
                    in_quotes = false;
                    buf.push(c);
                }
                '\n' => {
                    line += 1;
                    buf.push(c);
                }
                _ => buf.push(c),
            }
            continue;
        }
        match c {
            // A quote only opens a quoted run at the start of a field, the
            // same rule `quoted_fields` applies; a stray quote mid-field
            // stays literal.
            '"' if field_blank => {
                in_quotes = true;
                field_blank = false;
                buf.push(c);
            }
            ',' => {
                field_blank = true;
                buf.push(c);
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                flush_record(&mut records, &mut buf, start);
                start = line;
                field_blank = true;
            }
            c => {
                if !c.is_whitespace() {
                    field_blank = false;
                }
                buf.push(c);
            }
        }
    }
    flush_record(&mut records, &mut buf, start);
    records
}

fn flush_record(records: &mut Vec<Record>, buf: &mut String, start: usize) {
    if !buf.trim().is_empty() {
        records.push(Record {
            line: start,
            values: quoted_fields(buf),
        });
    }
    buf.clear();
}

fn quoted_fields(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' if !was_quoted && field.trim().is_empty() => {
                    field.clear();
                    in_quotes = true;
                    was_quoted = true;
                }
                ',' => {
                    fields.push(finish_field(&mut field, &mut was_quoted));
                }
                // Padding after a closing quote is not field content.
                c if was_quoted && c.is_whitespace() => {}
                _ => field.push(c),
            }
        }
    }
    // An unterminated quote runs to the end of the record; the content up
    // to that point is kept rather than discarded.
    fields.push(finish_field(&mut field, &mut was_quoted));
    fields
}

fn finish_field(field: &mut String, was_quoted: &mut bool) -> String {
    let raw = std::mem::take(field);
    if std::mem::take(was_quoted) {
        raw
    } else {
        raw.trim().to_string()
    }
}

/// Render rows back to CSV text under the given header order.
///
/// Fields containing a comma, quote, or line break are quoted with `""`
/// escapes, so the output reparses to the same values.
pub fn serialize_rows(headers: &[String], rows: &[Row]) -> String {
    let mut out = String::new();
    push_record(&mut out, headers.iter().map(|h| h.as_str()));
    for row in rows {
        push_record(&mut out, headers.iter().map(|h| row.get(h).unwrap_or("")));
    }
    out
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains(['"', ',', '\n', '\r']) {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}
