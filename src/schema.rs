use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category values a vendor row may carry.
pub const VENDOR_CATEGORIES: &[&str] = &[
    "supplier",
    "manufacturer",
    "distributor",
    "service-provider",
    "contractor",
    "other",
];

/// Which import target a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Queries,
    Vendors,
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportKind::Queries => f.write_str("queries"),
            ImportKind::Vendors => f.write_str("vendors"),
        }
    }
}

impl FromStr for ImportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queries" => Ok(ImportKind::Queries),
            "vendors" => Ok(ImportKind::Vendors),
            other => Err(format!(
                "unknown import kind {other:?}, expected \"queries\" or \"vendors\""
            )),
        }
    }
}

/// A per-column validation rule.
///
/// Every rule except [`NonEmpty`](FieldRule::NonEmpty) is applied only when
/// the field has a value; optional columns stay optional unless a
/// `NonEmpty` rule is also declared for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// The field must contain at least one non-whitespace character.
    NonEmpty,
    /// The field must parse as an integer within `[min, max]`.
    IntRange { min: i64, max: i64 },
    /// The field must equal one of the listed values.
    OneOf(&'static [&'static str]),
    /// The field must look like an email address (`local@host.tld`, no
    /// whitespace).
    Email,
}

/// Declared shape of one import target: required columns plus field rules.
///
/// Schemas are built once and never mutated; the validator treats them as
/// read-only configuration.
#[derive(Debug, Clone)]
pub struct ImportSchema {
    kind: ImportKind,
    required: Vec<String>,
    rules: Vec<(String, FieldRule)>,
}

impl ImportSchema {
    pub fn builder(kind: ImportKind) -> SchemaBuilder {
        SchemaBuilder {
            kind,
            required: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// The stock schema for the given kind.
    pub fn for_kind(kind: ImportKind) -> Self {
        match kind {
            ImportKind::Queries => Self::queries(),
            ImportKind::Vendors => Self::vendors(),
        }
    }

    /// Query imports: `name,category,description,scoreImpact`, where
    /// `scoreImpact` is an optional integer in `[-100, 100]`.
    pub fn queries() -> Self {
        Self::builder(ImportKind::Queries)
            .require("name")
            .require("description")
            .rule("name", FieldRule::NonEmpty)
            .rule("description", FieldRule::NonEmpty)
            .rule("scoreImpact", FieldRule::IntRange { min: -100, max: 100 })
            .build()
    }

    /// Vendor imports: `name,email,phone,category,contact`, where
    /// `category` must come from [`VENDOR_CATEGORIES`] when present.
    pub fn vendors() -> Self {
        Self::builder(ImportKind::Vendors)
            .require("name")
            .require("email")
            .rule("name", FieldRule::NonEmpty)
            .rule("email", FieldRule::NonEmpty)
            .rule("email", FieldRule::Email)
            .rule("category", FieldRule::OneOf(VENDOR_CATEGORIES))
            .build()
    }

    pub fn kind(&self) -> ImportKind {
        self.kind
    }

    pub fn required_columns(&self) -> &[String] {
        &self.required
    }

    pub fn rules(&self) -> &[(String, FieldRule)] {
        &self.rules
    }
}

/// Builder for custom [`ImportSchema`]s.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    kind: ImportKind,
    required: Vec<String>,
    rules: Vec<(String, FieldRule)>,
}

impl SchemaBuilder {
    /// Mark a column as required in the header row.
    pub fn require(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.required.contains(&column) {
            self.required.push(column);
        }
        self
    }

    /// Attach a rule to a column. A column may carry several rules; all of
    /// them are applied and every failure is reported.
    pub fn rule(mut self, column: impl Into<String>, rule: FieldRule) -> Self {
        self.rules.push((column.into(), rule));
        self
    }

    pub fn build(self) -> ImportSchema {
        ImportSchema {
            kind: self.kind,
            required: self.required,
            rules: self.rules,
        }
    }
}
