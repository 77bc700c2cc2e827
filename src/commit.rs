use crate::schema::ImportKind;
use crate::validate::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier for the firm a commit belongs to.
///
/// The import core never inspects its shape; it is threaded through to the
/// sink with every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmId(String);

impl FirmId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FirmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a sink needs to persist one batch of accepted rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest<'a> {
    pub firm: &'a FirmId,
    pub kind: ImportKind,
    pub vendor_id: &'a str,
    pub rows: &'a [Row],
}

/// Sink acknowledgement for a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    pub accepted: usize,
}

/// Failure reported by a sink. Unknown targets are errors here, never
/// silently remapped to some default record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("unknown vendor {0:?}")]
    UnknownVendor(String),
    #[error("unknown firm {0:?}")]
    UnknownFirm(String),
    #[error("commit rejected: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Destination for accepted rows.
///
/// Implementations perform the side effect (HTTP call, database write,
/// in-memory store) and must report success or failure unambiguously. The
/// session may drop the returned future to cancel an in-flight commit.
#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn commit(&self, request: CommitRequest<'_>) -> Result<CommitReceipt, CommitError>;
}

// Lets a caller keep a handle on the sink it hands to a session.
#[async_trait]
impl<S: CommitSink + ?Sized> CommitSink for std::sync::Arc<S> {
    async fn commit(&self, request: CommitRequest<'_>) -> Result<CommitReceipt, CommitError> {
        (**self).commit(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Row;

    #[test]
    fn request_serializes_with_camel_case_and_row_maps() {
        let firm = FirmId::new("firm-1");
        let rows = vec![Row::from_pairs(
            2,
            vec![
                ("name".to_string(), "Acme".to_string()),
                ("category".to_string(), "supplier".to_string()),
            ],
        )];
        let request = CommitRequest {
            firm: &firm,
            kind: ImportKind::Vendors,
            vendor_id: "v-9",
            rows: &rows,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["firm"], "firm-1");
        assert_eq!(json["kind"], "vendors");
        assert_eq!(json["vendorId"], "v-9");
        assert_eq!(json["rows"][0]["name"], "Acme");
        assert_eq!(json["rows"][0]["category"], "supplier");
    }
}
