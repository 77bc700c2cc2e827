//! Smallest end-to-end import: stage a document from memory, preview it,
//! and commit the accepted rows to an in-memory sink.

use async_trait::async_trait;
use csv_import::{
    CommitError, CommitReceipt, CommitRequest, CommitSink, FirmId, ImportSchema, ImportSession,
    Row,
};
use std::sync::Mutex;

#[derive(Default)]
struct MemorySink {
    rows: Mutex<Vec<Row>>,
}

#[async_trait]
impl CommitSink for MemorySink {
    async fn commit(&self, request: CommitRequest<'_>) -> Result<CommitReceipt, CommitError> {
        let mut rows = self.rows.lock().unwrap();
        rows.extend(request.rows.iter().cloned());
        Ok(CommitReceipt {
            accepted: request.rows.len(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let doc = "name,email,category\n\
               Acme,sales@acme.io,supplier\n\
               Bolt,hello@bolt.dev,\"manufacturer\"\n\
               ,missing@name.io,other\n";

    let session = ImportSession::new(
        ImportSchema::vendors(),
        FirmId::new("firm-1"),
        MemorySink::default(),
    );

    let preview = session.select_source(doc.as_bytes(), "vendors.csv").await?;
    println!("previewing {} of {} rows", preview.rows.len(), preview.total);

    let report = session.submit("vendor-42").await?;
    println!(
        "accepted {} of {} rows ({} rejected)",
        report.accepted,
        report.total,
        report.rejected.len()
    );
    for rejected in &report.rejected {
        for reason in &rejected.reasons {
            println!("  line {}: {}", rejected.line, reason);
        }
    }
    Ok(())
}
