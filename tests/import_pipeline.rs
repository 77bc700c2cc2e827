use async_trait::async_trait;
use csv_import::{
    CommitError, CommitReceipt, CommitRequest, CommitSink, FirmId, ImportError, ImportSchema,
    ImportSession, Row, SessionConfig, SessionState,
};
use std::sync::{Arc, Mutex};
use std::{fs::File, io::Write};

#[derive(Default)]
struct RecordingSink {
    requests: Mutex<Vec<(String, usize)>>,
    rows: Mutex<Vec<Row>>,
}

#[async_trait]
impl CommitSink for RecordingSink {
    async fn commit(&self, request: CommitRequest<'_>) -> Result<CommitReceipt, CommitError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.vendor_id.to_string(), request.rows.len()));
        self.rows.lock().unwrap().extend(request.rows.iter().cloned());
        Ok(CommitReceipt {
            accepted: request.rows.len(),
        })
    }
}

#[tokio::test]
async fn imports_a_vendor_file_end_to_end() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vendors.csv");
    let mut f = File::create(&path)?;
    writeln!(f, "name,email,phone,category,contact")?;
    writeln!(f, "Acme Industrial,sales@acme.io,+1-555-0100,supplier,Ada")?;
    writeln!(f, "\"Bolt, Brothers\",hello@bolt.dev,+1-555-0101,manufacturer,Bo")?;
    writeln!(f)?;
    writeln!(f, "Trio Logistics,move@trio.example,+1-555-0102,distributor,Cy")?;
    writeln!(f, ",missing@name.example,+1-555-0103,other,Dee")?;

    let sink = Arc::new(RecordingSink::default());
    let session = ImportSession::new(ImportSchema::vendors(), FirmId::new("firm-1"), sink.clone());

    let preview = session.select_file(&path).await?;
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(preview.headers, ["name", "email", "phone", "category", "contact"]);
    assert_eq!(preview.total, 4);
    assert_eq!(preview.rows[1][0], "Bolt, Brothers");

    let report = session.submit("vendor-9").await?;
    assert_eq!(session.state(), SessionState::Succeeded);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.total, 4);
    assert_eq!(report.rejected.len(), 1);
    // The rejected row sits after a blank line; line numbers count it.
    assert_eq!(report.rejected[0].row, 4);
    assert_eq!(report.rejected[0].line, 6);

    assert_eq!(*sink.requests.lock().unwrap(), [("vendor-9".to_string(), 3)]);
    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows[1].get("name"), Some("Bolt, Brothers"));
    assert_eq!(rows[2].get("contact"), Some("Cy"));
    Ok(())
}

#[tokio::test]
async fn imports_queries_with_partial_accept() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("queries.csv");
    let mut f = File::create(&path)?;
    writeln!(f, "name,category,description,scoreImpact")?;
    writeln!(f, "Q1,compliance,\"Audit, annual\",20")?;
    writeln!(f, "Q2,compliance,Check certs,150")?;
    writeln!(f, "Q3,compliance,,5")?;
    writeln!(f, "Q4,compliance,Track incidents,")?;

    let sink = Arc::new(RecordingSink::default());
    let session = ImportSession::new(ImportSchema::queries(), FirmId::new("firm-1"), sink.clone());

    session.select_file(&path).await?;
    let report = session.submit("vendor-9").await?;

    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected.len(), 2);
    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows[0].get("description"), Some("Audit, annual"));
    assert_eq!(rows[1].get("name"), Some("Q4"));

    let reasons: Vec<String> = report
        .rejected
        .iter()
        .flat_map(|r| r.reasons.iter().map(ToString::to_string))
        .collect();
    assert!(reasons[0].contains("scoreImpact"), "got {reasons:?}");
    assert_eq!(reasons[1], "description is required");
    Ok(())
}

#[tokio::test]
async fn wrong_extension_is_refused_before_reading() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vendors.txt");
    let mut f = File::create(&path)?;
    writeln!(f, "name,email,category")?;
    writeln!(f, "Acme,sales@acme.io,supplier")?;

    let session = ImportSession::new(
        ImportSchema::vendors(),
        FirmId::new("firm-1"),
        RecordingSink::default(),
    );
    let err = session.select_file(&path).await.unwrap_err();
    assert!(matches!(err, ImportError::UnsupportedFormat(name) if name == "vendors.txt"));
    assert_eq!(session.state(), SessionState::Idle);
    Ok(())
}

#[tokio::test]
async fn oversized_file_fails_from_metadata() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("big.csv");
    let mut f = File::create(&path)?;
    writeln!(f, "name,email,category")?;
    for i in 0..100 {
        writeln!(f, "V{i},v{i}@x.example,other")?;
    }
    let actual = std::fs::metadata(&path)?.len();

    let config = SessionConfig {
        max_bytes: 64,
        ..SessionConfig::default()
    };
    let session = ImportSession::with_config(
        ImportSchema::vendors(),
        FirmId::new("firm-1"),
        RecordingSink::default(),
        config,
    );
    let err = session.select_file(&path).await.unwrap_err();
    match err {
        ImportError::FileTooLarge { size, limit } => {
            assert_eq!(size, actual);
            assert_eq!(limit, 64);
        }
        other => panic!("expected FileTooLarge, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Idle);
    Ok(())
}

#[tokio::test]
async fn windows_1252_file_is_decoded() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("latin.csv");
    let mut f = File::create(&path)?;
    f.write_all(b"name,email,category\nCaf\xE9 Import,cafe@caf.example,supplier\n")?;

    let config = SessionConfig {
        charset: encoding_rs::WINDOWS_1252,
        ..SessionConfig::default()
    };
    let session = ImportSession::with_config(
        ImportSchema::vendors(),
        FirmId::new("firm-1"),
        RecordingSink::default(),
        config,
    );
    let preview = session.select_file(&path).await?;
    assert_eq!(preview.rows[0][0], "Caf\u{e9} Import");
    Ok(())
}

#[tokio::test]
async fn large_generated_file_commits_every_row() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bulk.csv");
    let mut f = File::create(&path)?;
    writeln!(f, "name,email,phone,category,contact")?;
    for i in 0..100_000 {
        writeln!(f, "Vendor {i:06},v{i}@bulk.example,+1-555-0000,other,Contact {i}")?;
    }

    let sink = Arc::new(RecordingSink::default());
    let session = ImportSession::new(ImportSchema::vendors(), FirmId::new("firm-1"), sink.clone());

    let preview = session.select_file(&path).await?;
    assert_eq!(preview.rows.len(), 5);
    assert_eq!(preview.total, 100_000);

    let report = session.submit("vendor-9").await?;
    assert_eq!(report.accepted, 100_000);
    assert!(report.rejected.is_empty());
    assert_eq!(sink.rows.lock().unwrap().len(), 100_000);
    Ok(())
}

#[tokio::test]
async fn reset_clears_a_finished_session() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("vendors.csv");
    let mut f = File::create(&path)?;
    writeln!(f, "name,email,category")?;
    writeln!(f, "Acme,sales@acme.io,supplier")?;

    let session = ImportSession::new(
        ImportSchema::vendors(),
        FirmId::new("firm-1"),
        RecordingSink::default(),
    );
    session.select_file(&path).await?;
    session.submit("vendor-9").await?;
    assert_eq!(session.state(), SessionState::Succeeded);

    let err = session.select_file(&path).await.unwrap_err();
    assert!(matches!(err, ImportError::AlreadyCompleted));

    session.reset();
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.report().is_none());
    session.select_file(&path).await?;
    let report = session.submit("vendor-10").await?;
    assert_eq!(report.accepted, 1);
    Ok(())
}
