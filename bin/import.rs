use async_trait::async_trait;
use clap::{Arg, ArgAction, Command};
use csv_import::{
    CommitError, CommitReceipt, CommitRequest, CommitSink, FieldMode, FirmId, ImportKind,
    ImportSchema, ImportSession, SessionConfig,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Prints each commit request as one JSON line on stdout, standing in for
/// the REST backend. Human-readable output goes to stderr.
struct JsonLinesSink;

#[async_trait]
impl CommitSink for JsonLinesSink {
    async fn commit(&self, request: CommitRequest<'_>) -> Result<CommitReceipt, CommitError> {
        let body =
            serde_json::to_string(&request).map_err(|e| CommitError::Transport(e.to_string()))?;
        println!("{body}");
        Ok(CommitReceipt {
            accepted: request.rows.len(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("import")
        .about("Import a CSV file and emit the commit payload as JSON lines")
        .arg(
            Arg::new("path")
                .long("path")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("kind")
                .long("kind")
                .help("Import target: queries or vendors")
                .default_value("vendors"),
        )
        .arg(
            Arg::new("vendor")
                .long("vendor")
                .help("Vendor id the rows belong to")
                .required_unless_present("preview-only"),
        )
        .arg(Arg::new("firm").long("firm").default_value("firm-local"))
        .arg(
            Arg::new("naive")
                .long("naive")
                .help("Split fields on every comma instead of RFC 4180 quoting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_parser(clap::value_parser!(u64))
                .default_value("30"),
        )
        .arg(
            Arg::new("preview-only")
                .long("preview-only")
                .help("Stop after printing the preview")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let path = matches.get_one::<PathBuf>("path").unwrap();
    let kind: ImportKind = matches
        .get_one::<String>("kind")
        .unwrap()
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let config = SessionConfig {
        commit_timeout: Duration::from_secs(*matches.get_one::<u64>("timeout-secs").unwrap()),
        field_mode: if matches.get_flag("naive") {
            FieldMode::Naive
        } else {
            FieldMode::Quoted
        },
        ..SessionConfig::default()
    };
    let firm = FirmId::new(matches.get_one::<String>("firm").unwrap().clone());
    let session =
        ImportSession::with_config(ImportSchema::for_kind(kind), firm, JsonLinesSink, config);

    let start = Instant::now();
    let preview = session.select_file(path).await?;

    eprintln!("{}", preview.headers.join(","));
    for row in &preview.rows {
        eprintln!("{}", row.join(","));
    }
    if preview.total > preview.rows.len() {
        eprintln!("... {} more rows", preview.total - preview.rows.len());
    }
    if matches.get_flag("preview-only") {
        return Ok(());
    }

    let vendor = matches.get_one::<String>("vendor").unwrap();
    let report = session.submit(vendor).await?;
    for rejected in &report.rejected {
        let reasons = rejected
            .reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        warn!(row = rejected.row, line = rejected.line, %reasons, "row left out of commit");
    }

    let elapsed = start.elapsed().as_secs_f64();
    let rps = (report.total as f64) / elapsed.max(f64::EPSILON);
    eprintln!(
        "source={} kind={} accepted={} rejected={} total={}\nelapsed={:.1}s rows/sec={:.0}",
        path.display(),
        report.kind,
        report.accepted,
        report.rejected.len(),
        report.total,
        elapsed,
        rps
    );
    Ok(())
}
