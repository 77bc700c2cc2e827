use clap::{Arg, Command};
use csv_import::{ImportKind, VENDOR_CATEGORIES};
use std::io::{self, Write};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("gen")
        .about("Generate a CSV fixture for the import pipeline")
        .arg(
            Arg::new("kind")
                .long("kind")
                .help("Import target: queries or vendors")
                .default_value("vendors"),
        )
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_parser(clap::value_parser!(u64))
                .required(true),
        )
        .arg(
            Arg::new("defect_every")
                .long("defect-every")
                .help("Make every Nth row invalid (0 = clean output)")
                .default_value("0"),
        )
        .get_matches();

    let kind: ImportKind = matches
        .get_one::<String>("kind")
        .unwrap()
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let rows: u64 = *matches.get_one("rows").unwrap();
    let defect_every: u64 = matches.get_one::<String>("defect_every").unwrap().parse()?;

    let mut out = io::BufWriter::new(io::stdout().lock());

    match kind {
        ImportKind::Queries => writeln!(&mut out, "name,category,description,scoreImpact")?,
        ImportKind::Vendors => writeln!(&mut out, "name,email,phone,category,contact")?,
    }

    for i in 0..rows {
        let defect = defect_every > 0 && i % defect_every == 0;
        match kind {
            ImportKind::Queries => write_query(&mut out, i, defect)?,
            ImportKind::Vendors => write_vendor(&mut out, i, defect)?,
        }
        if i % 10_000 == 0 {
            out.flush()?;
        } // keep buffers moving on huge runs
    }

    out.flush()?;
    Ok(())
}

fn write_query(out: &mut impl Write, i: u64, defect: bool) -> io::Result<()> {
    if defect {
        match i % 3 {
            0 => return writeln!(out, ",compliance,Missing the name field,{}", score(i)),
            1 => return writeln!(out, "Q{i:06},compliance,Bad score below,not-a-number"),
            _ => return writeln!(out, "Q{i:06},compliance"),
        }
    }
    // A comma inside a quoted description exercises the quoted parse mode.
    if i % 7 == 0 {
        writeln!(
            out,
            "Q{i:06},compliance,\"Checks supplier {i}, including audits\",{}",
            score(i)
        )
    } else {
        writeln!(out, "Q{i:06},compliance,Checks supplier {i},{}", score(i))
    }
}

fn write_vendor(out: &mut impl Write, i: u64, defect: bool) -> io::Result<()> {
    if defect {
        match i % 3 {
            0 => return writeln!(out, ",missing@name.example,+1-555-0000,other,Nobody"),
            1 => return writeln!(out, "Vendor {i:06},not-an-email,+1-555-0000,other,Nobody"),
            _ => return writeln!(out, "Vendor {i:06},short@row.example"),
        }
    }
    writeln!(
        out,
        "Vendor {i:06},contact{i}@vendor{i}.example,+1-555-{:04},{},Contact {i}",
        i % 10_000,
        VENDOR_CATEGORIES[(i as usize) % VENDOR_CATEGORIES.len()],
    )
}

fn score(i: u64) -> i64 {
    (i as i64 % 201) - 100
}
