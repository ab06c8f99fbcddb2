//! Print the analytics dashboard for the local store as JSON.
//!
//! Usage: leadflow-report [--source SOURCE] [--from RFC3339] [--to RFC3339]

use chrono::Utc;

use leadflow::analytics::{self, ReportFilter};
use leadflow::CrmDb;

fn parse_args() -> Result<ReportFilter, String> {
    let mut filter = ReportFilter::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| format!("{name} requires a value"))
        };
        match arg.as_str() {
            "--source" => filter.source = Some(value("--source")?),
            "--from" => {
                let raw = value("--from")?;
                filter.from = Some(
                    leadflow::util::parse_timestamp(&raw)
                        .ok_or_else(|| format!("invalid --from timestamp: {raw}"))?,
                );
            }
            "--to" => {
                let raw = value("--to")?;
                filter.to = Some(
                    leadflow::util::parse_timestamp(&raw)
                        .ok_or_else(|| format!("invalid --to timestamp: {raw}"))?,
                );
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(filter)
}

fn main() {
    env_logger::init();

    let filter = match parse_args() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let db = match CrmDb::open() {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    match analytics::dashboard(&db, &filter, Utc::now()) {
        Ok(board) => match serde_json::to_string_pretty(&board) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize dashboard: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Failed to build dashboard: {e}");
            std::process::exit(1);
        }
    }
}
