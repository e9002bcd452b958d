//! Status command implementation

use anyhow::{Context, Result};
use tm_migrate::StatusReport;

use crate::cli::{GlobalArgs, StatusArgs};
use crate::commands::common::{format_timestamp, load_session};

/// Execute the status command
pub fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let repo = session.repository()?;
    let mut conn = session.connect()?;

    let report = tm_migrate::status(conn.as_mut(), &repo, &session.tracker())
        .context("Failed to read migration status")?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize to JSON")?;
        println!("{}", json);
    } else {
        print_table(&report);
    }
    Ok(())
}

fn print_table(report: &StatusReport) {
    let name_width = report
        .units
        .iter()
        .map(|u| u.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{:<8} {:<name_width$} {:<15} APPLIED",
        "VERSION", "NAME", "MODE"
    );
    for unit in &report.units {
        let mut applied = match unit.applied_at {
            Some(ts) => format_timestamp(ts),
            None => "pending".to_string(),
        };
        if unit.reconciled {
            applied.push_str(" (reconciled)");
        }
        if unit.checksum_drift {
            applied.push_str(" (changed since applied)");
        }
        println!(
            "{:<8} {:<name_width$} {:<15} {}",
            unit.version.to_string(),
            unit.name,
            unit.mode.as_str(),
            applied
        );
    }

    for record in &report.unknown {
        println!(
            "{:<8} {:<name_width$} {:<15} {} (not in repository)",
            record.version.to_string(),
            record.name,
            "-",
            format_timestamp(record.applied_at)
        );
    }

    let pending = report.pending().count();
    println!();
    println!(
        "{} migration(s), {} pending",
        report.units.len(),
        pending
    );
}
