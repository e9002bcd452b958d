//! Migrate command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use tm_core::Version;
use tm_migrate::{MigrateError, MigrationReport, MigrationRepository, MigrationRunner};

use crate::cli::{GlobalArgs, MigrateArgs};
use crate::commands::common::{load_session, ExitCode};

/// Exit code when the schema needs manual repair before the next run
const EXIT_NEEDS_REPAIR: i32 = 2;

#[derive(Serialize)]
struct MigrateOutput<'a> {
    status: &'static str,
    dialect: &'static str,
    report: &'a MigrationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_while: Option<String>,
}

/// Execute the migrate command
pub fn execute(args: &MigrateArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let repo = session.repository()?;
    let mut conn = session.connect()?;

    if global.verbose {
        eprintln!(
            "[verbose] {} migration(s) for {} via {}",
            repo.len(),
            session.dialect(),
            conn.backend()
        );
    }

    let runner = MigrationRunner::new(session.config.clone());
    let (report, failure) = match runner.run(conn.as_mut(), &repo) {
        Ok(report) => (report, None),
        Err(failure) => (failure.report, Some((failure.error, failure.state))),
    };

    if args.json {
        let output = MigrateOutput {
            status: if failure.is_some() { "error" } else { "success" },
            dialect: session.dialect().as_str(),
            report: &report,
            error: failure.as_ref().map(|(e, _)| e.to_string()),
            failed_while: failure.as_ref().map(|(_, s)| s.to_string()),
        };
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize to JSON")?;
        println!("{}", json);
    } else {
        print_report(&report, &repo);
    }

    match failure {
        None => Ok(()),
        Some((error, state)) => {
            if !args.json {
                eprintln!();
                eprintln!("Migration failed while {}:", state);
                eprintln!("  {}", error);
            }
            let code = match error {
                MigrateError::PartialApplication { .. } | MigrateError::LedgerWrite { .. } => {
                    EXIT_NEEDS_REPAIR
                }
                _ => 1,
            };
            Err(ExitCode(code).into())
        }
    }
}

fn unit_name(repo: &MigrationRepository, version: Version) -> &str {
    repo.get(version).map(|u| u.name.as_str()).unwrap_or("?")
}

fn print_report(report: &MigrationReport, repo: &MigrationRepository) {
    if report.applied_versions.is_empty() {
        println!("Schema is up to date.");
    }
    for version in &report.applied_versions {
        println!("  Applied {} {}", version, unit_name(repo, *version));
    }
    for reconciled in &report.reconciled {
        println!(
            "  Reconciled {} statement {} ({})",
            reconciled.version, reconciled.statement_index, reconciled.class
        );
    }
    for version in &report.checksum_drift {
        println!(
            "  Warning: {} {} changed after it was applied",
            version,
            unit_name(repo, *version)
        );
    }
    println!();
    println!("{}", report.summary());
}

#[cfg(test)]
#[path = "migrate_test.rs"]
mod tests;
