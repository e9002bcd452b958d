//! Plan command implementation

use anyhow::{Context, Result};
use tm_migrate::{plan_unit, MigrationRunner, PlannedUnit};
use tm_sql::dialect_for;

use crate::cli::{GlobalArgs, PlanArgs};
use crate::commands::common::load_session;

/// Execute the plan command
pub fn execute(args: &PlanArgs, global: &GlobalArgs) -> Result<()> {
    let session = load_session(global)?;
    let repo = session.repository()?;

    let plans: Vec<PlannedUnit> = if args.all {
        let adapter = dialect_for(session.dialect());
        repo.list()
            .iter()
            .map(|unit| plan_unit(unit, adapter.as_ref()))
            .collect::<Result<_, _>>()
            .context("Failed to render migrations")?
    } else {
        let mut conn = session.connect()?;
        MigrationRunner::new(session.config.clone())
            .plan(conn.as_mut(), &repo)
            .context("Failed to plan pending migrations")?
    };

    if plans.is_empty() {
        println!("-- No pending migrations.");
        return Ok(());
    }

    for plan in &plans {
        println!(
            "-- {} {} ({}, {})",
            plan.version,
            plan.name,
            plan.mode,
            session.dialect()
        );
        for statement in &plan.statements {
            println!("{};", statement.sql);
        }
        println!();
    }
    Ok(())
}
