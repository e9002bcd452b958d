//! Reset command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, ResetArgs};
use crate::commands::common::{load_session, ExitCode};

/// Execute the reset command
pub fn execute(args: &ResetArgs, global: &GlobalArgs) -> Result<()> {
    let scope = match args.from {
        Some(version) => format!("{version} and later"),
        None => "every version".to_string(),
    };
    if !args.yes {
        eprintln!(
            "Refusing to forget {} without --yes. The schema is not changed; \
             the affected migrations will run again on the next migrate.",
            scope
        );
        return Err(ExitCode(1).into());
    }

    let session = load_session(global)?;
    let mut conn = session.connect()?;
    let removed = session
        .tracker()
        .reset(conn.as_mut(), args.from)
        .context("Failed to reset the ledger")?;

    log::warn!("Ledger reset ({scope}): {removed} record(s) removed");
    println!("Removed {} ledger record(s) ({})", removed, scope);
    Ok(())
}
