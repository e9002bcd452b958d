//! Decides whether a failed statement may count as applied.
//!
//! Only the error class is inspected. A duplicate-object failure is
//! ignorable when the unit tolerates it: best-effort units always do,
//! natively guarded units only for statements whose guard is reconciliation
//! (a dialect that cannot express `IF NOT EXISTS` for that change).
//! Unguarded units never reconcile.

use tm_db::DbError;
use tm_sql::Guard;

use crate::unit::IdempotencyMode;

/// Outcome of classifying a statement failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Abort the unit
    Fatal,
    /// The change is already present; treat the statement as applied
    IgnorableDuplicate,
}

/// Whether a duplicate failure of a statement with `guard` may be
/// reconciled in a unit with `mode`
pub fn may_reconcile(mode: IdempotencyMode, guard: Guard) -> bool {
    match mode {
        IdempotencyMode::BestEffort => true,
        IdempotencyMode::NativeGuarded => guard == Guard::Reconcile,
        IdempotencyMode::Unguarded => false,
    }
}

pub fn classify(err: &DbError, mode: IdempotencyMode, guard: Guard) -> Reconciliation {
    if err.class().is_duplicate() && may_reconcile(mode, guard) {
        Reconciliation::IgnorableDuplicate
    } else {
        Reconciliation::Fatal
    }
}
