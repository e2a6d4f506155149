//! Out-of-band consistency check between the ledger and the live codes.

use rusqlite::Transaction;
use serde::Serialize;
use tracing::info;

use folio_core::{CodeFormat, CodeScope};

use crate::{ledger, scanner, sqlite, SequenceResult, SqliteCodeStore};

/// One ledger row whose counter had fallen behind the observed live
/// maximum, and the correction applied.
#[derive(Clone, Debug, Serialize)]
pub struct Finding {
    pub scope: CodeScope,
    pub ledger_next: u32,
    pub live_max: u32,
    pub corrected_to: u32,
}

/// Recompute every scope's live maximum and raise any ledger counter that
/// has fallen to or below it. Idempotent: a second run with no intervening
/// writes reports nothing. Only the ledger table is touched; issued codes
/// are never rewritten.
pub fn audit_all(store: &SqliteCodeStore) -> SequenceResult<Vec<Finding>> {
    store.with_write_txn(|tx| {
        let mut findings = Vec::new();
        for row in ledger::scopes(tx)? {
            let Some(format) = scope_format(tx, row.scope)? else {
                // prefixes no longer resolvable; nothing live to compare
                continue;
            };
            let live_max = scanner::max_live(tx, row.scope, &format)?;
            if row.next_number <= live_max {
                let corrected_to = live_max + 1;
                ledger::advance_to(tx, row.scope, corrected_to)?;
                info!(
                    scope = %row.scope,
                    ledger_next = row.next_number,
                    live_max,
                    corrected_to,
                    "sequence ledger had fallen behind; corrected"
                );
                findings.push(Finding {
                    scope: row.scope,
                    ledger_next: row.next_number,
                    live_max,
                    corrected_to,
                });
            }
        }
        Ok(findings)
    })
}

fn scope_format(tx: &Transaction<'_>, scope: CodeScope) -> SequenceResult<Option<CodeFormat>> {
    match scope {
        CodeScope::Client => Ok(Some(CodeFormat::client())),
        CodeScope::Asset { tenant, category } => {
            let Some(tenant_prefix) = sqlite::any_tenant_prefix(tx, tenant)? else {
                return Ok(None);
            };
            let Some(category_prefix) = sqlite::category_prefix(tx, category)? else {
                return Ok(None);
            };
            Ok(Some(CodeFormat::asset(&tenant_prefix, &category_prefix)))
        }
    }
}
