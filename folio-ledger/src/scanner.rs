//! Live-code scanning and the next-number policy.

use std::collections::BTreeSet;

use rusqlite::{params, Transaction};

use folio_core::{CodeFormat, CodeScope};

use crate::SequenceResult;

/// Numeric suffixes currently in use by live codes of `scope`.
///
/// Only strings conforming to `format` count; anything else in the code
/// column (legacy data, foreign prefixes) is ignored.
pub fn live_numbers(
    tx: &Transaction<'_>,
    scope: CodeScope,
    format: &CodeFormat,
) -> SequenceResult<BTreeSet<u32>> {
    let mut stmt;
    let mut rows = match scope {
        CodeScope::Asset { tenant, category } => {
            stmt = tx.prepare(
                "SELECT code FROM inventory_items
                 WHERE tenant_id = ?1 AND category_id = ?2 AND deleted_at IS NULL",
            )?;
            stmt.query(params![tenant.0, category.0])?
        }
        CodeScope::Client => {
            stmt = tx.prepare("SELECT client_code FROM companies WHERE deleted_at IS NULL")?;
            stmt.query([])?
        }
    };
    let mut numbers = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let code: String = row.get(0)?;
        if let Some(number) = format.parse(&code) {
            numbers.insert(number);
        }
    }
    Ok(numbers)
}

/// Highest live suffix in `scope`, or 0 when none exist.
pub fn max_live(
    tx: &Transaction<'_>,
    scope: CodeScope,
    format: &CodeFormat,
) -> SequenceResult<u32> {
    Ok(live_numbers(tx, scope, format)?
        .iter()
        .next_back()
        .copied()
        .unwrap_or(0))
}

/// Choose the next suffix to issue: the smallest positive integer not
/// currently live.
///
/// Gaps left by deleted intermediate records are therefore filled in
/// ascending order before the sequence advances past the current maximum,
/// and deleting the highest-numbered record makes exactly that number the
/// next one issued (tail reissue). A live number is never offered, so the
/// current maximum stays untouchable while its record exists.
pub fn pick_next(live: &BTreeSet<u32>) -> u32 {
    let mut candidate = 1u32;
    for &number in live {
        if number < candidate {
            // a parsed zero suffix never blocks issuance
            continue;
        }
        if number > candidate {
            break;
        }
        candidate = number + 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger, SqliteCodeStore};
    use chrono::Utc;
    use folio_core::{CategoryId, CompanyId};
    use tempfile::tempdir;

    fn set(numbers: &[u32]) -> BTreeSet<u32> {
        numbers.iter().copied().collect()
    }

    #[test]
    fn picks_one_for_fresh_scopes() {
        assert_eq!(pick_next(&set(&[])), 1);
    }

    #[test]
    fn fills_the_lowest_gap_first() {
        assert_eq!(pick_next(&set(&[1, 3, 4])), 2);
        assert_eq!(pick_next(&set(&[2, 3])), 1);
        assert_eq!(pick_next(&set(&[1, 2, 4, 6])), 3);
    }

    #[test]
    fn advances_past_a_dense_prefix() {
        assert_eq!(pick_next(&set(&[1, 2, 3])), 4);
    }

    #[test]
    fn reissues_a_freed_tail() {
        // {1,2,3,4} with 4 deleted
        assert_eq!(pick_next(&set(&[1, 2, 3])), 4);
        // gap fill takes priority when both a gap and a freed tail exist
        assert_eq!(pick_next(&set(&[1, 3])), 2);
    }

    #[test]
    fn ignores_zero_suffixes() {
        assert_eq!(pick_next(&set(&[0, 1, 2])), 3);
    }

    #[test]
    fn full_scopes_exceed_the_format_cap() {
        let full: BTreeSet<u32> = (1..=999).collect();
        assert!(pick_next(&full) > folio_core::CodeFormat::client().max_number());
    }

    #[test]
    fn scan_skips_non_conforming_codes() {
        let dir = tempdir().unwrap();
        let store = SqliteCodeStore::open(dir.path().join("folio.db")).unwrap();
        let tenant = CompanyId(1);
        let category = CategoryId(1);
        let scope = CodeScope::Asset { tenant, category };
        let format = folio_core::CodeFormat::asset("OBR", "PC");
        store
            .with_write_txn(|tx| {
                ledger::get_or_create(tx, scope)?;
                let now = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT INTO companies (id, name, prefix, client_code, created_at)
                     VALUES (?1, 'Obras SA', 'OBR', 'CLI-001', ?2)",
                    params![tenant.0, now],
                )
                .map_err(crate::SequenceError::from)?;
                tx.execute(
                    "INSERT INTO categories (id, tenant_id, name, prefix)
                     VALUES (?1, ?2, 'PC', 'PC')",
                    params![category.0, tenant.0],
                )
                .map_err(crate::SequenceError::from)?;
                for (code, deleted) in [
                    ("OBR-PC0001", false),
                    ("OBR-PC0002", true), // soft-deleted: not live
                    ("OBR-PC0004", false),
                    ("OBR-LT0003", false), // different category prefix
                    ("legacy-tag", false), // not a code at all
                ] {
                    tx.execute(
                        "INSERT INTO inventory_items
                             (tenant_id, sede_id, category_id, name, code, created_at, deleted_at)
                         VALUES (?1, NULL, ?2, 'x', ?3, ?4, ?5)",
                        params![
                            tenant.0,
                            category.0,
                            code,
                            now,
                            deleted.then(|| now.clone())
                        ],
                    )
                    .map_err(crate::SequenceError::from)?;
                }
                let live = live_numbers(tx, scope, &format)?;
                assert_eq!(live, set(&[1, 4]));
                assert_eq!(max_live(tx, scope, &format)?, 4);
                assert_eq!(pick_next(&live), 2);
                Ok(())
            })
            .unwrap();
    }
}
