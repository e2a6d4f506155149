//! Transactional, race-free code issuance.

use rusqlite::Transaction;
use tracing::{debug, warn};

use folio_core::{CodeFormat, CodeScope, Company, InventoryItem, NewCompany, NewInventoryItem};

use crate::{ledger, scanner, sqlite, SequenceError, SequenceResult, SqliteCodeStore};

/// Default number of full-transaction attempts before a residual code
/// collision is surfaced as [`SequenceError::Conflict`].
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Issues one code per creation request, atomically with the insert of the
/// owning record.
///
/// Each attempt runs as a single `BEGIN IMMEDIATE` transaction: lock the
/// scope's ledger row, scan live codes, pick the next number, insert the
/// record, raise the ledger, commit. Residual unique-index collisions and
/// transient storage failures retry the whole attempt up to the budget;
/// `NotFound` and `LockTimeout` surface immediately.
#[derive(Clone, Debug)]
pub struct CodeAssigner {
    store: SqliteCodeStore,
    retry_budget: u32,
}

impl CodeAssigner {
    pub fn new(store: SqliteCodeStore) -> Self {
        Self {
            store,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    /// Override the attempt budget. A budget of zero still makes one attempt.
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    pub fn store(&self) -> &SqliteCodeStore {
        &self.store
    }

    /// Create an inventory item, issuing its asset code. The category name
    /// is matched case-insensitively within the tenant.
    pub fn create_item(&self, request: &NewInventoryItem) -> SequenceResult<InventoryItem> {
        self.run(|| self.try_create_item(request))
    }

    /// Create a company, issuing its tenant-wide client code.
    pub fn create_company(&self, request: &NewCompany) -> SequenceResult<Company> {
        self.run(|| self.try_create_company(request))
    }

    fn run<T>(&self, mut attempt: impl FnMut() -> SequenceResult<T>) -> SequenceResult<T> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match attempt() {
                Err(SequenceError::Conflict { .. }) if attempts < self.retry_budget => {
                    warn!(attempts, "issued code collided with a concurrent writer; retrying");
                }
                Err(SequenceError::Conflict { .. }) => {
                    return Err(SequenceError::Conflict { attempts });
                }
                Err(SequenceError::Storage(reason)) if attempts < self.retry_budget => {
                    warn!(attempts, %reason, "transient storage failure; retrying");
                }
                other => return other,
            }
        }
    }

    fn try_create_item(&self, request: &NewInventoryItem) -> SequenceResult<InventoryItem> {
        self.store.with_write_txn(|tx| {
            let tenant_prefix = sqlite::live_tenant_prefix(tx, request.tenant)?
                .ok_or_else(|| SequenceError::NotFound(format!("tenant {}", request.tenant)))?;
            let category = sqlite::category_by_name(tx, request.tenant, &request.category)?
                .ok_or_else(|| {
                    SequenceError::NotFound(format!(
                        "category '{}' for tenant {}",
                        request.category, request.tenant
                    ))
                })?;
            if let Some(sede) = request.sede {
                if !sqlite::sede_belongs_to(tx, sede, request.tenant)? {
                    return Err(SequenceError::NotFound(format!(
                        "sede {sede} for tenant {}",
                        request.tenant
                    )));
                }
            }
            let scope = CodeScope::Asset {
                tenant: request.tenant,
                category: category.id,
            };
            let format = CodeFormat::asset(&tenant_prefix, &category.prefix);
            let code = issue(tx, scope, &format)?;
            sqlite::insert_item(tx, request, category.id, &code)
        })
    }

    fn try_create_company(&self, request: &NewCompany) -> SequenceResult<Company> {
        self.store.with_write_txn(|tx| {
            let code = issue(tx, CodeScope::Client, &CodeFormat::client())?;
            sqlite::insert_company(tx, request, &code)
        })
    }
}

/// One locked issuance round: ledger lock, live scan, pick, advance.
fn issue(tx: &Transaction<'_>, scope: CodeScope, format: &CodeFormat) -> SequenceResult<String> {
    let ledger_next = ledger::get_or_create(tx, scope)?;
    let live = scanner::live_numbers(tx, scope, format)?;
    let number = scanner::pick_next(&live);
    if number > format.max_number() {
        return Err(SequenceError::ScopeExhausted {
            prefix: format.prefix().to_string(),
            width: format.width(),
        });
    }
    let live_max = live.iter().next_back().copied().unwrap_or(0);
    debug!(
        %scope,
        ledger_next,
        number,
        reused_gap = number < live_max,
        "assigned code number"
    );
    ledger::advance_to(tx, scope, number + 1)?;
    Ok(format.render(number))
}
