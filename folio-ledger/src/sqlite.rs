use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use folio_core::{
    Category, CategoryId, CodeScope, Company, CompanyId, InventoryItem, ItemId, NewCompany,
    NewInventoryItem, Sede, SedeId,
};

use crate::error::is_unique_violation;
use crate::{SequenceError, SequenceResult};

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sequence_ledger (
    tenant_id INTEGER NOT NULL,
    category_id INTEGER NOT NULL,
    next_number INTEGER NOT NULL DEFAULT 1 CHECK (next_number >= 1),
    PRIMARY KEY (tenant_id, category_id)
);
CREATE TABLE IF NOT EXISTS companies (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    prefix TEXT NOT NULL,
    client_code TEXT NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS companies_live_client_code
    ON companies(client_code) WHERE deleted_at IS NULL;
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    tenant_id INTEGER NOT NULL REFERENCES companies(id),
    name TEXT NOT NULL COLLATE NOCASE,
    prefix TEXT NOT NULL,
    UNIQUE (tenant_id, name)
);
CREATE TABLE IF NOT EXISTS sedes (
    id INTEGER PRIMARY KEY,
    tenant_id INTEGER NOT NULL REFERENCES companies(id),
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS inventory_items (
    id INTEGER PRIMARY KEY,
    tenant_id INTEGER NOT NULL REFERENCES companies(id),
    sede_id INTEGER REFERENCES sedes(id),
    category_id INTEGER NOT NULL REFERENCES categories(id),
    name TEXT NOT NULL,
    code TEXT NOT NULL,
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS inventory_live_code
    ON inventory_items(tenant_id, category_id, code) WHERE deleted_at IS NULL;
"#;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed store holding the sequence ledger and the owning records.
///
/// A connection is opened per operation; write transactions run under
/// `BEGIN IMMEDIATE`, so concurrent assigners serialize on the database
/// write lock bounded by the busy timeout.
#[derive(Clone, Debug)]
pub struct SqliteCodeStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteCodeStore {
    pub fn open(path: impl Into<PathBuf>) -> SequenceResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the store with an explicit bound on lock-wait time.
    pub fn open_with_timeout(
        path: impl Into<PathBuf>,
        busy_timeout: Duration,
    ) -> SequenceResult<Self> {
        let store = Self {
            path: path.into(),
            busy_timeout,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn initialize_schema(&self) -> SequenceResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(STORE_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> SequenceResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;",
        )?;
        Ok(conn)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction. The write lock is
    /// held until commit or rollback; any error rolls back fully.
    pub fn with_write_txn<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> SequenceResult<T>,
    ) -> SequenceResult<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Register an asset category for `tenant`.
    pub fn add_category(
        &self,
        tenant: CompanyId,
        name: &str,
        prefix: &str,
    ) -> SequenceResult<Category> {
        let conn = self.connect()?;
        require_live_tenant(&conn, tenant)?;
        conn.execute(
            "INSERT INTO categories (tenant_id, name, prefix) VALUES (?1, ?2, ?3)",
            params![tenant.0, name, prefix],
        )?;
        Ok(Category {
            id: CategoryId(conn.last_insert_rowid()),
            tenant,
            name: name.to_string(),
            prefix: prefix.to_string(),
        })
    }

    /// Register a sede for `tenant`.
    pub fn add_sede(&self, tenant: CompanyId, name: &str) -> SequenceResult<Sede> {
        let conn = self.connect()?;
        require_live_tenant(&conn, tenant)?;
        conn.execute(
            "INSERT INTO sedes (tenant_id, name) VALUES (?1, ?2)",
            params![tenant.0, name],
        )?;
        Ok(Sede {
            id: SedeId(conn.last_insert_rowid()),
            tenant,
            name: name.to_string(),
        })
    }

    pub fn company(&self, id: CompanyId) -> SequenceResult<Option<Company>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, name, prefix, client_code, created_at, deleted_at
             FROM companies WHERE id = ?1",
            params![id.0],
            row_to_company,
        )
        .optional()
        .map_err(SequenceError::from)
    }

    pub fn item(&self, id: ItemId) -> SequenceResult<Option<InventoryItem>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, tenant_id, sede_id, category_id, name, code, created_at, deleted_at
             FROM inventory_items WHERE id = ?1",
            params![id.0],
            row_to_item,
        )
        .optional()
        .map_err(SequenceError::from)
    }

    /// Live (non-deleted) companies, in client-code order.
    pub fn live_companies(&self) -> SequenceResult<Vec<Company>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, prefix, client_code, created_at, deleted_at
             FROM companies WHERE deleted_at IS NULL ORDER BY client_code",
        )?;
        let rows = stmt.query_map([], row_to_company)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(SequenceError::from)
    }

    /// Live inventory of one tenant, in code order.
    pub fn live_items(&self, tenant: CompanyId) -> SequenceResult<Vec<InventoryItem>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, sede_id, category_id, name, code, created_at, deleted_at
             FROM inventory_items WHERE tenant_id = ?1 AND deleted_at IS NULL ORDER BY code",
        )?;
        let rows = stmt.query_map(params![tenant.0], row_to_item)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(SequenceError::from)
    }

    /// Soft-delete an item, freeing its code for gap-filling reuse. Returns
    /// whether a live row was deleted.
    pub fn delete_item(&self, id: ItemId) -> SequenceResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE inventory_items SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id.0, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Soft-delete a company, freeing its client code.
    pub fn delete_company(&self, id: CompanyId) -> SequenceResult<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "UPDATE companies SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id.0, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Current ledger counter for `scope`, if the row exists.
    pub fn sequence_value(&self, scope: CodeScope) -> SequenceResult<Option<u32>> {
        let conn = self.connect()?;
        let (tenant_id, category_id) = scope.ledger_key();
        conn.query_row(
            "SELECT next_number FROM sequence_ledger
             WHERE tenant_id = ?1 AND category_id = ?2",
            params![tenant_id, category_id],
            |row| row.get::<_, i64>(0).map(|n| n as u32),
        )
        .optional()
        .map_err(SequenceError::from)
    }
}

fn require_live_tenant(conn: &Connection, tenant: CompanyId) -> SequenceResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT id FROM companies WHERE id = ?1 AND deleted_at IS NULL",
            params![tenant.0],
            |row| row.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(SequenceError::NotFound(format!("tenant {tenant}"))),
    }
}

/// Prefix of a live tenant, for issuance.
pub(crate) fn live_tenant_prefix(
    tx: &Transaction<'_>,
    tenant: CompanyId,
) -> SequenceResult<Option<String>> {
    tx.query_row(
        "SELECT prefix FROM companies WHERE id = ?1 AND deleted_at IS NULL",
        params![tenant.0],
        |row| row.get(0),
    )
    .optional()
    .map_err(SequenceError::from)
}

/// Prefix of a tenant regardless of liveness, for the audit pass.
pub(crate) fn any_tenant_prefix(
    tx: &Transaction<'_>,
    tenant: CompanyId,
) -> SequenceResult<Option<String>> {
    tx.query_row(
        "SELECT prefix FROM companies WHERE id = ?1",
        params![tenant.0],
        |row| row.get(0),
    )
    .optional()
    .map_err(SequenceError::from)
}

/// Case-insensitive category lookup within a tenant.
pub(crate) fn category_by_name(
    tx: &Transaction<'_>,
    tenant: CompanyId,
    name: &str,
) -> SequenceResult<Option<Category>> {
    tx.query_row(
        "SELECT id, tenant_id, name, prefix FROM categories
         WHERE tenant_id = ?1 AND name = ?2",
        params![tenant.0, name],
        row_to_category,
    )
    .optional()
    .map_err(SequenceError::from)
}

pub(crate) fn category_prefix(
    tx: &Transaction<'_>,
    category: CategoryId,
) -> SequenceResult<Option<String>> {
    tx.query_row(
        "SELECT prefix FROM categories WHERE id = ?1",
        params![category.0],
        |row| row.get(0),
    )
    .optional()
    .map_err(SequenceError::from)
}

pub(crate) fn sede_belongs_to(
    tx: &Transaction<'_>,
    sede: SedeId,
    tenant: CompanyId,
) -> SequenceResult<bool> {
    let found: Option<i64> = tx
        .query_row(
            "SELECT id FROM sedes WHERE id = ?1 AND tenant_id = ?2",
            params![sede.0, tenant.0],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Insert the owning record of a freshly issued asset code. A unique-index
/// collision on the code column maps to `Conflict` so the assigner can
/// retry the whole transaction.
pub(crate) fn insert_item(
    tx: &Transaction<'_>,
    request: &NewInventoryItem,
    category: CategoryId,
    code: &str,
) -> SequenceResult<InventoryItem> {
    let created_at = Utc::now();
    tx.execute(
        "INSERT INTO inventory_items (tenant_id, sede_id, category_id, name, code, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            request.tenant.0,
            request.sede.map(|sede| sede.0),
            category.0,
            request.name,
            code,
            created_at.to_rfc3339()
        ],
    )
    .map_err(conflict_on_unique)?;
    Ok(InventoryItem {
        id: ItemId(tx.last_insert_rowid()),
        tenant: request.tenant,
        sede: request.sede,
        category,
        name: request.name.clone(),
        code: code.to_string(),
        created_at,
        deleted_at: None,
    })
}

/// Insert the owning record of a freshly issued client code.
pub(crate) fn insert_company(
    tx: &Transaction<'_>,
    request: &NewCompany,
    client_code: &str,
) -> SequenceResult<Company> {
    let created_at = Utc::now();
    tx.execute(
        "INSERT INTO companies (name, prefix, client_code, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            request.name,
            request.prefix,
            client_code,
            created_at.to_rfc3339()
        ],
    )
    .map_err(conflict_on_unique)?;
    Ok(Company {
        id: CompanyId(tx.last_insert_rowid()),
        name: request.name.clone(),
        prefix: request.prefix.clone(),
        client_code: client_code.to_string(),
        created_at,
        deleted_at: None,
    })
}

fn conflict_on_unique(err: rusqlite::Error) -> SequenceError {
    if is_unique_violation(&err) {
        SequenceError::Conflict { attempts: 1 }
    } else {
        SequenceError::from(err)
    }
}

fn row_to_company(row: &rusqlite::Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        id: CompanyId(row.get(0)?),
        name: row.get(1)?,
        prefix: row.get(2)?,
        client_code: row.get(3)?,
        created_at: parse_timestamp(row, 4)?,
        deleted_at: parse_optional_timestamp(row, 5)?,
    })
}

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId(row.get(0)?),
        tenant: CompanyId(row.get(1)?),
        name: row.get(2)?,
        prefix: row.get(3)?,
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: ItemId(row.get(0)?),
        tenant: CompanyId(row.get(1)?),
        sede: row.get::<_, Option<i64>>(2)?.map(SedeId),
        category: CategoryId(row.get(3)?),
        name: row.get(4)?,
        code: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
        deleted_at: parse_optional_timestamp(row, 7)?,
    })
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

fn parse_optional_timestamp(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn registry_rejects_unknown_tenants() {
        let dir = tempdir().unwrap();
        let store = SqliteCodeStore::open(dir.path().join("folio.db")).unwrap();
        let err = store.add_category(CompanyId(99), "PC", "PC").unwrap_err();
        assert!(matches!(err, SequenceError::NotFound(_)));
        let err = store.add_sede(CompanyId(99), "Central").unwrap_err();
        assert!(matches!(err, SequenceError::NotFound(_)));
    }

    #[test]
    fn soft_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SqliteCodeStore::open(dir.path().join("folio.db")).unwrap();
        // no such row: nothing deleted, no error
        assert!(!store.delete_item(ItemId(1)).unwrap());
        assert!(!store.delete_company(CompanyId(1)).unwrap());
    }
}
