use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CategoryId, CompanyId, ItemId, SedeId};

/// A company ("empresa"). Companies are the tenants of the system and also
/// the owning records of client codes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Short alphanumeric prefix used in this tenant's asset codes.
    pub prefix: String,
    /// Issued client code, e.g. `CLI-003`. Immutable after creation.
    pub client_code: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request to register a company.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub prefix: String,
}

/// An asset classification scoped to one tenant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub tenant: CompanyId,
    pub name: String,
    /// Short alphanumeric prefix used in asset codes of this category.
    pub prefix: String,
}

/// A site ("sede") of a tenant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sede {
    pub id: SedeId,
    pub tenant: CompanyId,
    pub name: String,
}

/// An inventory asset carrying an issued code.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub tenant: CompanyId,
    pub sede: Option<SedeId>,
    pub category: CategoryId,
    pub name: String,
    /// Issued asset code, e.g. `OBR-PC0002`. Immutable after creation.
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request to create an inventory item. The category is referenced by name
/// and matched case-insensitively.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub tenant: CompanyId,
    pub sede: Option<SedeId>,
    pub category: String,
    pub name: String,
}
