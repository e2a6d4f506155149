//! Core domain types shared across the Folio code-issuance service.

mod format;
mod ids;
mod records;
mod scope;

pub use format::CodeFormat;
pub use ids::{CategoryId, CompanyId, ItemId, SedeId};
pub use records::{Category, Company, InventoryItem, NewCompany, NewInventoryItem, Sede};
pub use scope::CodeScope;
