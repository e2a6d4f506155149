//! Gap-filling sequential code issuance over a durable SQLite store.
//!
//! Asset codes (`OBR-PC0002`) and client codes (`CLI-003`) are assigned
//! transactionally: gaps left by deleted intermediate records are refilled
//! in ascending order, the highest-numbered code is reissued after its
//! record is deleted, and a per-scope sequence ledger keeps a monotone
//! high-water mark audited by [`audit_all`].

mod assigner;
mod audit;
mod error;
pub mod ledger;
pub mod scanner;
mod sqlite;

pub use assigner::{CodeAssigner, DEFAULT_RETRY_BUDGET};
pub use audit::{audit_all, Finding};
pub use error::{SequenceError, SequenceResult};
pub use ledger::LedgerRow;
pub use sqlite::SqliteCodeStore;
