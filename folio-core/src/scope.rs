use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CategoryId, CompanyId};

/// Key a sequence ledger row and a gap scan are bound to.
///
/// Asset codes are numbered per (tenant, category); client codes share one
/// tenant-wide scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeScope {
    Asset {
        tenant: CompanyId,
        category: CategoryId,
    },
    Client,
}

impl CodeScope {
    /// Composite key of the backing ledger row. The client scope uses the
    /// reserved pair `(0, 0)`; row ids start at 1, so it cannot collide.
    pub fn ledger_key(self) -> (i64, i64) {
        match self {
            CodeScope::Asset { tenant, category } => (tenant.0, category.0),
            CodeScope::Client => (0, 0),
        }
    }

    /// Inverse of [`ledger_key`](Self::ledger_key).
    pub fn from_ledger_key(tenant_id: i64, category_id: i64) -> Self {
        if tenant_id == 0 && category_id == 0 {
            CodeScope::Client
        } else {
            CodeScope::Asset {
                tenant: CompanyId(tenant_id),
                category: CategoryId(category_id),
            }
        }
    }
}

impl fmt::Display for CodeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeScope::Asset { tenant, category } => write!(f, "asset:{tenant}:{category}"),
            CodeScope::Client => f.write_str("client"),
        }
    }
}
