use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Row id of a company ("empresa"); companies are also the tenants.
    CompanyId
);
define_id!(
    /// Row id of an asset category within a tenant.
    CategoryId
);
define_id!(
    /// Row id of a site ("sede") within a tenant.
    SedeId
);
define_id!(
    /// Row id of an inventory item.
    ItemId
);
