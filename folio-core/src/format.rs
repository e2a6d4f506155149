use serde::{Deserialize, Serialize};

/// Literal prefix every client code carries, regardless of tenant.
pub const CLIENT_PREFIX: &str = "CLI-";

/// Width of the numeric suffix on asset codes.
pub const ASSET_WIDTH: u32 = 4;

/// Width of the numeric suffix on client codes.
pub const CLIENT_WIDTH: u32 = 3;

/// Grammar of one formatted code family.
///
/// A code is `<prefix><suffix>` where `suffix` is exactly `width` ASCII
/// digits, zero padded. Asset codes use `<tenant_prefix>-<category_prefix>`
/// as the prefix with a 4-digit suffix (`OBR-PC0002`); client codes use the
/// fixed `CLI-` prefix with a 3-digit suffix (`CLI-003`). Anything else —
/// wrong prefix, wrong suffix length, non-digit characters — is not a code
/// of this family and is ignored by the scanner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFormat {
    prefix: String,
    width: u32,
}

impl CodeFormat {
    pub fn new(prefix: impl Into<String>, width: u32) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    /// Format for asset codes of one (tenant, category) scope.
    pub fn asset(tenant_prefix: &str, category_prefix: &str) -> Self {
        Self::new(format!("{tenant_prefix}-{category_prefix}"), ASSET_WIDTH)
    }

    /// Format for tenant-wide client codes.
    pub fn client() -> Self {
        Self::new(CLIENT_PREFIX, CLIENT_WIDTH)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Largest suffix this format can represent without widening.
    pub fn max_number(&self) -> u32 {
        10u32.pow(self.width) - 1
    }

    /// Render `number` as a formatted code string.
    pub fn render(&self, number: u32) -> String {
        format!(
            "{prefix}{number:0width$}",
            prefix = self.prefix,
            width = self.width as usize
        )
    }

    /// Extract the numeric suffix of `code`, or `None` when `code` does not
    /// conform to this format.
    pub fn parse(&self, code: &str) -> Option<u32> {
        let suffix = code.strip_prefix(self.prefix.as_str())?;
        if suffix.len() != self.width as usize {
            return None;
        }
        if !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }
}
