//! Typed settings for Folio components, layered from defaults, an optional
//! TOML file, and `FOLIO_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Storage settings for the code store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// Bound on write-lock wait before issuance fails with a lock timeout.
    pub busy_timeout_ms: u64,
}

impl StoreSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Settings for the code assigner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssignerSettings {
    /// Full-transaction attempts before a code collision is surfaced.
    pub retry_budget: u32,
}

/// Root settings document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    pub assigner: AssignerSettings,
}

impl Settings {
    /// Load settings, layering an optional file over built-in defaults and
    /// applying `FOLIO_*` environment overrides (e.g.
    /// `FOLIO_STORE__BUSY_TIMEOUT_MS=250`).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("store.path", "folio.db")?
            .set_default("store.busy_timeout_ms", 5_000i64)?
            .set_default("assigner.retry_budget", 3i64)?;
        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }
        builder
            .add_source(Environment::with_prefix("FOLIO").separator("__"))
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                path: PathBuf::from("folio.db"),
                busy_timeout_ms: 5_000,
            },
            assigner: AssignerSettings { retry_budget: 3 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.store.path, PathBuf::from("folio.db"));
        assert_eq!(settings.store.busy_timeout(), Duration::from_secs(5));
        assert_eq!(settings.assigner.retry_budget, 3);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        let rendered = toml::to_string(&Settings {
            store: StoreSettings {
                path: PathBuf::from("/var/lib/folio/codes.db"),
                busy_timeout_ms: 250,
            },
            assigner: AssignerSettings { retry_budget: 5 },
        })
        .unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(rendered.as_bytes()).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.store.path, PathBuf::from("/var/lib/folio/codes.db"));
        assert_eq!(settings.store.busy_timeout(), Duration::from_millis(250));
        assert_eq!(settings.assigner.retry_budget, 5);
    }
}
