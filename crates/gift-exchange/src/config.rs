//! Draw settings loaded via OrthoConfig.

use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::generator::{AssignmentGenerator, DEFAULT_MAX_ATTEMPTS};

const DEFAULT_STORE_DIR: &str = "sessions";

/// Configuration values controlling draws and session storage.
///
/// Values come from `GIFT_EXCHANGE_*` environment variables or a
/// configuration file; command-line flags override them.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "GIFT_EXCHANGE")]
pub struct DrawSettings {
    /// Attempts before a draw is reported as unsatisfiable.
    #[ortho_config(default = 1000)]
    pub max_attempts: usize,
    /// Fixed RNG seed for reproducible draws.
    pub seed: Option<u64>,
    /// Directory holding session documents.
    pub store_dir: Option<PathBuf>,
}

impl Default for DrawSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: None,
            store_dir: None,
        }
    }
}

impl DrawSettings {
    /// Return the configured store directory, falling back to the default.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))
    }

    /// Build a generator honouring the configured attempt budget.
    #[must_use]
    pub const fn generator(&self) -> AssignmentGenerator {
        AssignmentGenerator::new().with_max_attempts(self.max_attempts)
    }
}
