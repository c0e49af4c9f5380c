//! Runtime configuration
//!
//! Settings come from the environment:
//! - `SPMC_KDF_ITERATIONS`: password hashing rounds
//! - `SPMC_CARD_DIR`: directory holding virtual card images

use std::path::PathBuf;

use log::warn;

use crate::card::CardImageStore;
use crate::crypto::DEFAULT_KDF_ITERATIONS;

pub const KDF_ITERATIONS_VAR: &str = "SPMC_KDF_ITERATIONS";
pub const CARD_DIR_VAR: &str = "SPMC_CARD_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub kdf_iterations: u32,
    pub card_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            card_dir: Self::default_card_dir(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(KDF_ITERATIONS_VAR) {
            match value.trim().parse::<u32>() {
                Ok(iterations) if iterations > 0 => config.kdf_iterations = iterations,
                _ => warn!(
                    "Ignoring {}={:?}, using {} rounds",
                    KDF_ITERATIONS_VAR, value, config.kdf_iterations
                ),
            }
        }

        if let Some(value) = lookup(CARD_DIR_VAR) {
            if value.trim().is_empty() {
                warn!("Ignoring empty {}, using {:?}", CARD_DIR_VAR, config.card_dir);
            } else {
                config.card_dir = PathBuf::from(value);
            }
        }

        config
    }

    /// Image store for the virtual card `name` in [`Config::card_dir`]
    pub fn card_store(&self, name: &str) -> CardImageStore {
        CardImageStore::new(&self.card_dir, name)
    }

    /// `~/.spmc`, or `/var/lib/spmc` without a home directory
    fn default_card_dir() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            return home.join(".spmc");
        }
        PathBuf::from("/var/lib/spmc")
    }
}
