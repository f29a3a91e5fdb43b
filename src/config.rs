//! Process-wide, non-algorithmic configuration: worker pool sizing,
//! per-block concurrency cap, plan-cache byte budget, compression
//! selection. Grounded on the teacher's `FecConfig`/`AppConfig`
//! (`from_toml`/`from_file`/`validate` trio).

use serde::Deserialize;
use std::path::Path;

use crate::cache::Compress;
use crate::error::{RaptorqError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RaptorqConfig {
    /// Number of OS threads in the shared solve pool.
    pub threads: usize,
    /// Maximum number of concurrent `decode()` workers admitted per block.
    pub max_block_concurrency: usize,
    /// Plan-cache byte budget (`DLF::resize`/`local_cache_size`).
    pub plan_cache_bytes: usize,
    /// Compression applied to cached plans.
    pub compression: Compress,
}

impl Default for RaptorqConfig {
    fn default() -> Self {
        RaptorqConfig {
            threads: 4,
            max_block_concurrency: 2,
            plan_cache_bytes: 16 * 1024 * 1024,
            compression: Compress::None,
        }
    }
}

impl RaptorqConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RaptorqError::initialization(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RaptorqError::initialization(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(RaptorqError::initialization("threads must be >= 1"));
        }
        if self.max_block_concurrency == 0 {
            return Err(RaptorqError::initialization(
                "max_block_concurrency must be >= 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RaptorqConfig::default().validate().is_ok());
    }

    #[test]
    fn from_toml_overrides_defaults() {
        let cfg = RaptorqConfig::from_toml("threads = 8\nmax_block_concurrency = 4\n").unwrap();
        assert_eq!(cfg.threads, 8);
        assert_eq!(cfg.max_block_concurrency, 4);
        assert_eq!(cfg.plan_cache_bytes, RaptorqConfig::default().plan_cache_bytes);
    }

    #[test]
    fn zero_threads_fails_validation() {
        let cfg = RaptorqConfig::from_toml("threads = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
