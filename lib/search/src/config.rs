use crate::resolver::DEFAULT_CUTOFF;
use cinex_core::{ComposerConfig, Error, Result};
use cinex_storage::artifacts::{DEFAULT_INDEX_FILE, DEFAULT_METADATA_FILE};
use cinex_storage::ArtifactPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration, read from a JSON file or built from defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Directory holding both persisted artifacts
    pub data_dir: PathBuf,
    pub index_file: String,
    pub metadata_file: String,
    pub composer: ComposerConfig,
    /// Default result count for similarity queries
    pub similar_k: usize,
    /// Default result count for description queries
    pub description_k: usize,
    pub title_cutoff: u8,
    pub encoder_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            index_file: DEFAULT_INDEX_FILE.to_string(),
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            composer: ComposerConfig::default(),
            similar_k: 10,
            description_k: 5,
            title_cutoff: DEFAULT_CUTOFF,
            encoder_timeout_ms: 10_000,
        }
    }
}

impl SearchConfig {
    /// Load a config file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: SearchConfig =
            serde_json::from_str(&contents).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.composer.validate()?;
        if self.title_cutoff > 100 {
            return Err(Error::InvalidConfig(format!(
                "title_cutoff must be within 0-100, got {}",
                self.title_cutoff
            )));
        }
        if self.encoder_timeout_ms == 0 {
            return Err(Error::InvalidConfig("encoder_timeout_ms must be positive".to_string()));
        }
        if self.index_file.is_empty() || self.metadata_file.is_empty() {
            return Err(Error::InvalidConfig("artifact file names must not be empty".to_string()));
        }
        if self.index_file == self.metadata_file {
            return Err(Error::InvalidConfig(
                "index_file and metadata_file must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(
            self.data_dir.join(&self.index_file),
            self.data_dir.join(&self.metadata_file),
        )
    }

    #[inline]
    pub fn encoder_timeout(&self) -> Duration {
        Duration::from_millis(self.encoder_timeout_ms)
    }
}
