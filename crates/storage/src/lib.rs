use directories::ProjectDirs;
use doc_model::{ConfigError, PhraseConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const PHRASES_SCHEMA_VERSION: u32 = 1;

const PHRASES_FILE: &str = "phrases.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve configuration directory")]
    NoConfigDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported phrase configuration version {found} (expected {})", PHRASES_SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("invalid phrase configuration: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhrasesEnvelope {
    version: u32,
    references: PhraseConfig,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "citemark", "citemark")
            .ok_or(StorageError::NoConfigDirectory)?;

        Ok(Self { root: dirs.config_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phrases_path(&self) -> PathBuf {
        self.root.join(PHRASES_FILE)
    }

    /// Loads the stored configuration, or an empty one if none was saved.
    pub fn load_phrase_config(&self) -> Result<PhraseConfig, StorageError> {
        let path = self.phrases_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no stored phrase configuration");
            return Ok(PhraseConfig::default());
        }

        load_phrase_config(&path)
    }

    pub fn save_phrase_config(&self, config: &PhraseConfig) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        save_phrase_config(&self.phrases_path(), config)
    }
}

/// Reads and validates a phrase configuration file.
pub fn load_phrase_config(path: &Path) -> Result<PhraseConfig, StorageError> {
    let bytes = fs::read(path)?;
    let config = parse_phrase_config(&bytes)?;
    tracing::debug!(path = %path.display(), references = config.len(), "loaded phrase configuration");

    Ok(config)
}

pub fn parse_phrase_config(bytes: &[u8]) -> Result<PhraseConfig, StorageError> {
    let probe: VersionProbe = serde_json::from_slice(bytes)?;
    if probe.version != PHRASES_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion { found: probe.version });
    }

    let envelope: PhrasesEnvelope = serde_json::from_slice(bytes)?;
    envelope.references.validate()?;

    Ok(envelope.references)
}

pub fn save_phrase_config(path: &Path, config: &PhraseConfig) -> Result<(), StorageError> {
    config.validate()?;

    let envelope = PhrasesEnvelope { version: PHRASES_SCHEMA_VERSION, references: config.clone() };

    let bytes = serde_json::to_vec_pretty(&envelope)?;
    fs::write(path, bytes)?;
    Ok(())
}
