use crate::error::{Result, SyncError};
use crate::types::{EntityKind, IndexTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_REINDEX_THRESHOLD: usize = 20;
pub const DEFAULT_BULK_BATCH_SIZE: usize = 500;
pub const DEFAULT_REINDEX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Every index the lifecycle manager drives (comma-separated in env form).
    pub index_names: Vec<String>,
    pub concept_index: String,
    pub vocabulary_index: String,
    pub concept_mapping_type: Option<String>,
    pub vocabulary_mapping_type: Option<String>,
    pub delete_index_on_restart: bool,
    pub vocabulary_reindex_threshold: usize,
    pub concept_reindex_threshold: usize,
    pub bulk_batch_size: usize,
    pub reindex_concurrency: usize,
    pub index_settings_file: Option<PathBuf>,
    pub index_mapping_file: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            index_names: vec!["concepts".to_string(), "vocabularies".to_string()],
            concept_index: "concepts".to_string(),
            vocabulary_index: "vocabularies".to_string(),
            concept_mapping_type: Some("concept".to_string()),
            vocabulary_mapping_type: Some("vocabulary".to_string()),
            delete_index_on_restart: false,
            vocabulary_reindex_threshold: DEFAULT_REINDEX_THRESHOLD,
            concept_reindex_threshold: DEFAULT_REINDEX_THRESHOLD,
            bulk_batch_size: DEFAULT_BULK_BATCH_SIZE,
            reindex_concurrency: DEFAULT_REINDEX_CONCURRENCY,
            index_settings_file: None,
            index_mapping_file: None,
        }
    }
}

/// Split a comma-separated index list, trimming blanks.
pub fn parse_index_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl SyncConfig {
    /// Load sync configuration from {dir}/termsync.json, or build it from
    /// `TERMSYNC_*` environment variables on top of the defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_json = dir.join("termsync.json");

        if config_json.exists() {
            match std::fs::read_to_string(&config_json) {
                Ok(content) => match serde_json::from_str::<SyncConfig>(&content) {
                    Ok(config) => {
                        tracing::info!(
                            "Loaded sync config: indices={:?}, batch_size={}",
                            config.index_names,
                            config.bulk_batch_size
                        );
                        return config;
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse termsync.json: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read termsync.json: {}, using defaults", e);
                }
            }
        }

        let mut config = SyncConfig::default();

        if let Ok(raw) = std::env::var("TERMSYNC_INDEX_NAMES") {
            config.index_names = parse_index_names(&raw);
        }
        if let Ok(name) = std::env::var("TERMSYNC_CONCEPT_INDEX") {
            config.concept_index = name;
        }
        if let Ok(name) = std::env::var("TERMSYNC_VOCABULARY_INDEX") {
            config.vocabulary_index = name;
        }
        if let Ok(ty) = std::env::var("TERMSYNC_MAPPING_TYPE") {
            config.concept_mapping_type = Some(ty).filter(|s| !s.trim().is_empty());
        }
        if let Ok(ty) = std::env::var("TERMSYNC_VOCABULARY_MAPPING_TYPE") {
            config.vocabulary_mapping_type = Some(ty).filter(|s| !s.trim().is_empty());
        }
        if let Ok(flag) = std::env::var("TERMSYNC_DELETE_INDEX_ON_RESTART") {
            config.delete_index_on_restart = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Some(n) = env_usize("TERMSYNC_REINDEX_THRESHOLD") {
            config.vocabulary_reindex_threshold = n;
            config.concept_reindex_threshold = n;
        }
        if let Some(n) = env_usize("TERMSYNC_BULK_BATCH_SIZE") {
            config.bulk_batch_size = n;
        }
        if let Some(n) = env_usize("TERMSYNC_REINDEX_CONCURRENCY") {
            config.reindex_concurrency = n;
        }
        if let Ok(path) = std::env::var("TERMSYNC_INDEX_FILE") {
            config.index_settings_file = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("TERMSYNC_MAPPING_FILE") {
            config.index_mapping_file = Some(PathBuf::from(path));
        }

        tracing::info!(
            "No termsync.json found, using environment/defaults: indices={:?}",
            config.index_names
        );
        config
    }

    /// Structural checks that must pass before any index is touched.
    pub fn validate(&self) -> Result<()> {
        if self.index_names.is_empty() {
            return Err(SyncError::Config("no index names configured".to_string()));
        }
        if self.bulk_batch_size == 0 {
            return Err(SyncError::Config(
                "bulk_batch_size must be greater than zero".to_string(),
            ));
        }
        // Writes may only go to indices the lifecycle creates and maps.
        for (role, index) in [
            ("concept_index", &self.concept_index),
            ("vocabulary_index", &self.vocabulary_index),
        ] {
            if !self.index_names.contains(index) {
                return Err(SyncError::Config(format!(
                    "{} '{}' is not in index_names {:?}",
                    role, index, self.index_names
                )));
            }
        }
        if self.concept_index == self.vocabulary_index {
            return Err(SyncError::Config(format!(
                "concept_index and vocabulary_index both name '{}'",
                self.concept_index
            )));
        }
        Ok(())
    }

    pub fn concept_target(&self) -> IndexTarget {
        IndexTarget::new(&self.concept_index, self.concept_mapping_type.clone())
    }

    pub fn vocabulary_target(&self) -> IndexTarget {
        IndexTarget::new(&self.vocabulary_index, self.vocabulary_mapping_type.clone())
    }

    /// Collections share the concept index.
    pub fn target_for(&self, kind: EntityKind) -> IndexTarget {
        match kind {
            EntityKind::Concept | EntityKind::Collection => self.concept_target(),
            EntityKind::Vocabulary => self.vocabulary_target(),
        }
    }

    pub fn mapping_type_for(&self, index: &str) -> Option<&str> {
        if index == self.vocabulary_index {
            self.vocabulary_mapping_type.as_deref()
        } else {
            self.concept_mapping_type.as_deref()
        }
    }

    /// Body for index creation: the configured settings file, or the built-in default.
    pub fn index_settings(&self) -> Result<serde_json::Value> {
        match &self.index_settings_file {
            Some(path) => read_json_file(path),
            None => Ok(serde_json::json!({
                "settings": {
                    "number_of_shards": 1,
                    "analysis": {
                        "normalizer": {
                            "lowercase_normalizer": {
                                "type": "custom",
                                "filter": ["lowercase"]
                            }
                        }
                    }
                }
            })),
        }
    }

    /// Body for mapping creation: the configured mapping file, or the built-in default.
    pub fn index_mapping(&self) -> Result<serde_json::Value> {
        match &self.index_mapping_file {
            Some(path) => read_json_file(path),
            None => Ok(serde_json::json!({
                "properties": {
                    "id": { "type": "keyword" },
                    "vocabulary": {
                        "properties": { "id": { "type": "keyword" } }
                    },
                    "broader": { "type": "keyword" },
                    "narrower": { "type": "keyword" },
                    "members": { "type": "keyword" }
                }
            })),
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn read_json_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}
