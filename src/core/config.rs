//! Configuration management

use crate::core::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub scoring: ScoringConfig,
    pub similarity: SimilarityConfig,
    pub cache: CacheConfig,
    pub evidence: EvidenceConfig,
    pub deadline: DeadlineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Path fragments excluded regardless of .gitignore (dependency caches, build
    /// outputs, coverage outputs, minified artifacts, test fixtures, VCS internals).
    pub excluded_fragments: Vec<String>,
    /// Maximum file size to analyze (bytes)
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Shadow flag thresholds: shadow iff review_evidence < evidence_threshold
    /// and cognitive_load > load_threshold
    pub evidence_threshold: u8,
    pub load_threshold: u8,
    /// Feature weights for cognitive load, matching spec.md §4.5.
    pub weight_nesting: f64,
    pub weight_branches: f64,
    pub weight_boolean: f64,
    pub weight_callback_depth: f64,
    pub weight_identifier_ambiguity: f64,
    pub weight_context_switches: f64,
    pub weight_exception_irregularity: f64,
    pub weight_side_effects: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Jaccard threshold for non-component Units
    pub tau_default: f64,
    /// Jaccard threshold when both members are components (boilerplate tolerance)
    pub tau_component: f64,
    /// Number of MinHash permutations
    pub minhash_permutations: usize,
    /// Shingle size (token n-gram length)
    pub shingle_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for full-scan artifacts, in seconds
    pub full_ttl_secs: u64,
    /// TTL for incremental-scan artifacts, in seconds
    pub incremental_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Touch-count windows in days
    pub window_short_days: u32,
    pub window_long_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    pub full_scan_secs: u64,
    pub incremental_scan_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            excluded_fragments: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "out".to_string(),
                "coverage".to_string(),
                ".next".to_string(),
                "__fixtures__".to_string(),
                "__snapshots__".to_string(),
                ".min.js".to_string(),
            ],
            max_file_size: 1_048_576,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            evidence_threshold: 30,
            load_threshold: 70,
            weight_nesting: 15.0,
            weight_branches: 10.0,
            weight_boolean: 8.0,
            weight_callback_depth: 12.0,
            weight_identifier_ambiguity: 10.0,
            weight_context_switches: 5.0,
            weight_exception_irregularity: 8.0,
            weight_side_effects: 7.0,
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            tau_default: 0.70,
            tau_component: 0.85,
            minhash_permutations: 128,
            shingle_size: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            full_ttl_secs: 7 * 24 * 3600,
            incremental_ttl_secs: 24 * 3600,
        }
    }
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            window_short_days: 30,
            window_long_days: 90,
        }
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            full_scan_secs: 20 * 60,
            incremental_scan_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from default location, falling back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = Self::home()?;
        Ok(home.join("config.toml"))
    }

    /// Get the shadowlint home directory
    pub fn home() -> Result<PathBuf> {
        if let Ok(home) = std::env::var("SHADOWLINT_HOME") {
            return Ok(PathBuf::from(home));
        }

        ProjectDirs::from("dev", "shadowlint", "shadowlint")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| Error::Config {
                message: "could not determine shadowlint home directory".to_string(),
            })
    }

    /// Get the cache directory
    pub fn cache_dir() -> Result<PathBuf> {
        Ok(Self::home()?.join("cache"))
    }

    /// Ensure home directory exists
    pub fn ensure_home() -> Result<()> {
        let home = Self::home()?;
        if !home.exists() {
            std::fs::create_dir_all(&home)?;
        }
        Ok(())
    }
}

/// Fixed vocabulary of reactive-effect hooks recognized by the Extractor.
pub const REACTIVE_EFFECT_HOOKS: &[&str] =
    &["useEffect", "useLayoutEffect", "useInsertionEffect"];

/// Fixed vocabulary of network/storage call callees tracked for render-side-effects.
pub const SIDE_EFFECT_CALLEES: &[&str] = &["fetch", "localStorage", "sessionStorage", "axios"];

/// Fixed commit-signal vocabulary (spec.md §3).
pub const COMMIT_SIGNAL_VOCABULARY: &[&str] =
    &["refactor", "test", "type", "fix", "chore", "feat"];
