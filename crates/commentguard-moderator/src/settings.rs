//! Layered application settings
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults (every field has one)
//! 2. the YAML settings file (`commentguard.yaml` unless overridden)
//! 3. environment variables prefixed `COMMENTGUARD__`, with `__` between
//!    nested keys, e.g. `COMMENTGUARD__YOUTUBE__ACCESS_TOKEN`

use commentguard_classifiers::{ScorerConfig, TrainerConfig};
use commentguard_core::{Error, Result};
use commentguard_policy::PolicyConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings file read when no path is given
pub const DEFAULT_SETTINGS_FILE: &str = "commentguard.yaml";

const ENV_PREFIX: &str = "COMMENTGUARD";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub feedback: FeedbackSettings,

    #[serde(default)]
    pub retrain: RetrainSettings,

    #[serde(default)]
    pub scorer: ScorerConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub youtube: YoutubeSettings,

    /// Videos polled when none are registered in the store
    #[serde(default)]
    pub videos: Vec<String>,
}

impl Settings {
    /// Load settings from `path` (or the default file, if present) and the
    /// process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load settings with an explicit environment map in place of the
    /// process environment
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };

        let settings: Self = Config::builder()
            .add_source(File::from(file.as_path()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::config(format!("failed to load settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.thresholds.validate()?;
        if self.retrain.threshold == 0 {
            return Err(Error::config("retrain.threshold must be at least 1"));
        }
        if self.youtube.page_size == 0 {
            return Err(Error::config("youtube.page_size must be at least 1"));
        }
        Ok(())
    }
}

/// Local persistence locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Directory for the moderation audit log
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database: default_database(),
            audit_dir: default_audit_dir(),
        }
    }
}

/// Feedback queue and high-water mark locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSettings {
    #[serde(default = "default_queue_path")]
    pub queue_path: PathBuf,

    #[serde(default = "default_high_water_mark_path")]
    pub high_water_mark_path: PathBuf,

    /// Category written for comments auto-enqueued on `review`
    #[serde(default = "default_placeholder_category")]
    pub placeholder_category: String,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            queue_path: default_queue_path(),
            high_water_mark_path: default_high_water_mark_path(),
            placeholder_category: default_placeholder_category(),
        }
    }
}

/// Retrain trigger and trainer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainSettings {
    /// New feedback records needed before a retrain fires
    #[serde(default = "default_retrain_threshold")]
    pub threshold: usize,

    #[serde(default = "default_max_features")]
    pub max_features: usize,

    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    #[serde(default = "default_c")]
    pub c: f64,

    #[serde(default = "default_versions_retained")]
    pub versions_retained: usize,
}

impl RetrainSettings {
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            max_features: self.max_features,
            max_iter: self.max_iter,
            c: self.c,
            versions_retained: self.versions_retained,
            ..TrainerConfig::default()
        }
    }
}

impl Default for RetrainSettings {
    fn default() -> Self {
        Self {
            threshold: default_retrain_threshold(),
            max_features: default_max_features(),
            max_iter: default_max_iter(),
            c: default_c(),
            versions_retained: default_versions_retained(),
        }
    }
}

/// YouTube Data API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; enough for listing comments
    #[serde(default)]
    pub api_key: Option<String>,

    /// OAuth access token; required for moderation actions
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Comments fetched per video; the API caps this at 100
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for YoutubeSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("./data/commentguard.sqlite3")
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("./data/audit")
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("./data/retrain_queue.csv")
}

fn default_high_water_mark_path() -> PathBuf {
    PathBuf::from("./data/retrain_flag.txt")
}

fn default_placeholder_category() -> String {
    "Neutral".to_string()
}

fn default_retrain_threshold() -> usize {
    20
}

fn default_max_features() -> usize {
    1000
}

fn default_max_iter() -> usize {
    1000
}

fn default_c() -> f64 {
    1.0
}

fn default_versions_retained() -> usize {
    3
}

fn default_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentguard_classifiers::ScorerBackend;
    use tempfile::TempDir;

    fn no_env() -> Option<HashMap<String, String>> {
        Some(HashMap::new())
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.yaml");
        // An explicit path must exist.
        assert!(Settings::load_with_env(Some(&missing), no_env()).is_err());

        let settings = Settings::load_with_env(None, no_env()).unwrap();
        assert_eq!(settings.retrain.threshold, 20);
        assert_eq!(settings.youtube.page_size, 100);
        assert_eq!(settings.feedback.placeholder_category, "Neutral");
        assert_eq!(settings.scorer.backend, ScorerBackend::Auto);
        assert!(settings.videos.is_empty());
    }

    #[test]
    fn test_yaml_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(
            &path,
            r#"
retrain:
  threshold: 5
scorer:
  backend: lexicon
policy:
  thresholds:
    toxic: 0.6
videos:
  - abc123
  - def456
"#,
        )
        .unwrap();

        let settings = Settings::load_with_env(Some(&path), no_env()).unwrap();
        assert_eq!(settings.retrain.threshold, 5);
        assert_eq!(settings.retrain.max_features, 1000);
        assert_eq!(settings.scorer.backend, ScorerBackend::Lexicon);
        assert_eq!(settings.policy.thresholds.toxic, 0.6);
        assert_eq!(settings.videos, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "youtube:\n  timeout_secs: 10\n").unwrap();

        let env = HashMap::from([
            (
                "COMMENTGUARD__YOUTUBE__ACCESS_TOKEN".to_string(),
                "token-xyz".to_string(),
            ),
            ("COMMENTGUARD__YOUTUBE__TIMEOUT_SECS".to_string(), "5".to_string()),
        ]);

        let settings = Settings::load_with_env(Some(&path), Some(env)).unwrap();
        assert_eq!(settings.youtube.access_token.as_deref(), Some("token-xyz"));
        assert_eq!(settings.youtube.timeout_secs, 5);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "policy:\n  thresholds:\n    review: 0.9\n    toxic: 0.2\n").unwrap();
        assert!(matches!(
            Settings::load_with_env(Some(&path), no_env()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_trainer_config_carries_overrides() {
        let settings = RetrainSettings {
            max_features: 50,
            ..RetrainSettings::default()
        };
        let trainer = settings.trainer_config();
        assert_eq!(trainer.max_features, 50);
        assert_eq!(trainer.top_features, 5);
    }
}
