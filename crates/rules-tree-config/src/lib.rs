use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// How line breaks in a rule-set's source text behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Text pulled from a web page; line structure is meaningful.
    #[default]
    Lines,
    /// Text pulled from a PDF; every line break is a wrap.
    Flowed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub id: String,
    pub name: String,
    /// Directory holding this rule-set's section files.
    pub sections_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory of the file-backed section store.
    pub store_path: PathBuf,
    #[serde(default)]
    pub rule_sets: Vec<RuleSetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(shellexpand::tilde("~/.local/share/rules-tree").as_ref()),
            rule_sets: vec![
                RuleSetConfig {
                    id: "TR".to_string(),
                    name: "Tournament Rules".to_string(),
                    sections_dir: PathBuf::from("staticfiles/trsections"),
                    source_url: None,
                    layout: Layout::Lines,
                },
                RuleSetConfig {
                    id: "CR".to_string(),
                    name: "Comprehensive Rules".to_string(),
                    sections_dir: PathBuf::from("staticfiles/crsections"),
                    source_url: None,
                    layout: Layout::Flowed,
                },
            ],
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in every configured path
        config.store_path = Self::expand_path(&config.store_path).unwrap_or(config.store_path);
        for rule_set in &mut config.rule_sets {
            if let Some(expanded) = Self::expand_path(&rule_set.sections_dir) {
                rule_set.sections_dir = expanded;
            }
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/rules-tree");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Look up a rule-set by id, ignoring case.
    pub fn rule_set(&self, id: &str) -> Option<&RuleSetConfig> {
        self.rule_sets
            .iter()
            .find(|rule_set| rule_set.id.eq_ignore_ascii_case(id))
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
