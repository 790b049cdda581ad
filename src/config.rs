//! Configuration loading and management
//!
//! Handles parsing of `merit.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::task::TaskType;

pub const CONFIG_FILENAME: &str = "merit.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Nominal point values per task type
    #[serde(default)]
    pub points: PointsConfig,

    /// Leaderboard configuration
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    /// Proof upload configuration
    #[serde(default)]
    pub uploads: UploadsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            points: PointsConfig::default(),
            leaderboard: LeaderboardConfig::default(),
            uploads: UploadsConfig::default(),
        }
    }
}

/// Per-type nominal point values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_content_creation")]
    pub content_creation: i64,

    #[serde(default = "default_bug_report")]
    pub bug_report: i64,

    #[serde(default = "default_feature_request")]
    pub feature_request: i64,

    #[serde(default = "default_community_help")]
    pub community_help: i64,

    #[serde(default = "default_documentation")]
    pub documentation: i64,
}

fn default_content_creation() -> i64 {
    TaskType::ContentCreation.default_points()
}

fn default_bug_report() -> i64 {
    TaskType::BugReport.default_points()
}

fn default_feature_request() -> i64 {
    TaskType::FeatureRequest.default_points()
}

fn default_community_help() -> i64 {
    TaskType::CommunityHelp.default_points()
}

fn default_documentation() -> i64 {
    TaskType::Documentation.default_points()
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            content_creation: default_content_creation(),
            bug_report: default_bug_report(),
            feature_request: default_feature_request(),
            community_help: default_community_help(),
            documentation: default_documentation(),
        }
    }
}

impl PointsConfig {
    /// Nominal point value for a task type under this config.
    pub fn for_type(&self, task_type: TaskType) -> i64 {
        match task_type {
            TaskType::ContentCreation => self.content_creation,
            TaskType::BugReport => self.bug_report,
            TaskType::FeatureRequest => self.feature_request,
            TaskType::CommunityHelp => self.community_help,
            TaskType::Documentation => self.documentation,
        }
    }

    fn validate(&self) -> crate::error::Result<()> {
        for kind in TaskType::ALL {
            let value = self.for_type(kind);
            if value < 0 {
                return Err(crate::error::Error::InvalidConfig(format!(
                    "points.{kind}: negative point value {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Leaderboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Number of entries returned by default
    #[serde(default = "default_leaderboard_limit")]
    pub limit: usize,
}

fn default_leaderboard_limit() -> usize {
    10
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            limit: default_leaderboard_limit(),
        }
    }
}

/// Proof upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    /// Maximum proof file size in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from a `merit.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a data directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.points.validate()?;
        if self.leaderboard.limit == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "leaderboard.limit: must be at least 1".to_string(),
            ));
        }
        if self.uploads.max_bytes == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "uploads.max_bytes: must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
