//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/task-board/)
    Project = 1,
    /// User-level config (~/.task-board/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each configuration tier.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Single config file replacing the file tiers.
    pub explicit: Option<PathBuf>,
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let explicit = std::env::var("TASK_BOARD_CONFIG_PATH")
            .ok()
            .map(PathBuf::from);

        // User dir: TASK_BOARD_USER_DIR or ~/.task-board
        let user_dir = std::env::var("TASK_BOARD_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-board")));

        // Project dir: TASK_BOARD_PROJECT_DIR or $CWD/task-board
        let project_dir = std::env::var("TASK_BOARD_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-board")));

        Self {
            explicit,
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            explicit: None,
            project_dir,
            user_dir,
        }
    }

    /// Use a single config file instead of the project and user tiers.
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }
}

/// Read a tier's `config.yaml`, skipping it when absent or unreadable.
fn read_tier(dir: &Path, tier: ConfigTier) -> Option<(Value, PathBuf)> {
    let config_file = dir.join("config.yaml");
    if !config_file.exists() {
        return None;
    }

    let content = match std::fs::read_to_string(&config_file) {
        Ok(content) => content,
        Err(e) => {
            warn!(tier = %tier, path = %config_file.display(), "Failed to read config: {}", e);
            return None;
        }
    };

    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => Some((value, config_file)),
        Err(e) => {
            warn!(tier = %tier, path = %config_file.display(), "Ignoring malformed config: {}", e);
            None
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Highest-priority config file that contributed
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with_env(paths, |key| std::env::var(key).ok())
    }

    /// Load configuration, reading environment overrides through `env`.
    pub fn load_with_env<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, config_path) = match paths.explicit {
            Some(ref explicit_path) => (Config::load(explicit_path)?, Some(explicit_path.clone())),
            None => Self::merge_tiers(&paths)?,
        };

        Self::apply_env_overrides(&mut config, env);

        Ok(Self {
            paths,
            config,
            config_path,
        })
    }

    fn merge_tiers(paths: &ConfigPaths) -> Result<(Config, Option<PathBuf>)> {
        let mut configs: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut config_path = None;

        let tiers = [
            (paths.project_dir.as_deref(), ConfigTier::Project),
            (paths.user_dir.as_deref(), ConfigTier::User),
        ];
        for (dir, tier) in tiers {
            if let Some((value, path)) = dir.and_then(|dir| read_tier(dir, tier)) {
                configs.push(value);
                config_path = Some(path);
            }
        }

        let merged = deep_merge_all(configs);
        let config: Config = serde_json::from_value(merged)?;
        Ok((config, config_path))
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides<F>(config: &mut Config, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = env("TASK_BOARD_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Some(media_dir) = env("TASK_BOARD_MEDIA_DIR") {
            config.media.dir = PathBuf::from(media_dir);
        }

        if let Some(host) = env("TASK_BOARD_HOST") {
            config.server.host = host;
        }

        if let Some(port) = env("TASK_BOARD_PORT") {
            match port.parse() {
                Ok(port) => config.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid TASK_BOARD_PORT"),
            }
        }

        if let Some(serve) = env("TASK_BOARD_SERVE_MEDIA") {
            config.media.serve = matches!(
                serve.to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with_env(paths, no_env).unwrap();

        assert_eq!(loader.config(), &Config::default());
        assert!(loader.config_path().is_none());
    }

    #[test]
    fn test_user_config_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("task-board");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        std::fs::write(
            project_dir.join("config.yaml"),
            "server:\n  port: 9000\n  host: 0.0.0.0\n",
        )
        .unwrap();
        std::fs::write(user_dir.join("config.yaml"), "server:\n  port: 9100\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), Some(user_dir.clone()));
        let loader = ConfigLoader::load_with_env(paths, no_env).unwrap();
        let config = loader.config();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(loader.config_path(), Some(user_dir.join("config.yaml").as_path()));
    }

    #[test]
    fn test_malformed_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("task-board");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "server: [unclosed").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader = ConfigLoader::load_with_env(paths, no_env).unwrap();

        assert_eq!(loader.config(), &Config::default());
    }

    #[test]
    fn test_env_overrides_files() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("task-board");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "server:\n  port: 9000\n").unwrap();

        let env: HashMap<&str, &str> = HashMap::from([
            ("TASK_BOARD_PORT", "9200"),
            ("TASK_BOARD_SERVE_MEDIA", "true"),
            ("TASK_BOARD_DB_PATH", "/tmp/board.db"),
        ]);
        let paths = ConfigPaths::with_dirs(Some(project_dir), None);
        let loader =
            ConfigLoader::load_with_env(paths, |k| env.get(k).map(|v| v.to_string())).unwrap();
        let config = loader.config();

        assert_eq!(config.server.port, 9200);
        assert!(config.media.serve);
        assert_eq!(config.server.db_path, PathBuf::from("/tmp/board.db"));
    }

    #[test]
    fn test_invalid_env_port_is_ignored() {
        let paths = ConfigPaths::default();
        let loader = ConfigLoader::load_with_env(paths, |k| {
            (k == "TASK_BOARD_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap();
        assert_eq!(loader.config().server.port, crate::config::DEFAULT_PORT);
    }

    #[test]
    fn test_explicit_file_replaces_tiers() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("task-board");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join("config.yaml"), "server:\n  port: 9000\n").unwrap();

        let explicit = temp.path().join("custom.yaml");
        std::fs::write(&explicit, "media:\n  serve: true\n").unwrap();

        let paths = ConfigPaths::with_dirs(Some(project_dir), None).with_explicit(&explicit);
        let loader = ConfigLoader::load_with_env(paths, no_env).unwrap();

        assert!(loader.config().media.serve);
        assert_eq!(loader.config().server.port, 8000);
        assert_eq!(loader.config_path(), Some(explicit.as_path()));
    }
}
