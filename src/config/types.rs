//! Configuration types.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default port for the web server.
pub const DEFAULT_PORT: u16 = 8000;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Uploaded image storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConfig {
    /// Directory holding uploaded images.
    #[serde(default = "default_media_dir")]
    pub dir: PathBuf,

    /// URL prefix uploaded images are linked under.
    #[serde(default = "default_media_url")]
    pub url_prefix: String,

    /// Serve the media directory from this process. Development only;
    /// production deployments put a static file server in front.
    #[serde(default)]
    pub serve: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: default_media_dir(),
            url_prefix: default_media_url(),
            serve: false,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("task-board/tasks.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("task-board/media")
}

fn default_media_url() -> String {
    "/media".to_string()
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Ensure the media directory exists.
    pub fn ensure_media_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.media.dir)?;
        Ok(())
    }

    /// `host:port` string to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert!(!config.media.serve);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
media:
  serve: true
"#,
        )
        .unwrap();
        assert!(config.media.serve);
        assert_eq!(config.media.url_prefix, "/media");
        assert_eq!(config.server.port, DEFAULT_PORT);
    }
}
