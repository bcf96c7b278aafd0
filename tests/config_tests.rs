//! Configuration loading through the public API: YAML tiers, environment
//! overrides and command-line flags, in that order.

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use task_board::cli::Cli;
use task_board::config::{Config, ConfigLoader, ConfigPaths};
use tempfile::TempDir;

fn write_config(dir: &std::path::Path, yaml: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("config.yaml"), yaml).unwrap();
}

#[test]
fn tiers_env_and_flags_layer_in_order() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("task-board");
    let user = temp.path().join("user");

    write_config(
        &project,
        "server:\n  db_path: project.db\n  port: 9000\nmedia:\n  dir: project-media\n",
    );
    write_config(&user, "server:\n  port: 9100\n");

    let env: HashMap<&str, &str> = HashMap::from([("TASK_BOARD_HOST", "0.0.0.0")]);
    let mut loader = ConfigLoader::load_with_env(
        ConfigPaths::with_dirs(Some(project), Some(user)),
        |key| env.get(key).map(|v| v.to_string()),
    )
    .unwrap();

    let cli = Cli::try_parse_from(["task-board", "--port", "9200", "--serve-media"]).unwrap();
    cli.apply_overrides(loader.config_mut());
    let config = loader.into_config();

    assert_eq!(config.server.db_path, PathBuf::from("project.db"));
    assert_eq!(config.media.dir, PathBuf::from("project-media"));
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9200);
    assert!(config.media.serve);
    assert_eq!(config.bind_addr(), "0.0.0.0:9200");
}

#[test]
fn media_serving_is_off_by_default() {
    let temp = TempDir::new().unwrap();
    let loader = ConfigLoader::load_with_env(
        ConfigPaths::with_dirs(Some(temp.path().join("none")), None),
        |_| None,
    )
    .unwrap();

    assert_eq!(loader.config(), &Config::default());
    assert!(!loader.config().media.serve);
    assert_eq!(loader.config().media.url_prefix, "/media");
}

#[test]
fn ensure_dirs_creates_parents() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.db_path = temp.path().join("nested/dir/tasks.db");
    config.media.dir = temp.path().join("media/root");

    config.ensure_db_dir().unwrap();
    config.ensure_media_dir().unwrap();

    assert!(temp.path().join("nested/dir").is_dir());
    assert!(temp.path().join("media/root").is_dir());
}

#[test]
fn explicit_file_must_parse() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.yaml");
    std::fs::write(&path, "server: [").unwrap();

    let paths = ConfigPaths::default().with_explicit(&path);
    assert!(ConfigLoader::load_with_env(paths, |_| None).is_err());
}
