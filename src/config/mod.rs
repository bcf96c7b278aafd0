//! Layered configuration.
//!
//! Tiers, lowest priority first:
//! 1. **Defaults** - built into [`Config::default`]
//! 2. **Project** - `$CWD/task-board/config.yaml`
//! 3. **User** - `~/.task-board/config.yaml`
//! 4. **Environment** - the variables below
//!
//! YAML tiers are deep-merged field by field. An explicit config file
//! (`--config` or `TASK_BOARD_CONFIG_PATH`) replaces tiers 1-3.
//!
//! ## Environment Variables
//! - `TASK_BOARD_CONFIG_PATH` - Explicit config file
//! - `TASK_BOARD_DB_PATH` - Database path
//! - `TASK_BOARD_MEDIA_DIR` - Uploaded image directory
//! - `TASK_BOARD_HOST` / `TASK_BOARD_PORT` - Listen address
//! - `TASK_BOARD_SERVE_MEDIA` - Serve uploaded images (development)
//! - `TASK_BOARD_USER_DIR` - User config dir (default: `~/.task-board`)
//! - `TASK_BOARD_PROJECT_DIR` - Project config dir (default: `./task-board`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
