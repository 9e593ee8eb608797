//! Filesystem locations for persisted plans and backend state.
//!
//! ```text
//! <data>/
//! ├── plans/<plan hash>.json
//! └── state.json
//! ```
//!
//! `<data>` is `$ENCLAVE_DATA_DIR` when set, else `$XDG_DATA_HOME/enclave`, else
//! `$HOME/.local/share/enclave`.

use std::path::PathBuf;

use crate::consts::{APP_NAME, DATA_DIR_ENV};

const PLANS_DIR: &str = "plans";
const STATE_FILENAME: &str = "state.json";

fn env_path(name: &str) -> Option<PathBuf> {
  std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Returns the user's home directory, if `HOME` is set.
pub fn home_dir() -> Option<PathBuf> {
  env_path("HOME")
}

/// Returns the data directory, or `None` when no variable locates one.
pub fn data_dir() -> Option<PathBuf> {
  if let Some(dir) = env_path(DATA_DIR_ENV) {
    return Some(dir);
  }
  let data_home = env_path("XDG_DATA_HOME").or_else(|| home_dir().map(|home| home.join(".local").join("share")))?;
  Some(data_home.join(APP_NAME))
}

pub fn plans_dir() -> Option<PathBuf> {
  data_dir().map(|dir| dir.join(PLANS_DIR))
}

pub fn state_path() -> Option<PathBuf> {
  data_dir().map(|dir| dir.join(STATE_FILENAME))
}
