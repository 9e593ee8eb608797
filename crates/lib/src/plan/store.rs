//! JSON persistence of plans.
//!
//! A persisted plan keeps everything needed to resume it: the staged
//! instructions with their applied flags and results, and the resolved-futures
//! table.
//!
//! ```text
//! <data>/plans/
//! └── <plan hash>.json
//! ```

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::util::hash::ObjectHash;

use super::InstructionPlan;

#[derive(Debug, Error)]
pub enum PlanStoreError {
  #[error("failed to read plan {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to write plan: {0}")]
  Write(#[source] io::Error),

  #[error("failed to create plan directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to parse plan: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("plan is inconsistent: instruction at index {index} claims position {position}")]
  Inconsistent { index: usize, position: usize },

  #[error("failed to serialize plan: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// File name of a plan persisted under its hash.
pub fn plan_file_name(hash: &ObjectHash) -> String {
  format!("{}.json", hash)
}

/// Write `plan` to `path`, creating parent directories.
///
/// Writes to a temporary file next to the target and renames it into place.
pub fn save_plan(plan: &InstructionPlan, path: &Path) -> Result<(), PlanStoreError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(PlanStoreError::CreateDir)?;
  }

  let content = serde_json::to_string_pretty(plan).map_err(PlanStoreError::Serialize)?;
  let temp_path = path.with_extension("json.tmp");
  fs::write(&temp_path, &content).map_err(PlanStoreError::Write)?;
  fs::rename(&temp_path, path).map_err(PlanStoreError::Write)?;

  info!(
    path = %path.display(),
    instructions = plan.len(),
    applied = plan.applied_count(),
    "plan saved"
  );
  Ok(())
}

pub fn load_plan(path: &Path) -> Result<InstructionPlan, PlanStoreError> {
  let content = fs::read_to_string(path).map_err(|source| PlanStoreError::Read {
    path: path.display().to_string(),
    source,
  })?;
  let plan: InstructionPlan = serde_json::from_str(&content).map_err(PlanStoreError::Parse)?;
  if let Some((index, instruction)) = plan
    .instructions()
    .iter()
    .enumerate()
    .find(|(index, instruction)| instruction.position() != *index)
  {
    return Err(PlanStoreError::Inconsistent {
      index,
      position: instruction.position(),
    });
  }
  debug!(path = %path.display(), instructions = plan.len(), "plan loaded");
  Ok(plan)
}
