mod apply;
mod plan;
mod status;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use enclave_lib::backend::StateBackend;
use enclave_lib::paths;
use enclave_lib::plan::{InstructionPlan, PipelineError, validate_plan};
use enclave_lib::script::{self, Script};

use crate::output::print_error;

pub use apply::cmd_apply;
pub use plan::cmd_plan;
pub use status::cmd_status;

const NO_DATA_DIR: &str = "Cannot determine the data directory: set ENCLAVE_DATA_DIR or HOME";

pub(crate) fn plans_dir() -> Result<PathBuf> {
  paths::plans_dir().context(NO_DATA_DIR)
}

pub(crate) fn state_path() -> Result<PathBuf> {
  paths::state_path().context(NO_DATA_DIR)
}

pub(crate) fn load_backend() -> Result<StateBackend> {
  let path = state_path()?;
  StateBackend::load(&path).with_context(|| format!("Failed to load backend state: {}", path.display()))
}

/// Interpret `script` and validate it against what `backend` already holds.
pub(crate) fn prepare_plan(script: &Script, backend: &StateBackend) -> Result<InstructionPlan> {
  let plan = script::interpret(script).map_err(|errors| report_pipeline_error(PipelineError::Interpretation(errors)))?;
  validate_plan(&plan, &backend.environment_for(&plan))
    .map_err(|errors| report_pipeline_error(PipelineError::Validation(errors)))?;
  Ok(plan)
}

/// Print every batched error, then hand back the summary as the command error.
pub(crate) fn report_pipeline_error(err: PipelineError) -> anyhow::Error {
  for message in err.messages() {
    print_error(&message);
  }
  anyhow!(err)
}
