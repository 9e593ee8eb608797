//! Implementation of the `enclave apply` command.
//!
//! Runs the pipeline against the local state backend and persists both the
//! updated plan and the backend state, whether or not every instruction applied.
//! Re-running the same script or plan only executes what is still missing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::warn;

use enclave_lib::plan::{
  self, CancelHandle, InstructionPlan, PipelineError, cancellation, load_plan, plan_file_name, save_plan,
};
use enclave_lib::script::{self, load_script};

use super::{load_backend, plans_dir, report_pipeline_error, state_path};
use crate::output::{print_info, print_report, print_stat, print_success, print_warning};

/// Execute the apply command.
///
/// Exactly one of `script` and `plan_file` is set. With a script, the plan is
/// saved under the plans directory by hash; with a plan file, the file itself is
/// updated.
pub fn cmd_apply(script: Option<&Path>, plan_file: Option<&Path>, timeout: Option<Duration>) -> Result<()> {
  let backend = load_backend()?;
  let (mut plan, plan_path) = load_target(script, plan_file)?;

  if plan.is_empty() {
    print_info("Nothing to apply");
    return Ok(());
  }

  let env = backend.environment_for(&plan);
  let (handle, token) = cancellation();
  let started = Instant::now();

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(async {
    tokio::spawn(cancel_on_interrupt(handle, timeout));
    plan::apply(&mut plan, &env, &backend, &token).await
  });
  let report = outcome.map_err(report_pipeline_error)?;

  let state_path = state_path()?;
  backend
    .save(&state_path)
    .with_context(|| format!("Failed to save backend state: {}", state_path.display()))?;
  save_plan(&plan, &plan_path).with_context(|| format!("Failed to save plan: {}", plan_path.display()))?;

  print_report(&report);
  println!();
  print_stat("Applied", &report.applied.len().to_string());
  print_stat("Executed", &report.executed().count().to_string());
  print_stat("Not attempted", &report.not_attempted.len().to_string());
  print_stat("Plan", &plan_path.display().to_string());

  if let Some(failed) = &report.failed {
    bail!("Apply failed at {}: {}", failed.id, failed.error);
  }
  if report.cancelled {
    bail!(
      "Apply cancelled with {} instruction(s) not attempted",
      report.not_attempted.len()
    );
  }

  let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
  print_success(&format!("Apply complete in {}", humantime::format_duration(elapsed)));
  Ok(())
}

fn load_target(script: Option<&Path>, plan_file: Option<&Path>) -> Result<(InstructionPlan, PathBuf)> {
  if let Some(path) = plan_file {
    let plan = load_plan(path).with_context(|| format!("Failed to load plan: {}", path.display()))?;
    return Ok((plan, path.to_path_buf()));
  }

  let Some(file) = script else {
    bail!("Either a script or --plan is required");
  };
  let script = load_script(file).with_context(|| format!("Failed to load script: {}", file.display()))?;
  let plan =
    script::interpret(&script).map_err(|errors| report_pipeline_error(PipelineError::Interpretation(errors)))?;
  let hash = plan.compute_hash().context("Failed to compute plan hash")?;
  let path = plans_dir()?.join(plan_file_name(&hash));
  Ok((plan, path))
}

/// Cancel on Ctrl-C or once `timeout` elapses, whichever comes first.
async fn cancel_on_interrupt(handle: CancelHandle, timeout: Option<Duration>) {
  let deadline = async {
    match timeout {
      Some(duration) => tokio::time::sleep(duration).await,
      None => std::future::pending::<()>().await,
    }
  };

  tokio::select! {
    signal = tokio::signal::ctrl_c() => {
      if signal.is_ok() {
        print_warning("Interrupted, stopping after the current instruction");
        handle.cancel();
      }
    }
    _ = deadline => {
      warn!("apply timeout reached, cancelling");
      handle.cancel();
    }
  }
}
