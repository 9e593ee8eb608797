//! Implementation of the `enclave plan` command.
//!
//! Interprets and validates a script without touching the backend, prints the
//! dry-run summary and saves the plan under `<data>/plans/<hash>.json` for a later
//! `enclave apply --plan`.

use std::path::Path;

use anyhow::{Context, Result};

use enclave_lib::plan::{plan_file_name, render_summary, save_plan};
use enclave_lib::script::load_script;

use super::{load_backend, plans_dir, prepare_plan};
use crate::output::{print_info, print_json, print_stat, print_success, truncate_hash};

pub fn cmd_plan(file: &Path, json: bool) -> Result<()> {
  let script = load_script(file).with_context(|| format!("Failed to load script: {}", file.display()))?;
  let backend = load_backend()?;
  let plan = prepare_plan(&script, &backend)?;

  let hash = plan.compute_hash().context("Failed to compute plan hash")?;
  let plan_path = plans_dir()?.join(plan_file_name(&hash));
  // A saved plan may carry applied flags from an earlier apply; keep it.
  if !plan_path.exists() {
    save_plan(&plan, &plan_path).with_context(|| format!("Failed to save plan: {}", plan_path.display()))?;
  }

  if json {
    return print_json(&plan);
  }

  if plan.is_empty() {
    print_info("Script stages no instructions");
  } else {
    print!("{}", render_summary(&plan));
    println!();
  }
  print_success(&format!("Plan: {}", truncate_hash(&hash.0)));
  print_stat("Instructions", &plan.len().to_string());
  print_stat("Path", &plan_path.display().to_string());

  Ok(())
}
