//! The instruction plan and the interpret → validate → execute pipeline.
//!
//! A plan is built once per script run. Interpretation appends instructions and
//! binds script names; validation checks the staged instructions against each
//! other and against the environment; execution walks the instructions in order,
//! resolving future references as their producers complete.
//!
//! ```text
//! script ──interpret──▶ InstructionPlan ──validate──▶ ok ──execute──▶ ExecutionReport
//!            │                               │                 │
//!            ▼                               ▼                 ▼
//!   Vec<InterpretationError>       Vec<ValidationError>   FailedInstruction
//! ```
//!
//! After interpretation the only state that changes is the `applied` flag and
//! recorded result of each instruction, and the resolved-futures table.

mod execute;
mod graph;
mod render;
mod store;
mod types;
mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::argument::{ArgumentValueSet, RawArguments};
use crate::backend::{Backend, ResourceKind};
use crate::error::{ExecutionError, ExecutionReason, InterpretationError, InterpretationReason, ValidationError};
use crate::instruction::{Instruction, registry};
use crate::script::{self, Script};
use crate::util::hash::{HashError, Hashable, ObjectHash};
use crate::value::{FutureRef, Value};

pub use execute::execute_plan;
pub use graph::DependencyGraph;
pub use render::render_summary;
pub use store::{PlanStoreError, load_plan, plan_file_name, save_plan};
pub use types::{
  AppliedInstruction, CancelHandle, CancelToken, ExecutionReport, FailedInstruction, PendingInstruction, cancellation,
};
pub use validate::{ValidationEnvironment, ValidationScope, validate_plan};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionPlan {
  instructions: Vec<Instruction>,
  /// Script names bound by `let` and loop variables.
  values: BTreeMap<String, Value>,
  /// Future key → concrete value, filled during execution.
  resolved: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct PlanIdentity<'a> {
  keys: Vec<&'a ObjectHash>,
}

impl Hashable for PlanIdentity<'_> {}

impl InstructionPlan {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  pub fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  pub fn instruction(&self, position: usize) -> Option<&Instruction> {
    self.instructions.get(position)
  }

  pub(crate) fn instruction_mut(&mut self, position: usize) -> Option<&mut Instruction> {
    self.instructions.get_mut(position)
  }

  pub(crate) fn push(&mut self, instruction: Instruction) {
    self.instructions.push(instruction);
  }

  /// Stage a call to a registered action and append it.
  ///
  /// Returns the value the caller sees, which may hold future references.
  pub fn add(&mut self, action: &str, raw: RawArguments) -> Result<Value, InterpretationError> {
    let descriptor = registry()
      .lookup(action)
      .ok_or_else(|| InterpretationError::new(InterpretationReason::UnknownCallee(action.to_string())))?;
    let instruction = descriptor.stage(raw, self)?;
    let returns = instruction.returns().clone();
    self.push(instruction);
    Ok(returns)
  }

  pub fn bind_value(&mut self, name: impl Into<String>, value: Value) {
    self.values.insert(name.into(), value);
  }

  /// Deep copy of the value bound to `name`.
  pub fn value(&self, name: &str) -> Option<Value> {
    self.values.get(name).map(Value::deep_copy)
  }

  pub fn values(&self) -> &BTreeMap<String, Value> {
    &self.values
  }

  /// Concrete value of a future, once its producer has executed.
  pub fn resolved(&self, future: &FutureRef) -> Option<&Value> {
    self.resolved.get(&future.key())
  }

  pub(crate) fn record_resolution(&mut self, future: &FutureRef, value: Value) {
    self.resolved.insert(future.key(), value);
  }

  /// Replace every future in `arguments` with its resolved value.
  pub fn resolve_arguments(&self, arguments: &ArgumentValueSet) -> Result<ArgumentValueSet, ExecutionError> {
    arguments.try_map_values(|value| {
      value.try_map_futures(&mut |future| {
        self.resolved(future).map(Value::deep_copy).ok_or_else(|| {
          ExecutionError::new(ExecutionReason::UnresolvedFuture {
            reference: future.to_string(),
            origin: future.origin(),
          })
        })
      })
    })
  }

  /// First instruction after `position` that creates a `kind` resource called `name`.
  pub fn recreated_after(&self, position: usize, kind: ResourceKind, name: &str) -> Option<&Instruction> {
    self
      .instructions
      .iter()
      .skip(position + 1)
      .find(|later| later.kind().resource() == kind && later.kind().created_name(later) == Some(name))
  }

  /// Content hash of the staged instructions.
  pub fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    PlanIdentity {
      keys: self.instructions.iter().map(Instruction::idempotency_key).collect(),
    }
    .compute_hash()
  }

  pub fn applied_count(&self) -> usize {
    self.instructions.iter().filter(|i| i.is_applied()).count()
  }
}

/// A pipeline run stopped before execution.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("script interpretation failed with {} error(s)", .0.len())]
  Interpretation(Vec<InterpretationError>),

  #[error("plan validation failed with {} error(s)", .0.len())]
  Validation(Vec<ValidationError>),
}

impl PipelineError {
  /// One rendered message per underlying error.
  pub fn messages(&self) -> Vec<String> {
    match self {
      PipelineError::Interpretation(errors) => errors.iter().map(ToString::to_string).collect(),
      PipelineError::Validation(errors) => errors.iter().map(ToString::to_string).collect(),
    }
  }
}

/// Interpret a script and validate the resulting plan.
pub fn prepare(script: &Script, env: &ValidationEnvironment) -> Result<InstructionPlan, PipelineError> {
  let plan = script::interpret(script).map_err(PipelineError::Interpretation)?;
  validate_plan(&plan, env).map_err(PipelineError::Validation)?;
  Ok(plan)
}

/// Validate a plan and execute it.
///
/// Execution failures do not make this return `Err`; they are reported in the
/// [`ExecutionReport`] together with what was applied before the failure.
pub async fn apply<B: Backend>(
  plan: &mut InstructionPlan,
  env: &ValidationEnvironment,
  backend: &B,
  cancel: &CancelToken,
) -> Result<ExecutionReport, PipelineError> {
  validate_plan(plan, env).map_err(PipelineError::Validation)?;
  execute_plan(plan, backend, cancel).await
}
