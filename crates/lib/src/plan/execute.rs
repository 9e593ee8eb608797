//! Sequential plan execution.
//!
//! Instructions run strictly in plan order. For each one the executor resolves
//! its arguments and asks the backend for a result recorded under the
//! instruction's idempotency key. A recorded result is adopted without calling
//! the operation again, as long as the resource it names is still in the state
//! the record describes. Otherwise the operation runs and its result is recorded
//! right away; only then are the futures the instruction promised resolved.
//!
//! The first failure stops execution. Everything before it stays applied, so a
//! later run of the same plan picks up at the failed instruction.

use tracing::{debug, error, info, warn};

use crate::backend::{Backend, BackendError, ExecutionRecord};
use crate::error::{ExecutionError, ExecutionReason, ValueError};
use crate::instruction::Instruction;
use crate::instruction::actions::{result_name, result_uuid};
use crate::util::hash::Hashable;
use crate::value::Value;

use super::graph::DependencyGraph;
use super::types::{AppliedInstruction, CancelToken, ExecutionReport, FailedInstruction, PendingInstruction};
use super::{InstructionPlan, PipelineError};

/// Execute `plan` against `backend`.
///
/// Returns `Err` only when the plan's future references are malformed, which
/// validation would have reported; execution failures land in the report.
pub async fn execute_plan<B: Backend>(
  plan: &mut InstructionPlan,
  backend: &B,
  cancel: &CancelToken,
) -> Result<ExecutionReport, PipelineError> {
  let graph = DependencyGraph::from_plan(plan).map_err(PipelineError::Validation)?;
  let total = plan.len();
  let mut report = ExecutionReport::default();

  info!(instructions = total, applied = plan.applied_count(), "starting plan execution");

  for position in 0..total {
    if cancel.is_cancelled() {
      warn!(position, "execution cancelled before instruction started");
      report.cancelled = true;
      report.not_attempted = pending(plan, position, None, &graph);
      break;
    }

    match execute_instruction(plan, position, backend).await {
      Ok(applied) => {
        info!(instruction = %applied.id, reused = applied.reused, "instruction applied");
        report.applied.push(applied);
      }
      Err(err) => {
        let id = plan.instructions()[position].id().clone();
        error!(instruction = %id, error = %err, "instruction failed");
        report.not_attempted = pending(plan, position + 1, Some(position), &graph);
        report.failed = Some(FailedInstruction { id, error: err });
        break;
      }
    }
  }

  info!(
    applied = report.applied.len(),
    executed = report.executed().count(),
    failed = report.failed.is_some(),
    not_attempted = report.not_attempted.len(),
    cancelled = report.cancelled,
    "plan execution complete"
  );

  Ok(report)
}

async fn execute_instruction<B: Backend>(
  plan: &mut InstructionPlan,
  position: usize,
  backend: &B,
) -> Result<AppliedInstruction, ExecutionError> {
  let instruction = plan.instructions()[position].clone();
  let id = instruction.id().clone();
  let kind = instruction.kind();
  let key = instruction.idempotency_key().clone();
  let tag = |e: ExecutionError| e.in_callee(kind.name()).at(&id);
  let backend_error = |e: BackendError| tag(ExecutionError::new(e));

  let arguments = plan.resolve_arguments(instruction.arguments()).map_err(tag)?;
  let inputs = arguments
    .compute_hash()
    .map_err(|e| tag(ExecutionError::new(ValueError::Invalid(format!("cannot hash arguments: {}", e)))))?;

  let recorded = match backend.recorded_result(&key).await.map_err(backend_error)? {
    Some(record) => {
      if record_holds(plan, &instruction, &record.result, backend)
        .await
        .map_err(backend_error)?
      {
        Some(record)
      } else {
        warn!(
          instruction = %id,
          key = %key,
          "recorded result no longer matches the environment, executing again"
        );
        None
      }
    }
    None => {
      if instruction.is_applied() {
        warn!(
          instruction = %id,
          key = %key,
          "instruction is marked applied but the backend has no record of it, executing again"
        );
      }
      None
    }
  };

  let (result, reused) = match recorded {
    Some(record) => {
      if record.inputs != inputs {
        warn!(
          instruction = %id,
          key = %key,
          "recorded result was produced from different resolved arguments, adopting it as is"
        );
      }
      debug!(instruction = %id, key = %key, "adopting recorded result");
      (record.result, true)
    }
    None => {
      debug!(instruction = %id, "executing instruction");
      let result = kind
        .execute(&arguments, backend)
        .await
        .map_err(|reason| tag(ExecutionError::new(reason)))?;
      // The effect exists from here on, whatever fails below.
      if let Some(instruction) = plan.instruction_mut(position) {
        instruction.mark_applied(result.clone());
      }
      let record = ExecutionRecord {
        result: result.clone(),
        inputs,
      };
      backend.record_result(&key, &record).await.map_err(backend_error)?;
      (result, false)
    }
  };

  if let Some(instruction) = plan.instruction_mut(position) {
    instruction.mark_applied(result.clone());
  }
  resolve_emitted(plan, position, &result).map_err(tag)?;

  Ok(AppliedInstruction { id, result, reused })
}

/// Whether the effect described by a recorded `result` of `instruction` is still in place.
async fn record_holds<B: Backend>(
  plan: &InstructionPlan,
  instruction: &Instruction,
  result: &Value,
  backend: &B,
) -> Result<bool, BackendError> {
  let kind = instruction.kind();
  let Some(name) = result_name(result) else {
    return Ok(false);
  };
  let live = backend.resource_uuid(kind.resource(), name).await?;
  let recreated = match plan.recreated_after(instruction.position(), kind.resource(), name) {
    Some(later) => backend
      .recorded_result(later.idempotency_key())
      .await?
      .and_then(|record| result_uuid(&record.result).map(str::to_string)),
    None => None,
  };
  Ok(kind.record_holds(result, live.as_deref(), recreated.as_deref()))
}

/// Record the concrete value of every future the instruction at `position` emitted.
fn resolve_emitted(plan: &mut InstructionPlan, position: usize, result: &Value) -> Result<(), ExecutionError> {
  let futures: Vec<_> = plan
    .instruction(position)
    .map(|instruction| instruction.emitted_futures().into_iter().cloned().collect())
    .unwrap_or_default();

  for future in futures {
    let value = match result {
      Value::Dict(fields) => fields.get(&future.field).cloned(),
      _ => None,
    }
    .ok_or_else(|| ExecutionError::new(ExecutionReason::MissingResultField(future.field.clone())))?;
    debug!(future = %future, value = %value, "resolved future");
    plan.record_resolution(&future, value);
  }
  Ok(())
}

fn pending(
  plan: &InstructionPlan,
  from: usize,
  failed: Option<usize>,
  graph: &DependencyGraph,
) -> Vec<PendingInstruction> {
  plan
    .instructions()
    .iter()
    .skip(from)
    .map(|instruction| PendingInstruction {
      id: instruction.id().clone(),
      blocked_by_failure: failed.is_some_and(|failed| graph.depends_on(instruction.position(), failed)),
    })
    .collect()
}
