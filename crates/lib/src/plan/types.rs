//! Execution report and cancellation types.

use tokio::sync::watch;

use crate::error::{ExecutionError, InstructionRef};
use crate::value::Value;

/// An instruction that is applied after this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedInstruction {
  pub id: InstructionRef,
  pub result: Value,
  /// True when the result was adopted from a previous run instead of executed.
  pub reused: bool,
}

/// The instruction whose execution failed.
#[derive(Debug)]
pub struct FailedInstruction {
  pub id: InstructionRef,
  pub error: ExecutionError,
}

/// An instruction that was never attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInstruction {
  pub id: InstructionRef,
  /// Consumes, directly or transitively, a future of the failed instruction.
  pub blocked_by_failure: bool,
}

/// Outcome of executing a plan.
///
/// Instructions are partitioned into applied, at most one failed, and not
/// attempted, each list in plan order.
#[derive(Debug, Default)]
pub struct ExecutionReport {
  pub applied: Vec<AppliedInstruction>,
  pub failed: Option<FailedInstruction>,
  pub not_attempted: Vec<PendingInstruction>,
  pub cancelled: bool,
}

impl ExecutionReport {
  pub fn is_complete(&self) -> bool {
    self.failed.is_none() && !self.cancelled && self.not_attempted.is_empty()
  }

  /// Instructions whose backend operation actually ran in this execution.
  pub fn executed(&self) -> impl Iterator<Item = &AppliedInstruction> {
    self.applied.iter().filter(|applied| !applied.reused)
  }
}

/// Requests cancellation of a running execution.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
  pub fn cancel(&self) {
    self.0.send_replace(true);
  }
}

/// Observed by the executor before each instruction starts.
#[derive(Debug, Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
  /// A token that is never cancelled.
  pub fn never() -> Self {
    let (_, receiver) = watch::channel(false);
    Self(receiver)
  }

  pub fn is_cancelled(&self) -> bool {
    *self.0.borrow()
  }
}

pub fn cancellation() -> (CancelHandle, CancelToken) {
  let (sender, receiver) = watch::channel(false);
  (CancelHandle(sender), CancelToken(receiver))
}
