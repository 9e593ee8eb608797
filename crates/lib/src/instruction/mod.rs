//! Instructions: first-class environment actions staged into a plan.
//!
//! An [`Instruction`] is created once, during interpretation, by the action's
//! interpret handler. Afterwards only its `applied` flag and recorded result
//! change, and only through the execution pipeline.

pub mod actions;
mod registry;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::argument::ArgumentValueSet;
use crate::error::InstructionRef;
use crate::util::hash::{HashError, Hashable, ObjectHash};
use crate::value::{FutureRef, Value};

pub use actions::ActionKind;
pub use registry::{InstructionDescriptor, Registry, registry};

/// One staged action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
  id: InstructionRef,
  kind: ActionKind,
  arguments: ArgumentValueSet,
  returns: Value,
  idempotency_key: ObjectHash,
  applied: bool,
  result: Option<Value>,
}

/// The content an idempotency key is computed over.
#[derive(Serialize)]
struct KeyMaterial<'a> {
  position: usize,
  action: &'a str,
  arguments: &'a ArgumentValueSet,
}

impl Hashable for KeyMaterial<'_> {}

impl Instruction {
  pub fn new(
    id: InstructionRef,
    kind: ActionKind,
    arguments: ArgumentValueSet,
    returns: Value,
  ) -> Result<Self, HashError> {
    let idempotency_key = KeyMaterial {
      position: id.position,
      action: kind.name(),
      arguments: &arguments,
    }
    .compute_hash()?;

    Ok(Self {
      id,
      kind,
      arguments,
      returns,
      idempotency_key,
      applied: false,
      result: None,
    })
  }

  pub fn id(&self) -> &InstructionRef {
    &self.id
  }

  pub fn position(&self) -> usize {
    self.id.position
  }

  pub fn kind(&self) -> ActionKind {
    self.kind
  }

  pub fn arguments(&self) -> &ArgumentValueSet {
    &self.arguments
  }

  /// The value the script saw when the instruction was staged.
  pub fn returns(&self) -> &Value {
    &self.returns
  }

  pub fn idempotency_key(&self) -> &ObjectHash {
    &self.idempotency_key
  }

  pub fn is_applied(&self) -> bool {
    self.applied
  }

  /// Result of the last successful execution.
  pub fn result(&self) -> Option<&Value> {
    self.result.as_ref()
  }

  /// Positions of the instructions whose futures appear in the arguments.
  pub fn dependencies(&self) -> BTreeSet<usize> {
    self.arguments.futures().into_iter().map(|f| f.position).collect()
  }

  /// Futures this instruction promises to resolve when it executes.
  pub fn emitted_futures(&self) -> Vec<&FutureRef> {
    self
      .returns
      .futures()
      .into_iter()
      .filter(|f| f.position == self.id.position)
      .collect()
  }

  pub(crate) fn mark_applied(&mut self, result: Value) {
    self.applied = true;
    self.result = Some(result);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::argument::{RawArguments, bind};

  fn upload(position: usize, src: &str) -> Instruction {
    let kind = ActionKind::UploadFiles;
    let arguments = bind(&kind.arguments(), RawArguments::new().positional(src)).unwrap();
    let id = InstructionRef::new(position, kind.name());
    let returns = Value::Future(FutureRef::new(&id, "name"));
    Instruction::new(id, kind, arguments, returns).unwrap()
  }

  #[test]
  fn key_depends_on_position_and_arguments() {
    assert_eq!(upload(0, "./a").idempotency_key(), upload(0, "./a").idempotency_key());
    assert_ne!(upload(0, "./a").idempotency_key(), upload(1, "./a").idempotency_key());
    assert_ne!(upload(0, "./a").idempotency_key(), upload(0, "./b").idempotency_key());
  }

  #[test]
  fn key_ignores_execution_state() {
    let mut instruction = upload(0, "./a");
    let before = instruction.idempotency_key().clone();
    instruction.mark_applied(Value::from("bundle"));
    assert!(instruction.is_applied());
    assert_eq!(instruction.idempotency_key(), &before);
    assert_eq!(instruction.result(), Some(&Value::from("bundle")));
  }

  #[test]
  fn emitted_futures_belong_to_the_instruction() {
    let instruction = upload(3, "./a");
    let emitted = instruction.emitted_futures();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].to_string(), "{{future:3:name}}");
    assert!(instruction.dependencies().is_empty());
  }
}
