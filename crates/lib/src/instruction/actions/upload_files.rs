//! `upload_files`: store local files as a named artifact.

use tracing::info;

use crate::argument::{ArgumentDefinition, ArgumentValueSet, Validator, zero};
use crate::backend::{Backend, BundleSpec};
use crate::error::{ExecutionReason, InstructionRef, InterpretationError, InterpretationReason, ValidationError};
use crate::instruction::Instruction;
use crate::plan::{InstructionPlan, ValidationScope};
use crate::value::{FutureRef, Value};

use super::{ActionKind, required, result_dict};

pub(super) const NAME: &str = "upload_files";

const SRC_ARG: &str = "src";
const NAME_ARG: &str = "name";

/// Result field holding the artifact name.
pub const NAME_FIELD: &str = "name";
const UUID_FIELD: &str = "uuid";

pub(super) fn arguments() -> Vec<ArgumentDefinition> {
  vec![
    ArgumentDefinition::required(SRC_ARG, zero::string, Validator::NonEmptyString),
    ArgumentDefinition::optional(NAME_ARG, zero::string, Validator::NonEmptyString),
  ]
}

/// A literal name is returned as is; otherwise the backend picks the name and the
/// script receives a future for it.
pub(super) fn interpret(
  arguments: &mut ArgumentValueSet,
  plan: &InstructionPlan,
  id: &InstructionRef,
) -> Result<Value, InterpretationError> {
  match arguments.found_value(NAME_ARG) {
    Some(Value::String(name)) => {
      let claimed = plan
        .instructions()
        .iter()
        .find(|earlier| earlier.kind() == ActionKind::UploadFiles && earlier.returns() == &Value::String(name.clone()));
      if let Some(earlier) = claimed {
        return Err(
          InterpretationError::new(InterpretationReason::NameCollision {
            name: name.clone(),
            first: earlier.id().clone(),
          })
          .with_argument(NAME_ARG, Some(&Value::String(name.clone()))),
        );
      }
      Ok(Value::String(name.clone()))
    }
    _ => Ok(Value::Future(FutureRef::new(id, NAME_FIELD))),
  }
}

pub(super) fn validate(instruction: &Instruction, scope: &mut ValidationScope<'_>) -> Vec<ValidationError> {
  match instruction.returns() {
    Value::String(name) => match scope.claim_artifact(name, instruction.id()) {
      Ok(()) => Vec::new(),
      Err(reason) => vec![ValidationError::new(reason).with_argument(NAME_ARG, Some(instruction.returns()))],
    },
    _ => Vec::new(),
  }
}

pub(super) async fn execute<B: Backend>(arguments: &ArgumentValueSet, backend: &B) -> Result<Value, ExecutionReason> {
  let spec = BundleSpec {
    source: required(arguments, SRC_ARG)?,
    name: arguments.extract(NAME_ARG)?,
  };
  let handle = backend.create_bundle(spec).await?;
  info!(artifact = %handle.name, uuid = %handle.uuid, "uploaded files");
  Ok(result_dict([
    (NAME_FIELD, Value::String(handle.name)),
    (UUID_FIELD, Value::String(handle.uuid)),
  ]))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::argument::RawArguments;
  use crate::instruction::registry;

  fn stage(plan: &mut InstructionPlan, raw: RawArguments) -> Result<Value, InterpretationError> {
    let instruction = registry().lookup(NAME).unwrap().stage(raw, plan)?;
    let returns = instruction.returns().clone();
    plan.push(instruction);
    Ok(returns)
  }

  #[test]
  fn literal_name_is_returned() {
    let mut plan = InstructionPlan::new();
    let returned = stage(&mut plan, RawArguments::new().positional("./site").positional("site")).unwrap();
    assert_eq!(returned, Value::from("site"));
  }

  #[test]
  fn unnamed_upload_returns_future() {
    let mut plan = InstructionPlan::new();
    stage(&mut plan, RawArguments::new().positional("./a").positional("a")).unwrap();
    let returned = stage(&mut plan, RawArguments::new().positional("./b")).unwrap();
    assert_eq!(returned.to_string(), "{{future:1:name}}");
  }

  #[test]
  fn reusing_a_literal_name_collides() {
    let mut plan = InstructionPlan::new();
    stage(&mut plan, RawArguments::new().positional("./a").keyword(NAME_ARG, "site")).unwrap();
    let err = stage(&mut plan, RawArguments::new().positional("./b").keyword(NAME_ARG, "site")).unwrap_err();
    assert_eq!(
      err.reason,
      InterpretationReason::NameCollision {
        name: "site".to_string(),
        first: InstructionRef::new(0, NAME),
      }
    );
    assert_eq!(err.context.instruction, Some(InstructionRef::new(1, NAME)));
    assert_eq!(plan.len(), 1);
  }
}
