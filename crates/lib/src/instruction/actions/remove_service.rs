//! `remove_service`: stop and delete a running component.

use tracing::info;

use crate::argument::{ArgumentDefinition, ArgumentValueSet, Validator, zero};
use crate::backend::Backend;
use crate::error::{ExecutionReason, InstructionRef, InterpretationError, ValidationError};
use crate::instruction::Instruction;
use crate::plan::ValidationScope;
use crate::value::{FutureRef, Value};

use super::{required, result_dict};

pub(super) const NAME: &str = "remove_service";

const NAME_ARG: &str = "name";

const NAME_FIELD: &str = "name";
const UUID_FIELD: &str = "uuid";

pub(super) fn arguments() -> Vec<ArgumentDefinition> {
  vec![ArgumentDefinition::required(NAME_ARG, zero::string, Validator::NonEmptyString)]
}

pub(super) fn interpret(arguments: &mut ArgumentValueSet, id: &InstructionRef) -> Result<Value, InterpretationError> {
  required::<String>(arguments, NAME_ARG)
    .map_err(|reason| InterpretationError::new(reason).with_argument(NAME_ARG, arguments.found_value(NAME_ARG)))?;
  Ok(Value::Future(FutureRef::new(id, UUID_FIELD)))
}

pub(super) fn validate(instruction: &Instruction, scope: &mut ValidationScope<'_>) -> Vec<ValidationError> {
  let arguments = instruction.arguments();
  let removed = required::<String>(arguments, NAME_ARG)
    .map_err(ValidationError::new)
    .and_then(|name| scope.remove_service(&name).map_err(ValidationError::new));
  match removed {
    Ok(()) => Vec::new(),
    Err(err) => vec![err.with_argument(NAME_ARG, arguments.found_value(NAME_ARG))],
  }
}

pub(super) async fn execute<B: Backend>(arguments: &ArgumentValueSet, backend: &B) -> Result<Value, ExecutionReason> {
  let name: String = required(arguments, NAME_ARG)?;
  let handle = backend.remove_component(&name).await?;
  info!(service = %handle.name, uuid = %handle.uuid, "service removed");
  Ok(result_dict([
    (NAME_FIELD, Value::String(handle.name)),
    (UUID_FIELD, Value::String(handle.uuid)),
  ]))
}
