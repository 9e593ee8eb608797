//! The closed set of actions and their handlers.
//!
//! Every action has three handlers, dispatched by [`ActionKind`]:
//!
//! - `interpret`: runs while the script is evaluated. Never touches the backend;
//!   may read the plan staged so far. Returns the value the script sees, which
//!   may contain future references owned by the new instruction.
//! - `validate`: runs once the whole plan is staged, with a scope tracking what
//!   exists at each point of the plan. Pushes every problem it finds.
//! - `execute`: performs the backend call with fully resolved arguments and
//!   returns a dict holding at least every field the instruction promised.
//!
//! Every result also carries the `name` and `uuid` of the resource it touched,
//! which is how a recorded result is checked against the live environment.

mod add_service;
mod remove_service;
mod upload_files;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::argument::{ArgumentDefinition, ArgumentValueSet};
use crate::backend::{Backend, ResourceKind};
use crate::error::{ExecutionReason, InstructionRef, InterpretationError, ValidationError, ValueError};
use crate::plan::{InstructionPlan, ValidationScope};
use crate::value::{FromValue, Value};

use super::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
  UploadFiles,
  AddService,
  RemoveService,
}

impl ActionKind {
  pub const ALL: [ActionKind; 3] = [ActionKind::UploadFiles, ActionKind::AddService, ActionKind::RemoveService];

  pub fn name(self) -> &'static str {
    match self {
      ActionKind::UploadFiles => upload_files::NAME,
      ActionKind::AddService => add_service::NAME,
      ActionKind::RemoveService => remove_service::NAME,
    }
  }

  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|kind| kind.name() == name)
  }

  pub fn arguments(self) -> Vec<ArgumentDefinition> {
    match self {
      ActionKind::UploadFiles => upload_files::arguments(),
      ActionKind::AddService => add_service::arguments(),
      ActionKind::RemoveService => remove_service::arguments(),
    }
  }

  pub(crate) fn interpret(
    self,
    arguments: &mut ArgumentValueSet,
    plan: &InstructionPlan,
    id: &InstructionRef,
  ) -> Result<Value, InterpretationError> {
    match self {
      ActionKind::UploadFiles => upload_files::interpret(arguments, plan, id),
      ActionKind::AddService => add_service::interpret(arguments, id),
      ActionKind::RemoveService => remove_service::interpret(arguments, id),
    }
  }

  pub(crate) fn validate(self, instruction: &Instruction, scope: &mut ValidationScope<'_>) -> Vec<ValidationError> {
    match self {
      ActionKind::UploadFiles => upload_files::validate(instruction, scope),
      ActionKind::AddService => add_service::validate(instruction, scope),
      ActionKind::RemoveService => remove_service::validate(instruction, scope),
    }
  }

  pub(crate) async fn execute<B: Backend>(
    self,
    arguments: &ArgumentValueSet,
    backend: &B,
  ) -> Result<Value, ExecutionReason> {
    match self {
      ActionKind::UploadFiles => upload_files::execute(arguments, backend).await,
      ActionKind::AddService => add_service::execute(arguments, backend).await,
      ActionKind::RemoveService => remove_service::execute(arguments, backend).await,
    }
  }
}

impl ActionKind {
  /// The kind of resource a result of this action names.
  pub fn resource(self) -> ResourceKind {
    match self {
      ActionKind::UploadFiles => ResourceKind::Bundle,
      ActionKind::AddService | ActionKind::RemoveService => ResourceKind::Component,
    }
  }

  /// Literal name of the resource `instruction` creates, if it creates one.
  pub fn created_name(self, instruction: &Instruction) -> Option<&str> {
    match self {
      ActionKind::UploadFiles => instruction.returns().as_str(),
      ActionKind::AddService => instruction.arguments().found_value(NAME_ARG).and_then(Value::as_str),
      ActionKind::RemoveService => None,
    }
  }

  /// Whether a recorded result still describes the environment.
  ///
  /// `live` is the uuid of the resource currently holding the recorded name and
  /// `recreated` the uuid recorded by a later instruction of the same plan that
  /// creates a resource under that name again. A creation holds while the
  /// resource it created is live; a removal holds while nothing runs under the
  /// name, or only what the plan itself started afterwards.
  pub fn record_holds(self, result: &Value, live: Option<&str>, recreated: Option<&str>) -> bool {
    match self {
      ActionKind::UploadFiles | ActionKind::AddService => {
        result_field(result, RESULT_UUID).is_some_and(|uuid| live == Some(uuid))
      }
      ActionKind::RemoveService => live.is_none() || live == recreated,
    }
  }
}

const NAME_ARG: &str = "name";
const RESULT_NAME: &str = "name";
const RESULT_UUID: &str = "uuid";

/// String field of a result dict.
pub fn result_field<'a>(result: &'a Value, field: &str) -> Option<&'a str> {
  match result {
    Value::Dict(fields) => fields.get(field).and_then(Value::as_str),
    _ => None,
  }
}

/// Name of the resource a result describes.
pub fn result_name(result: &Value) -> Option<&str> {
  result_field(result, RESULT_NAME)
}

/// Uuid of the resource a result describes.
pub fn result_uuid(result: &Value) -> Option<&str> {
  result_field(result, RESULT_UUID)
}

/// Extract an argument the schema marks required.
fn required<T: FromValue>(arguments: &ArgumentValueSet, name: &str) -> Result<T, ValueError> {
  arguments
    .extract(name)?
    .ok_or_else(|| ValueError::Invalid(format!("required argument '{}' is not bound", name)))
}

fn result_dict<const N: usize>(fields: [(&str, Value); N]) -> Value {
  Value::Dict(
    fields
      .into_iter()
      .map(|(key, value)| (key.to_string(), value))
      .collect::<BTreeMap<_, _>>(),
  )
}
