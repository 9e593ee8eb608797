//! `add_service`: start a named component from an image.

use std::collections::BTreeMap;

use tracing::info;

use crate::argument::{ArgumentDefinition, ArgumentValueSet, Validator, zero};
use crate::backend::{Backend, ComponentSpec, DirectoryMount, PortBinding};
use crate::error::{ExecutionReason, InstructionRef, InterpretationError, ValidationError, ValidationReason, ValueError};
use crate::instruction::Instruction;
use crate::plan::ValidationScope;
use crate::types::{CompositeType, DIRECTORY_TYPE_NAME, Directory, PERSISTENT_KEY_ATTR, PortSpec};
use crate::value::{CompositeKind, CompositeValue, Deferred, FromValue, FutureRef, Value};

use super::{ActionKind, required, result_dict, upload_files};

pub(super) const NAME: &str = "add_service";

const NAME_ARG: &str = "name";
const IMAGE_ARG: &str = "image";
const PORTS_ARG: &str = "ports";
const FILES_ARG: &str = "files";
const ENV_VARS_ARG: &str = "env_vars";

const NAME_FIELD: &str = "name";
const HOSTNAME_FIELD: &str = "hostname";
const IP_ADDRESS_FIELD: &str = "ip_address";
const UUID_FIELD: &str = "uuid";

pub(super) fn arguments() -> Vec<ArgumentDefinition> {
  vec![
    ArgumentDefinition::required(NAME_ARG, zero::string, Validator::NonEmptyString),
    ArgumentDefinition::required(IMAGE_ARG, zero::string, Validator::NonEmptyString),
    ArgumentDefinition::optional(
      PORTS_ARG,
      zero::dict,
      Validator::DictOf(Box::new(Validator::Composite(CompositeKind::PortSpec))),
    ),
    ArgumentDefinition::optional(
      FILES_ARG,
      zero::dict,
      Validator::DictOf(Box::new(Validator::AnyOf(vec![
        Validator::Composite(CompositeKind::Directory),
        Validator::NonEmptyString,
      ]))),
    ),
    ArgumentDefinition::optional(ENV_VARS_ARG, zero::dict, Validator::DictOf(Box::new(Validator::String))),
  ]
}

pub(super) fn interpret(arguments: &mut ArgumentValueSet, id: &InstructionRef) -> Result<Value, InterpretationError> {
  let name: String = required(arguments, NAME_ARG)
    .map_err(|reason| InterpretationError::new(reason).with_argument(NAME_ARG, arguments.found_value(NAME_ARG)))?;

  // legacy mounts name a single artifact instead of passing a Directory
  if let Some(Value::Dict(files)) = arguments.found_value(FILES_ARG) {
    let normalized = files
      .iter()
      .map(|(mount, value)| {
        normalize_mount(value)
          .map(|directory| (mount.clone(), directory))
          .map_err(|e| e.with_argument(FILES_ARG, Some(value)))
      })
      .collect::<Result<BTreeMap<_, _>, _>>()?;
    arguments.replace(FILES_ARG, Value::Dict(normalized));
  }

  Ok(result_dict([
    (NAME_FIELD, Value::String(name.clone())),
    (HOSTNAME_FIELD, Value::String(name)),
    (IP_ADDRESS_FIELD, Value::Future(FutureRef::new(id, IP_ADDRESS_FIELD))),
  ]))
}

fn normalize_mount(value: &Value) -> Result<Value, InterpretationError> {
  match value {
    Value::Composite(directory) => Ok(Value::Composite(directory.copy())),
    other => {
      let name = Deferred::<String>::from_value(other).map_err(InterpretationError::new)?;
      Ok(Directory::from_artifact_name(name)?.into_value())
    }
  }
}

pub(super) fn validate(instruction: &Instruction, scope: &mut ValidationScope<'_>) -> Vec<ValidationError> {
  let arguments = instruction.arguments();
  let mut errors = Vec::new();

  match required::<String>(arguments, NAME_ARG) {
    Ok(name) => {
      if let Err(reason) = scope.add_service(&name, instruction.id()) {
        errors.push(ValidationError::new(reason).with_argument(NAME_ARG, arguments.found_value(NAME_ARG)));
      }
    }
    Err(reason) => errors.push(ValidationError::new(reason).with_argument(NAME_ARG, arguments.found_value(NAME_ARG))),
  }

  let files = match arguments.extract::<BTreeMap<String, CompositeValue>>(FILES_ARG) {
    Ok(files) => files.unwrap_or_default(),
    Err(reason) => {
      errors.push(ValidationError::new(reason).with_argument(FILES_ARG, arguments.found_value(FILES_ARG)));
      BTreeMap::new()
    }
  };

  for composite in files.into_values() {
    match Directory::from_composite(composite) {
      Ok(directory) => validate_mount(&directory, instruction, scope, &mut errors),
      Err(reason) => errors.push(ValidationError::new(reason).with_argument(FILES_ARG, None)),
    }
  }

  errors
}

fn validate_mount(
  directory: &Directory,
  instruction: &Instruction,
  scope: &mut ValidationScope<'_>,
  errors: &mut Vec<ValidationError>,
) {
  match directory.artifact_references() {
    Ok(references) => {
      for reference in references.unwrap_or_default() {
        match reference {
          Deferred::Known(name) => {
            if !scope.has_artifact(&name) {
              errors.push(
                ValidationError::new(ValidationReason::UnknownArtifact(name.clone()))
                  .with_argument(FILES_ARG, Some(&Value::String(name))),
              );
            }
          }
          // forward references are reported by the dependency graph
          Deferred::Future(future) if future.position < instruction.position() => {
            if !is_artifact_future(scope, &future) {
              errors.push(
                ValidationError::new(ValidationReason::NotAnArtifact {
                  reference: future.to_string(),
                })
                .with_argument(FILES_ARG, Some(&Value::Future(future))),
              );
            }
          }
          Deferred::Future(_) => {}
        }
      }
    }
    Err(reason) => errors.push(ValidationError::new(reason).with_argument(FILES_ARG, None)),
  }

  match directory.persistent_key() {
    Ok(Some(key)) => {
      if let Err(reason) = scope.claim_persistent_key(&key, instruction.id()) {
        errors.push(
          ValidationError::new(reason)
            .with_argument(PERSISTENT_KEY_ATTR, Some(&Value::String(key)))
            .in_callee(DIRECTORY_TYPE_NAME),
        );
      }
    }
    Ok(None) | Err(ValueError::UnresolvedFuture { .. }) => {}
    Err(reason) => errors.push(ValidationError::new(reason).with_argument(PERSISTENT_KEY_ATTR, None)),
  }
}

fn is_artifact_future(scope: &ValidationScope<'_>, future: &FutureRef) -> bool {
  future.field == upload_files::NAME_FIELD
    && scope
      .plan()
      .instruction(future.position)
      .is_some_and(|origin| origin.kind() == ActionKind::UploadFiles)
}

pub(super) async fn execute<B: Backend>(arguments: &ArgumentValueSet, backend: &B) -> Result<Value, ExecutionReason> {
  let ports = arguments
    .extract::<BTreeMap<String, CompositeValue>>(PORTS_ARG)?
    .unwrap_or_default()
    .into_iter()
    .map(|(id, composite)| port_binding(composite).map(|binding| (id, binding)))
    .collect::<Result<BTreeMap<_, _>, ValueError>>()?;
  let files = arguments
    .extract::<BTreeMap<String, CompositeValue>>(FILES_ARG)?
    .unwrap_or_default()
    .into_iter()
    .map(|(path, composite)| directory_mount(composite).map(|mount| (path, mount)))
    .collect::<Result<BTreeMap<_, _>, ValueError>>()?;

  let spec = ComponentSpec {
    name: required(arguments, NAME_ARG)?,
    image: required(arguments, IMAGE_ARG)?,
    ports,
    files,
    env_vars: arguments.extract(ENV_VARS_ARG)?.unwrap_or_default(),
  };
  let handle = backend.run_component(spec).await?;
  info!(service = %handle.name, ip_address = %handle.ip_address, "service started");

  Ok(result_dict([
    (NAME_FIELD, Value::String(handle.name)),
    (HOSTNAME_FIELD, Value::String(handle.hostname)),
    (IP_ADDRESS_FIELD, Value::String(handle.ip_address)),
    (UUID_FIELD, Value::String(handle.uuid)),
  ]))
}

fn port_binding(composite: CompositeValue) -> Result<PortBinding, ValueError> {
  let port = PortSpec::from_composite(composite)?;
  Ok(PortBinding {
    number: port.number()?,
    transport_protocol: port.transport_protocol()?,
    application_protocol: port.application_protocol()?,
  })
}

fn directory_mount(composite: CompositeValue) -> Result<DirectoryMount, ValueError> {
  let directory = Directory::from_composite(composite)?;
  Ok(DirectoryMount {
    artifact_names: directory.artifact_names()?.unwrap_or_default(),
    persistent_key: directory.persistent_key()?,
    size_bytes: directory.size_bytes()?,
  })
}
