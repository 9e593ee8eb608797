//! Phase-scoped errors for the plan pipeline.
//!
//! Every error raised while turning a script into effects belongs to exactly one
//! pipeline phase:
//!
//! - [`InterpretationError`]: a script-level value is malformed or invalid.
//! - [`ValidationError`]: the plan is internally consistent but semantically invalid.
//! - [`ExecutionError`]: a backend call failed or a future reference never resolved.
//!
//! All three share an [`ErrorContext`] naming the phase, the instruction (or the
//! callee, for composite constructors that are not instructions), the argument and
//! the attempted value, so a message can be rendered without re-deriving state.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendError;
use crate::value::Value;

/// Identity of an instruction: its position in the plan and its action name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstructionRef {
  pub position: usize,
  pub action: String,
}

impl InstructionRef {
  pub fn new(position: usize, action: impl Into<String>) -> Self {
    Self {
      position,
      action: action.into(),
    }
  }
}

impl fmt::Display for InstructionRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{} {}", self.position, self.action)
  }
}

/// The pipeline phase an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  Interpretation,
  Validation,
  Execution,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Phase::Interpretation => write!(f, "interpretation"),
      Phase::Validation => write!(f, "validation"),
      Phase::Execution => write!(f, "execution"),
    }
  }
}

/// Where an error happened and what value was being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
  pub phase: Phase,
  /// Action or composite type being called.
  pub callee: Option<String>,
  /// Set when the error belongs to a staged instruction.
  pub instruction: Option<InstructionRef>,
  pub argument: Option<String>,
  /// Rendering of the offending value.
  pub attempted: Option<String>,
}

impl ErrorContext {
  pub fn new(phase: Phase) -> Self {
    Self {
      phase,
      callee: None,
      instruction: None,
      argument: None,
      attempted: None,
    }
  }
}

impl fmt::Display for ErrorContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} error", self.phase)?;
    match (&self.instruction, &self.callee) {
      (Some(instruction), Some(callee)) if *callee != instruction.action => {
        write!(f, " in {} (instruction {})", callee, instruction)?
      }
      (Some(instruction), _) => write!(f, " in instruction {}", instruction)?,
      (None, Some(callee)) => write!(f, " in {}", callee)?,
      (None, None) => {}
    }
    if let Some(argument) = &self.argument {
      write!(f, ", argument '{}'", argument)?;
    }
    if let Some(attempted) = &self.attempted {
      write!(f, " = {}", attempted)?;
    }
    Ok(())
  }
}

/// Why a value failed a validator or a typed extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
  #[error("expected {expected}, got {actual}")]
  TypeMismatch { expected: String, actual: String },

  #[error("value must not be empty")]
  Empty,

  #[error("element #{index}: {reason}")]
  Element { index: usize, reason: Box<ValueError> },

  #[error("entry '{key}': {reason}")]
  Entry { key: String, reason: Box<ValueError> },

  #[error("{value} is outside the allowed range [{min}, {max}]")]
  OutOfRange { value: i64, min: i64, max: i64 },

  #[error("'{value}' is not one of: {allowed}")]
  NotOneOf { value: String, allowed: String },

  #[error("future reference {reference} (created by instruction {origin}) has no concrete value before execution")]
  UnresolvedFuture { reference: String, origin: InstructionRef },

  #[error("{0}")]
  Invalid(String),
}

/// Why interpretation of a call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpretationReason {
  #[error("missing required argument")]
  MissingArgument,

  #[error("unexpected keyword argument")]
  UnknownArgument,

  #[error("got {given} positional arguments but at most {max} are accepted")]
  TooManyPositional { given: usize, max: usize },

  #[error("argument passed both positionally and by keyword")]
  DuplicateArgument,

  #[error("{0}")]
  Value(#[from] ValueError),

  #[error("unknown action or type '{0}'")]
  UnknownCallee(String),

  #[error("undefined name '{0}'")]
  UndefinedName(String),

  #[error("value has no field '{0}'")]
  NoSuchField(String),

  #[error("'{name}' is already claimed by instruction {first}")]
  NameCollision { name: String, first: InstructionRef },

  #[error("failed to encode instruction: {0}")]
  Encoding(String),
}

/// Why a staged instruction is inconsistent with the rest of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationReason {
  #[error("service '{name}' already exists{}", describe_origin(.first))]
  DuplicateService { name: String, first: Option<InstructionRef> },

  #[error("service '{0}' does not exist at this point of the plan")]
  UnknownService(String),

  #[error("artifact '{name}' already exists{}", describe_origin(.first))]
  DuplicateArtifact { name: String, first: Option<InstructionRef> },

  #[error("artifact '{0}' is neither uploaded earlier in the plan nor present in the environment")]
  UnknownArtifact(String),

  #[error("persistent key '{key}' is already claimed by instruction {first}")]
  DuplicatePersistentKey { key: String, first: InstructionRef },

  #[error("future reference {reference} is not produced by an earlier instruction")]
  ForwardReference { reference: String },

  #[error("future reference {reference} does not name an artifact")]
  NotAnArtifact { reference: String },

  #[error("instruction at index {index} claims position {position}")]
  MisplacedInstruction { index: usize, position: usize },

  #[error("instruction dependency graph contains a cycle")]
  Cycle,

  #[error("{0}")]
  Value(#[from] ValueError),
}

fn describe_origin(first: &Option<InstructionRef>) -> String {
  match first {
    Some(first) => format!(" (created by instruction {})", first),
    None => " in the environment".to_string(),
  }
}

/// Why an instruction failed to execute.
#[derive(Debug, Error)]
pub enum ExecutionReason {
  #[error("backend error: {0}")]
  Backend(#[from] BackendError),

  #[error("future reference {reference} (created by instruction {origin}) was never resolved")]
  UnresolvedFuture { reference: String, origin: InstructionRef },

  #[error("backend result is missing field '{0}'")]
  MissingResultField(String),

  #[error("{0}")]
  Value(#[from] ValueError),
}

macro_rules! phase_error {
  ($(#[$meta:meta])* $name:ident, $reason:ty, $phase:expr) => {
    $(#[$meta])*
    #[derive(Debug, Error)]
    #[error("{context}: {reason}")]
    pub struct $name {
      pub context: ErrorContext,
      #[source]
      pub reason: $reason,
    }

    impl $name {
      pub fn new(reason: impl Into<$reason>) -> Self {
        Self {
          context: ErrorContext::new($phase),
          reason: reason.into(),
        }
      }

      /// Attach the instruction identity, unless one is already set.
      pub fn at(mut self, instruction: &InstructionRef) -> Self {
        if self.context.instruction.is_none() {
          self.context.instruction = Some(instruction.clone());
        }
        self
      }

      /// Attach the callee name, unless one is already set.
      pub fn in_callee(mut self, callee: &str) -> Self {
        if self.context.callee.is_none() {
          self.context.callee = Some(callee.to_string());
        }
        self
      }

      /// Attach the argument name and the attempted value, unless already set.
      pub fn with_argument(mut self, argument: &str, attempted: Option<&Value>) -> Self {
        if self.context.argument.is_none() {
          self.context.argument = Some(argument.to_string());
          self.context.attempted = attempted.map(Value::to_string);
        }
        self
      }
    }
  };
}

phase_error!(
  /// A script-level value is malformed or invalid.
  #[derive(Clone, PartialEq, Eq)]
  InterpretationError,
  InterpretationReason,
  Phase::Interpretation
);

phase_error!(
  /// The plan is internally consistent but semantically invalid.
  #[derive(Clone, PartialEq, Eq)]
  ValidationError,
  ValidationReason,
  Phase::Validation
);

phase_error!(
  /// A backend call failed or a future reference never resolved.
  ExecutionError,
  ExecutionReason,
  Phase::Execution
);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_instruction_argument_and_value() {
    let err = InterpretationError::new(ValueError::OutOfRange {
      value: 0,
      min: 1,
      max: i64::MAX,
    })
    .with_argument("size", Some(&Value::Int(0)))
    .in_callee("Directory")
    .at(&InstructionRef::new(3, "add_service"));

    let message = err.to_string();
    assert!(message.starts_with("interpretation error in Directory (instruction #3 add_service)"));
    assert!(message.contains("argument 'size' = 0"));
    assert!(message.contains("outside the allowed range [1,"));
  }

  #[test]
  fn first_context_wins() {
    let err = ValidationError::new(ValidationReason::UnknownService("db".to_string()))
      .at(&InstructionRef::new(1, "remove_service"))
      .at(&InstructionRef::new(7, "add_service"));
    assert_eq!(err.context.instruction, Some(InstructionRef::new(1, "remove_service")));
    assert_eq!(err.context.phase, Phase::Validation);
  }

  #[test]
  fn duplicate_service_mentions_environment_when_no_origin() {
    let reason = ValidationReason::DuplicateService {
      name: "web".to_string(),
      first: None,
    };
    assert_eq!(reason.to_string(), "service 'web' already exists in the environment");
  }

  #[test]
  fn execution_error_wraps_backend_error() {
    let err = ExecutionError::new(BackendError::ComponentNotFound("web".to_string()))
      .at(&InstructionRef::new(2, "remove_service"));
    assert_eq!(err.context.phase, Phase::Execution);
    assert!(err.to_string().contains("component 'web' not found"));
  }
}
