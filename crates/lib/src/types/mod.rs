//! The closed catalog of composite types.
//!
//! Each composite type is a thin typed wrapper around a [`CompositeValue`] that
//! shares the [`CompositeType`] capability surface: a schema, a constructor going
//! through the argument binder, checked conversion from a raw composite value and
//! an independent copy.

mod directory;
mod port_spec;

use crate::argument::{self, ArgumentDefinition, RawArguments};
use crate::error::{InterpretationError, ValueError};
use crate::value::{CompositeKind, CompositeValue, Value};

pub use directory::{ARTIFACT_NAMES_ATTR, DIRECTORY_TYPE_NAME, Directory, PERSISTENT_KEY_ATTR, SIZE_ATTR};
pub use port_spec::{PORT_SPEC_TYPE_NAME, PortSpec, TransportProtocol};

/// Capability surface shared by every composite type.
pub trait CompositeType: Sized {
  const KIND: CompositeKind;

  /// Ordered argument schema of the constructor.
  fn arguments() -> Vec<ArgumentDefinition>;

  /// Wrap a composite value already known to be of kind [`Self::KIND`].
  fn wrap(value: CompositeValue) -> Self;

  fn as_composite(&self) -> &CompositeValue;

  fn as_composite_mut(&mut self) -> &mut CompositeValue;

  /// Bind `raw` against the schema and build an instance.
  fn construct(raw: RawArguments) -> Result<Self, InterpretationError> {
    instantiate(Self::KIND, raw).map(Self::wrap)
  }

  /// Checked conversion from a raw composite value.
  fn from_composite(value: CompositeValue) -> Result<Self, ValueError> {
    if value.kind() == Self::KIND {
      Ok(Self::wrap(value))
    } else {
      Err(ValueError::TypeMismatch {
        expected: Self::KIND.name().to_string(),
        actual: value.kind().name().to_string(),
      })
    }
  }

  /// Checked conversion from any value.
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Composite(c) => Self::from_composite(c.clone()),
      other => Err(crate::value::extract::mismatch(Self::KIND.name(), other)),
    }
  }

  /// Independent copy with the same concrete type.
  fn copy(&self) -> Self {
    Self::wrap(self.as_composite().copy())
  }

  /// Set one attribute after running the schema's validator for it.
  fn set(&mut self, name: &str, value: Value) -> Result<(), InterpretationError> {
    let definition = Self::arguments()
      .into_iter()
      .find(|definition| definition.name == name)
      .ok_or_else(|| {
        InterpretationError::new(crate::error::InterpretationReason::UnknownArgument)
          .with_argument(name, Some(&value))
          .in_callee(Self::KIND.name())
      })?;
    definition.validator.check(&value).map_err(|reason| {
      InterpretationError::new(reason)
        .with_argument(name, Some(&value))
        .in_callee(Self::KIND.name())
    })?;
    self.as_composite_mut().set_attribute(name, value);
    Ok(())
  }

  fn into_value(self) -> Value {
    Value::Composite(self.as_composite().clone())
  }
}

/// Argument schema of a composite kind.
pub fn arguments(kind: CompositeKind) -> Vec<ArgumentDefinition> {
  match kind {
    CompositeKind::Directory => Directory::arguments(),
    CompositeKind::PortSpec => PortSpec::arguments(),
  }
}

/// Look up a composite type by its script name.
pub fn lookup(name: &str) -> Option<CompositeKind> {
  CompositeKind::from_name(name)
}

/// Bind raw call values against the schema of `kind` and build the value.
///
/// Errors carry the type name as callee; the caller attaches the instruction.
pub fn instantiate(kind: CompositeKind, raw: RawArguments) -> Result<CompositeValue, InterpretationError> {
  let bound = argument::bind(&arguments(kind), raw).map_err(|err| err.in_callee(kind.name()))?;
  Ok(CompositeValue::new(kind, bound.into_attributes()))
}
