//! Argument schemas and binding.
//!
//! An action or composite type declares its arguments as an ordered list of
//! [`ArgumentDefinition`]s. [`bind`] matches the raw positional and keyword values
//! of a call against that list, runs each definition's validator, and produces an
//! [`ArgumentValueSet`].
//!
//! Binding is fail-fast: the first failing argument aborts with an
//! [`InterpretationError`] naming the argument and the attempted value.

mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{InterpretationError, InterpretationReason, ValueError};
use crate::util::hash::Hashable;
use crate::value::extract::extract_optional;
use crate::value::{FromValue, FutureRef, Value};

pub use validate::Validator;

/// Supplies the value of an optional argument that was not passed.
pub type ZeroValue = fn() -> Value;

/// Zero-value suppliers.
pub mod zero {
  use std::collections::BTreeMap;

  use crate::value::Value;

  pub fn string() -> Value {
    Value::String(String::new())
  }

  pub fn int() -> Value {
    Value::Int(0)
  }

  pub fn list() -> Value {
    Value::List(Vec::new())
  }

  pub fn dict() -> Value {
    Value::Dict(BTreeMap::new())
  }
}

/// Schema entry for one argument.
#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
  pub name: &'static str,
  pub optional: bool,
  pub zero_value: ZeroValue,
  pub validator: Validator,
}

impl ArgumentDefinition {
  pub fn required(name: &'static str, zero_value: ZeroValue, validator: Validator) -> Self {
    Self {
      name,
      optional: false,
      zero_value,
      validator,
    }
  }

  pub fn optional(name: &'static str, zero_value: ZeroValue, validator: Validator) -> Self {
    Self {
      name,
      optional: true,
      zero_value,
      validator,
    }
  }
}

/// Raw values of a call, as produced by the script front end.
///
/// A `None` positional value means "not passed", which lets callers skip a
/// position without shifting the ones after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArguments {
  pub positional: Vec<Option<Value>>,
  pub keyword: BTreeMap<String, Value>,
}

impl RawArguments {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn positional(mut self, value: impl Into<Value>) -> Self {
    self.positional.push(Some(value.into()));
    self
  }

  pub fn skip(mut self) -> Self {
    self.positional.push(None);
    self
  }

  pub fn keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.keyword.insert(name.into(), value.into());
    self
  }
}

/// One bound slot of an [`ArgumentValueSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundArgument {
  pub name: String,
  pub value: Value,
  /// False when the slot holds the definition's zero value.
  pub found: bool,
}

/// Arguments bound against a schema, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentValueSet {
  arguments: Vec<BoundArgument>,
}

impl Hashable for ArgumentValueSet {}

impl ArgumentValueSet {
  pub fn iter(&self) -> impl Iterator<Item = &BoundArgument> {
    self.arguments.iter()
  }

  pub fn get(&self, name: &str) -> Option<&BoundArgument> {
    self.arguments.iter().find(|arg| arg.name == name)
  }

  pub fn is_found(&self, name: &str) -> bool {
    self.get(name).is_some_and(|arg| arg.found)
  }

  /// The value of a slot that was passed by the caller.
  pub fn found_value(&self, name: &str) -> Option<&Value> {
    self.get(name).filter(|arg| arg.found).map(|arg| &arg.value)
  }

  /// The value of a slot, falling back to the zero value when it was not passed.
  pub fn value_or_zero(&self, name: &str) -> Option<&Value> {
    self.get(name).map(|arg| &arg.value)
  }

  /// Typed extraction: `Ok(None)` when the argument was not passed,
  /// `Err` when it was passed but does not have the requested type.
  pub fn extract<T: FromValue>(&self, name: &str) -> Result<Option<T>, ValueError> {
    extract_optional(self.found_value(name))
  }

  /// Replace the value of a passed slot, keeping its position.
  pub(crate) fn replace(&mut self, name: &str, value: Value) {
    if let Some(arg) = self.arguments.iter_mut().find(|arg| arg.name == name) {
      arg.value = value;
    }
  }

  /// Passed arguments as an attribute map, for composite construction.
  pub fn into_attributes(self) -> BTreeMap<String, Value> {
    self
      .arguments
      .into_iter()
      .filter(|arg| arg.found)
      .map(|arg| (arg.name, arg.value))
      .collect()
  }

  /// Every future reference among the passed arguments.
  pub fn futures(&self) -> Vec<&FutureRef> {
    self
      .arguments
      .iter()
      .filter(|arg| arg.found)
      .flat_map(|arg| arg.value.futures())
      .collect()
  }

  /// Rebuild the set with every passed value transformed by `f`.
  pub fn try_map_values<E>(&self, mut f: impl FnMut(&Value) -> Result<Value, E>) -> Result<Self, E> {
    let arguments = self
      .arguments
      .iter()
      .map(|arg| {
        let value = if arg.found { f(&arg.value)? } else { arg.value.clone() };
        Ok(BoundArgument {
          name: arg.name.clone(),
          value,
          found: arg.found,
        })
      })
      .collect::<Result<Vec<_>, E>>()?;
    Ok(Self { arguments })
  }
}

/// Bind raw call values against an ordered schema.
///
/// Positional values fill definitions in order; keyword values fill them by name.
/// For each definition: a passed value must pass the validator; a missing required
/// value is an error; a missing optional value takes the zero value and is marked
/// not found.
pub fn bind(definitions: &[ArgumentDefinition], raw: RawArguments) -> Result<ArgumentValueSet, InterpretationError> {
  let RawArguments { positional, mut keyword } = raw;

  if positional.len() > definitions.len() {
    return Err(InterpretationError::new(InterpretationReason::TooManyPositional {
      given: positional.len(),
      max: definitions.len(),
    }));
  }

  if let Some((name, value)) = keyword
    .iter()
    .find(|(name, _)| !definitions.iter().any(|d| d.name == name.as_str()))
  {
    return Err(InterpretationError::new(InterpretationReason::UnknownArgument).with_argument(name, Some(value)));
  }

  let mut positional = positional.into_iter();
  let mut arguments = Vec::with_capacity(definitions.len());

  for definition in definitions {
    let by_position = positional.next().flatten();
    let by_keyword = keyword.remove(definition.name);

    let value = match (by_position, by_keyword) {
      (Some(_), Some(value)) => {
        return Err(
          InterpretationError::new(InterpretationReason::DuplicateArgument).with_argument(definition.name, Some(&value)),
        );
      }
      (Some(value), None) | (None, Some(value)) => Some(value),
      (None, None) => None,
    };

    match value {
      Some(value) => {
        definition
          .validator
          .check(&value)
          .map_err(|reason| InterpretationError::new(reason).with_argument(definition.name, Some(&value)))?;
        arguments.push(BoundArgument {
          name: definition.name.to_string(),
          value,
          found: true,
        });
      }
      None if definition.optional => arguments.push(BoundArgument {
        name: definition.name.to_string(),
        value: (definition.zero_value)(),
        found: false,
      }),
      None => {
        return Err(InterpretationError::new(InterpretationReason::MissingArgument).with_argument(definition.name, None));
      }
    }
  }

  Ok(ArgumentValueSet { arguments })
}
