use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InstructionRef;

use super::Value;

/// A placeholder for a value only known once an instruction has executed.
///
/// A future is scoped to one plan and identified by the producing instruction's
/// position and a field of that instruction's result. It renders as
/// `{{future:<position>:<field>}}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FutureRef {
  pub position: usize,
  pub action: String,
  pub field: String,
}

impl FutureRef {
  pub fn new(origin: &InstructionRef, field: impl Into<String>) -> Self {
    Self {
      position: origin.position,
      action: origin.action.clone(),
      field: field.into(),
    }
  }

  /// The instruction that will produce this value.
  pub fn origin(&self) -> InstructionRef {
    InstructionRef::new(self.position, self.action.clone())
  }

  /// Stable string key, used for the plan's resolution table.
  pub fn key(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for FutureRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{{{future:{}:{}}}}}", self.position, self.field)
  }
}

/// A value that is either already known or still a future reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deferred<T> {
  Known(T),
  Future(FutureRef),
}

impl<T> Deferred<T> {
  pub fn known(&self) -> Option<&T> {
    match self {
      Deferred::Known(v) => Some(v),
      Deferred::Future(_) => None,
    }
  }

  pub fn future(&self) -> Option<&FutureRef> {
    match self {
      Deferred::Known(_) => None,
      Deferred::Future(f) => Some(f),
    }
  }
}

impl From<&str> for Deferred<String> {
  fn from(s: &str) -> Self {
    Deferred::Known(s.to_string())
  }
}

impl From<String> for Deferred<String> {
  fn from(s: String) -> Self {
    Deferred::Known(s)
  }
}

impl From<FutureRef> for Deferred<String> {
  fn from(f: FutureRef) -> Self {
    Deferred::Future(f)
  }
}

impl<T: Into<Value>> From<Deferred<T>> for Value {
  fn from(d: Deferred<T>) -> Self {
    match d {
      Deferred::Known(v) => v.into(),
      Deferred::Future(f) => Value::Future(f),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn renders_position_and_field() {
    let future = FutureRef::new(&InstructionRef::new(4, "add_service"), "ip_address");
    assert_eq!(future.to_string(), "{{future:4:ip_address}}");
    assert_eq!(future.origin(), InstructionRef::new(4, "add_service"));
  }

  #[test]
  fn deferred_converts_into_value() {
    let future = FutureRef::new(&InstructionRef::new(0, "upload_files"), "name");
    assert_eq!(Value::from(Deferred::from("app")), Value::from("app"));
    assert_eq!(Value::from(Deferred::<String>::from(future.clone())), Value::Future(future));
  }
}
