use std::collections::BTreeMap;

use crate::error::ValueError;

use super::{CompositeValue, Deferred, FutureRef, Value};

/// Typed extraction from a [`Value`].
///
/// Extraction of a concrete type from a future reference fails with
/// [`ValueError::UnresolvedFuture`]; use [`Deferred`] where a future is acceptable.
pub trait FromValue: Sized {
  fn from_value(value: &Value) -> Result<Self, ValueError>;
}

pub(crate) fn mismatch(expected: &str, value: &Value) -> ValueError {
  match value {
    Value::Future(f) => ValueError::UnresolvedFuture {
      reference: f.to_string(),
      origin: f.origin(),
    },
    other => ValueError::TypeMismatch {
      expected: expected.to_string(),
      actual: other.type_name().to_string(),
    },
  }
}

impl FromValue for Value {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    Ok(value.clone())
  }
}

impl FromValue for String {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::String(s) => Ok(s.clone()),
      other => Err(mismatch("string", other)),
    }
  }
}

impl FromValue for i64 {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Int(n) => Ok(*n),
      other => Err(mismatch("int", other)),
    }
  }
}

impl FromValue for bool {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Bool(b) => Ok(*b),
      other => Err(mismatch("bool", other)),
    }
  }
}

impl FromValue for CompositeValue {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Composite(c) => Ok(c.clone()),
      other => Err(mismatch("composite", other)),
    }
  }
}

impl FromValue for FutureRef {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Future(f) => Ok(f.clone()),
      other => Err(ValueError::TypeMismatch {
        expected: "future reference".to_string(),
        actual: other.type_name().to_string(),
      }),
    }
  }
}

impl<T: FromValue> FromValue for Deferred<T> {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Future(f) => Ok(Deferred::Future(f.clone())),
      other => T::from_value(other).map(Deferred::Known),
    }
  }
}

impl<T: FromValue> FromValue for Vec<T> {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::List(items) => items
        .iter()
        .enumerate()
        .map(|(index, item)| {
          T::from_value(item).map_err(|reason| ValueError::Element {
            index,
            reason: Box::new(reason),
          })
        })
        .collect(),
      other => Err(mismatch("list", other)),
    }
  }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
  fn from_value(value: &Value) -> Result<Self, ValueError> {
    match value {
      Value::Dict(entries) => entries
        .iter()
        .map(|(key, item)| {
          T::from_value(item)
            .map(|v| (key.clone(), v))
            .map_err(|reason| ValueError::Entry {
              key: key.clone(),
              reason: Box::new(reason),
            })
        })
        .collect(),
      other => Err(mismatch("dict", other)),
    }
  }
}

/// Extract an optional slot: `Ok(None)` when absent, `Err` when present but invalid.
pub(crate) fn extract_optional<T: FromValue>(value: Option<&Value>) -> Result<Option<T>, ValueError> {
  value.map(T::from_value).transpose()
}
