//! Script-level values.
//!
//! Every argument, binding and instruction result flowing through the engine is a
//! [`Value`]. Values own their contents, so cloning one yields an independent deep
//! copy; the engine copies values explicitly whenever they cross a scope boundary.

mod composite;
pub(crate) mod extract;
mod future;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use composite::{CompositeKind, CompositeValue};
pub use extract::FromValue;
pub use future::{Deferred, FutureRef};

/// A script-level value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
  String(String),
  Int(i64),
  Bool(bool),
  List(Vec<Value>),
  /// String-keyed mapping, ordered by key.
  Dict(BTreeMap<String, Value>),
  Composite(CompositeValue),
  /// Placeholder for a value produced by an instruction at execution time.
  Future(FutureRef),
}

impl Value {
  /// Short type name used in error messages.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::String(_) => "string",
      Value::Int(_) => "int",
      Value::Bool(_) => "bool",
      Value::List(_) => "list",
      Value::Dict(_) => "dict",
      Value::Composite(c) => c.kind().name(),
      Value::Future(_) => "future reference",
    }
  }

  /// Independent deep copy of this value.
  pub fn deep_copy(&self) -> Value {
    match self {
      Value::Composite(c) => Value::Composite(c.copy()),
      other => other.clone(),
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_future(&self) -> Option<&FutureRef> {
    match self {
      Value::Future(f) => Some(f),
      _ => None,
    }
  }

  /// All future references nested anywhere in this value, in traversal order.
  pub fn futures(&self) -> Vec<&FutureRef> {
    let mut found = Vec::new();
    self.collect_futures(&mut found);
    found
  }

  fn collect_futures<'a>(&'a self, found: &mut Vec<&'a FutureRef>) {
    match self {
      Value::Future(f) => found.push(f),
      Value::List(items) => items.iter().for_each(|v| v.collect_futures(found)),
      Value::Dict(entries) => entries.values().for_each(|v| v.collect_futures(found)),
      Value::Composite(c) => c.attributes().values().for_each(|v| v.collect_futures(found)),
      Value::String(_) | Value::Int(_) | Value::Bool(_) => {}
    }
  }

  /// Rebuild this value with every future replaced by `resolve(future)`.
  pub fn try_map_futures<E>(&self, resolve: &mut impl FnMut(&FutureRef) -> Result<Value, E>) -> Result<Value, E> {
    Ok(match self {
      Value::Future(f) => resolve(f)?,
      Value::List(items) => Value::List(
        items
          .iter()
          .map(|v| v.try_map_futures(resolve))
          .collect::<Result<_, _>>()?,
      ),
      Value::Dict(entries) => Value::Dict(
        entries
          .iter()
          .map(|(k, v)| Ok((k.clone(), v.try_map_futures(resolve)?)))
          .collect::<Result<BTreeMap<_, _>, E>>()?,
      ),
      Value::Composite(c) => {
        let attributes = c
          .attributes()
          .iter()
          .map(|(k, v)| Ok((k.clone(), v.try_map_futures(resolve)?)))
          .collect::<Result<BTreeMap<_, _>, E>>()?;
        Value::Composite(CompositeValue::new(c.kind(), attributes))
      }
      scalar => scalar.clone(),
    })
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::String(s)
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Int(n)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<CompositeValue> for Value {
  fn from(c: CompositeValue) -> Self {
    Value::Composite(c)
  }
}

impl From<FutureRef> for Value {
  fn from(f: FutureRef) -> Self {
    Value::Future(f)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::List(items.into_iter().map(Into::into).collect())
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::String(s) => write!(f, "{:?}", s),
      Value::Int(n) => write!(f, "{}", n),
      Value::Bool(b) => write!(f, "{}", b),
      Value::List(items) => {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", item)?;
        }
        write!(f, "]")
      }
      Value::Dict(entries) => {
        write!(f, "{{")?;
        for (i, (key, value)) in entries.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{:?}: {}", key, value)?;
        }
        write!(f, "}}")
      }
      Value::Composite(c) => write!(f, "{}", c),
      Value::Future(r) => write!(f, "{}", r),
    }
  }
}
