//! Composable argument validators.
//!
//! Validators are pure predicates over a [`Value`]. String-typed validators accept
//! a future reference in string position, since the referenced value will be a
//! string once it resolves. Validators that need the concrete value (ranges,
//! enumerations) reject a future reference with [`ValueError::UnresolvedFuture`].

use crate::error::ValueError;
use crate::value::{CompositeKind, Value};
use crate::value::extract::mismatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
  /// Accepts any value.
  Any,
  /// Any string, including the empty string.
  String,
  NonEmptyString,
  /// A non-empty list whose elements are all non-empty strings.
  NonEmptyStringList,
  /// Either a single non-empty string or a non-empty list of non-empty strings.
  StringOrNonEmptyStringList,
  IntInRange { min: i64, max: i64 },
  /// A string from a fixed set.
  OneOf(&'static [&'static str]),
  /// A composite value of the given kind.
  Composite(CompositeKind),
  /// A dict whose every value passes the inner validator.
  DictOf(Box<Validator>),
  /// Passes when any alternative passes.
  AnyOf(Vec<Validator>),
}

impl Validator {
  pub fn check(&self, value: &Value) -> Result<(), ValueError> {
    match self {
      Validator::Any => Ok(()),
      Validator::String => match value {
        Value::String(_) | Value::Future(_) => Ok(()),
        other => Err(mismatch("string", other)),
      },
      Validator::NonEmptyString => non_empty_string(value),
      Validator::NonEmptyStringList => non_empty_string_list(value),
      Validator::StringOrNonEmptyStringList => match value {
        Value::String(_) | Value::Future(_) => non_empty_string(value),
        Value::List(_) => non_empty_string_list(value),
        other => Err(mismatch(&self.describe(), other)),
      },
      Validator::IntInRange { min, max } => match value {
        Value::Int(n) if n < min || n > max => Err(ValueError::OutOfRange {
          value: *n,
          min: *min,
          max: *max,
        }),
        Value::Int(_) => Ok(()),
        other => Err(mismatch("int", other)),
      },
      Validator::OneOf(allowed) => match value {
        Value::String(s) if allowed.contains(&s.as_str()) => Ok(()),
        Value::String(s) => Err(ValueError::NotOneOf {
          value: s.clone(),
          allowed: allowed.join(", "),
        }),
        other => Err(mismatch("string", other)),
      },
      Validator::Composite(kind) => match value {
        Value::Composite(c) if c.kind() == *kind => Ok(()),
        other => Err(mismatch(kind.name(), other)),
      },
      Validator::DictOf(inner) => match value {
        Value::Dict(entries) => {
          for (key, entry) in entries {
            inner.check(entry).map_err(|reason| ValueError::Entry {
              key: key.clone(),
              reason: Box::new(reason),
            })?;
          }
          Ok(())
        }
        other => Err(mismatch(&self.describe(), other)),
      },
      Validator::AnyOf(alternatives) => {
        let mut first_failure = None;
        for alternative in alternatives {
          match alternative.check(value) {
            Ok(()) => return Ok(()),
            // a type mismatch only says this alternative does not apply
            Err(ValueError::TypeMismatch { .. }) => {}
            Err(reason) => {
              first_failure.get_or_insert(reason);
            }
          }
        }
        Err(first_failure.unwrap_or_else(|| mismatch(&self.describe(), value)))
      }
    }
  }

  /// Human-readable description of what this validator accepts.
  pub fn describe(&self) -> String {
    match self {
      Validator::Any => "any value".to_string(),
      Validator::String => "string".to_string(),
      Validator::NonEmptyString => "non-empty string".to_string(),
      Validator::NonEmptyStringList => "non-empty list of non-empty strings".to_string(),
      Validator::StringOrNonEmptyStringList => "string or non-empty list of non-empty strings".to_string(),
      Validator::IntInRange { min, max } => format!("int in [{}, {}]", min, max),
      Validator::OneOf(allowed) => format!("one of {}", allowed.join(", ")),
      Validator::Composite(kind) => kind.name().to_string(),
      Validator::DictOf(inner) => format!("dict of {}", inner.describe()),
      Validator::AnyOf(alternatives) => alternatives
        .iter()
        .map(Validator::describe)
        .collect::<Vec<_>>()
        .join(" or "),
    }
  }
}

fn non_empty_string(value: &Value) -> Result<(), ValueError> {
  match value {
    Value::String(s) if s.is_empty() => Err(ValueError::Empty),
    Value::String(_) | Value::Future(_) => Ok(()),
    other => Err(mismatch("non-empty string", other)),
  }
}

fn non_empty_string_list(value: &Value) -> Result<(), ValueError> {
  match value {
    Value::List(items) if items.is_empty() => Err(ValueError::Empty),
    Value::List(items) => {
      for (index, item) in items.iter().enumerate() {
        non_empty_string(item).map_err(|reason| ValueError::Element {
          index,
          reason: Box::new(reason),
        })?;
      }
      Ok(())
    }
    other => Err(mismatch("non-empty list of non-empty strings", other)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  use crate::error::InstructionRef;
  use crate::value::{CompositeValue, FutureRef};

  fn future() -> Value {
    Value::Future(FutureRef::new(&InstructionRef::new(0, "upload_files"), "name"))
  }

  #[test]
  fn non_empty_string_rules() {
    let v = Validator::NonEmptyString;
    assert!(v.check(&Value::from("x")).is_ok());
    assert_eq!(v.check(&Value::from("")), Err(ValueError::Empty));
    assert!(v.check(&future()).is_ok());
    assert!(matches!(v.check(&Value::Int(1)), Err(ValueError::TypeMismatch { .. })));
  }

  #[test]
  fn string_list_rejects_empty_list_and_empty_elements() {
    let v = Validator::NonEmptyStringList;
    assert!(v.check(&Value::from(vec!["a", "b"])).is_ok());
    assert_eq!(v.check(&Value::List(vec![])), Err(ValueError::Empty));
    assert!(matches!(
      v.check(&Value::from(vec!["a", ""])),
      Err(ValueError::Element { index: 1, .. })
    ));
  }

  #[test]
  fn string_or_list_accepts_both_forms() {
    let v = Validator::StringOrNonEmptyStringList;
    assert!(v.check(&Value::from("single")).is_ok());
    assert!(v.check(&Value::from(vec!["a"])).is_ok());
    assert!(v.check(&Value::List(vec![future()])).is_ok());
    assert_eq!(v.check(&Value::List(vec![])), Err(ValueError::Empty));
    assert!(v.check(&Value::Bool(true)).is_err());
  }

  #[test]
  fn int_range_is_inclusive() {
    let v = Validator::IntInRange { min: 1, max: 10 };
    assert!(v.check(&Value::Int(1)).is_ok());
    assert!(v.check(&Value::Int(10)).is_ok());
    assert!(matches!(v.check(&Value::Int(0)), Err(ValueError::OutOfRange { value: 0, .. })));
    assert!(matches!(v.check(&Value::Int(11)), Err(ValueError::OutOfRange { .. })));
  }

  #[test]
  fn int_range_rejects_future_with_origin() {
    let v = Validator::IntInRange { min: 1, max: 10 };
    match v.check(&future()) {
      Err(ValueError::UnresolvedFuture { reference, origin }) => {
        assert_eq!(reference, "{{future:0:name}}");
        assert_eq!(origin, InstructionRef::new(0, "upload_files"));
      }
      other => panic!("expected unresolved future error, got {:?}", other),
    }
  }

  #[test]
  fn one_of_lists_allowed_values() {
    let v = Validator::OneOf(&["TCP", "UDP"]);
    assert!(v.check(&Value::from("UDP")).is_ok());
    let err = v.check(&Value::from("ICMP")).unwrap_err();
    assert_eq!(err.to_string(), "'ICMP' is not one of: TCP, UDP");
  }

  #[test]
  fn dict_of_reports_offending_key() {
    let v = Validator::DictOf(Box::new(Validator::NonEmptyString));
    let mut entries = BTreeMap::new();
    entries.insert("ok".to_string(), Value::from("x"));
    entries.insert("bad".to_string(), Value::from(""));
    let err = v.check(&Value::Dict(entries)).unwrap_err();
    assert!(matches!(err, ValueError::Entry { ref key, .. } if key == "bad"));
  }

  #[test]
  fn any_of_prefers_a_meaningful_failure() {
    let v = Validator::AnyOf(vec![
      Validator::Composite(CompositeKind::Directory),
      Validator::NonEmptyString,
    ]);
    let directory = Value::Composite(CompositeValue::new(CompositeKind::Directory, BTreeMap::new()));
    assert!(v.check(&directory).is_ok());
    assert!(v.check(&Value::from("artifact")).is_ok());
    assert_eq!(v.check(&Value::from("")), Err(ValueError::Empty));
    let err = v.check(&Value::Int(3)).unwrap_err();
    assert_eq!(
      err,
      ValueError::TypeMismatch {
        expected: "Directory or non-empty string".to_string(),
        actual: "int".to_string(),
      }
    );
  }
}
