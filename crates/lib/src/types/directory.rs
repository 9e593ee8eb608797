//! The `Directory` composite type.
//!
//! A directory mounted into a service: either filled from uploaded artifacts or
//! backed by a persistent volume identified by a key. All three attributes are
//! optional; reads normalize legacy shapes and apply defaults.

use crate::argument::{ArgumentDefinition, RawArguments, Validator, zero};
use crate::consts::{DEFAULT_PERSISTENT_DIRECTORY_SIZE_BYTES, MEGABYTE};
use crate::error::{InterpretationError, ValueError};
use crate::value::extract::extract_optional;
use crate::value::{CompositeKind, CompositeValue, Deferred, FromValue, Value};

use super::CompositeType;

pub const DIRECTORY_TYPE_NAME: &str = "Directory";
pub const ARTIFACT_NAMES_ATTR: &str = "artifact_names";
pub const PERSISTENT_KEY_ATTR: &str = "persistent_key";
/// Size in megabytes.
pub const SIZE_ATTR: &str = "size";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory(CompositeValue);

impl CompositeType for Directory {
  const KIND: CompositeKind = CompositeKind::Directory;

  fn arguments() -> Vec<ArgumentDefinition> {
    vec![
      ArgumentDefinition::optional(ARTIFACT_NAMES_ATTR, zero::list, Validator::StringOrNonEmptyStringList),
      ArgumentDefinition::optional(PERSISTENT_KEY_ATTR, zero::string, Validator::NonEmptyString),
      ArgumentDefinition::optional(SIZE_ATTR, zero::int, Validator::IntInRange { min: 1, max: i64::MAX }),
    ]
  }

  fn wrap(value: CompositeValue) -> Self {
    Self(value)
  }

  fn as_composite(&self) -> &CompositeValue {
    &self.0
  }

  fn as_composite_mut(&mut self) -> &mut CompositeValue {
    &mut self.0
  }
}

impl Directory {
  pub fn new(raw: RawArguments) -> Result<Self, InterpretationError> {
    Self::construct(raw)
  }

  /// Legacy constructor: a directory filled from a single artifact.
  ///
  /// Feeds the name positionally into the same binder and schema as [`Directory::new`].
  pub fn from_artifact_name(name: impl Into<Deferred<String>>) -> Result<Self, InterpretationError> {
    Self::construct(RawArguments::new().positional(Value::from(name.into())))
  }

  /// Artifact names, possibly still future references, normalized to a list.
  pub fn artifact_references(&self) -> Result<Option<Vec<Deferred<String>>>, ValueError> {
    match self.0.attribute(ARTIFACT_NAMES_ATTR) {
      None => Ok(None),
      Some(list @ Value::List(_)) => Vec::<Deferred<String>>::from_value(list).map(Some),
      Some(single) => Deferred::<String>::from_value(single).map(|name| Some(vec![name])),
    }
  }

  /// Concrete artifact names, normalized to a list.
  ///
  /// Fails with [`ValueError::UnresolvedFuture`] while any name is still a future.
  pub fn artifact_names(&self) -> Result<Option<Vec<String>>, ValueError> {
    match self.0.attribute(ARTIFACT_NAMES_ATTR) {
      None => Ok(None),
      Some(list @ Value::List(_)) => Vec::<String>::from_value(list).map(Some),
      Some(single) => String::from_value(single).map(|name| Some(vec![name])),
    }
  }

  pub fn persistent_key(&self) -> Result<Option<String>, ValueError> {
    extract_optional(self.0.attribute(PERSISTENT_KEY_ATTR))
  }

  /// Size in bytes. Falls back to [`DEFAULT_PERSISTENT_DIRECTORY_SIZE_BYTES`].
  pub fn size_bytes(&self) -> Result<i64, ValueError> {
    match extract_optional::<i64>(self.0.attribute(SIZE_ATTR))? {
      None => Ok(DEFAULT_PERSISTENT_DIRECTORY_SIZE_BYTES),
      Some(megabytes) => megabytes
        .checked_mul(MEGABYTE)
        .ok_or_else(|| ValueError::Invalid(format!("size of {} MB does not fit in a byte count", megabytes))),
    }
  }
}
