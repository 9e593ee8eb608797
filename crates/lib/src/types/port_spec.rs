//! The `PortSpec` composite type: one port a service exposes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::argument::{ArgumentDefinition, RawArguments, Validator, zero};
use crate::error::{InterpretationError, ValueError};
use crate::value::extract::extract_optional;
use crate::value::{CompositeKind, CompositeValue, FromValue};

use super::CompositeType;

pub const PORT_SPEC_TYPE_NAME: &str = "PortSpec";

const NUMBER_ATTR: &str = "number";
const TRANSPORT_PROTOCOL_ATTR: &str = "transport_protocol";
const APPLICATION_PROTOCOL_ATTR: &str = "application_protocol";

const TRANSPORT_PROTOCOLS: &[&str] = &["TCP", "UDP", "SCTP"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportProtocol {
  #[default]
  #[serde(rename = "TCP")]
  Tcp,
  #[serde(rename = "UDP")]
  Udp,
  #[serde(rename = "SCTP")]
  Sctp,
}

impl TransportProtocol {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "TCP" => Some(Self::Tcp),
      "UDP" => Some(Self::Udp),
      "SCTP" => Some(Self::Sctp),
      _ => None,
    }
  }
}

impl fmt::Display for TransportProtocol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Tcp => write!(f, "TCP"),
      Self::Udp => write!(f, "UDP"),
      Self::Sctp => write!(f, "SCTP"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec(CompositeValue);

impl CompositeType for PortSpec {
  const KIND: CompositeKind = CompositeKind::PortSpec;

  fn arguments() -> Vec<ArgumentDefinition> {
    vec![
      ArgumentDefinition::required(NUMBER_ATTR, zero::int, Validator::IntInRange { min: 1, max: 65535 }),
      ArgumentDefinition::optional(
        TRANSPORT_PROTOCOL_ATTR,
        zero::string,
        Validator::OneOf(TRANSPORT_PROTOCOLS),
      ),
      ArgumentDefinition::optional(APPLICATION_PROTOCOL_ATTR, zero::string, Validator::NonEmptyString),
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

impl PortSpec {
  pub fn new(raw: RawArguments) -> Result<Self, InterpretationError> {
    Self::construct(raw)
  }

  pub fn number(&self) -> Result<u16, ValueError> {
    let attribute = self.0.attribute(NUMBER_ATTR).ok_or(ValueError::Empty)?;
    let number = i64::from_value(attribute)?;
    u16::try_from(number).map_err(|_| ValueError::OutOfRange {
      value: number,
      min: 1,
      max: 65535,
    })
  }

  pub fn transport_protocol(&self) -> Result<TransportProtocol, ValueError> {
    match extract_optional::<String>(self.0.attribute(TRANSPORT_PROTOCOL_ATTR))? {
      None => Ok(TransportProtocol::default()),
      Some(name) => TransportProtocol::parse(&name).ok_or_else(|| ValueError::NotOneOf {
        value: name,
        allowed: TRANSPORT_PROTOCOLS.join(", "),
      }),
    }
  }

  pub fn application_protocol(&self) -> Result<Option<String>, ValueError> {
    extract_optional(self.0.attribute(APPLICATION_PROTOCOL_ATTR))
  }
}
