//! Process-wide registry of actions.
//!
//! The table is built once, on first access, and never mutated afterwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use tracing::debug;

use crate::argument::{self, ArgumentDefinition, RawArguments};
use crate::error::{InstructionRef, InterpretationError, InterpretationReason};
use crate::plan::InstructionPlan;

use super::{ActionKind, Instruction};

/// Registry entry for one action.
#[derive(Debug, Clone)]
pub struct InstructionDescriptor {
  pub kind: ActionKind,
  pub arguments: Vec<ArgumentDefinition>,
}

impl InstructionDescriptor {
  fn new(kind: ActionKind) -> Self {
    Self {
      kind,
      arguments: kind.arguments(),
    }
  }

  /// Bind a call and run the action's interpret handler.
  ///
  /// The new instruction takes the next free position of `plan`; the caller is
  /// responsible for appending it.
  pub fn stage(&self, raw: RawArguments, plan: &InstructionPlan) -> Result<Instruction, InterpretationError> {
    let name = self.kind.name();
    let id = InstructionRef::new(plan.len(), name);

    let mut arguments = argument::bind(&self.arguments, raw).map_err(|e| e.in_callee(name).at(&id))?;
    let returns = self
      .kind
      .interpret(&mut arguments, plan, &id)
      .map_err(|e| e.in_callee(name).at(&id))?;

    debug!(instruction = %id, returns = %returns, "staged instruction");
    Instruction::new(id.clone(), self.kind, arguments, returns).map_err(|e| {
      InterpretationError::new(InterpretationReason::Encoding(e.to_string()))
        .in_callee(name)
        .at(&id)
    })
  }
}

#[derive(Debug)]
pub struct Registry {
  actions: BTreeMap<&'static str, InstructionDescriptor>,
}

impl Registry {
  fn build() -> Self {
    let actions = ActionKind::ALL
      .into_iter()
      .map(|kind| (kind.name(), InstructionDescriptor::new(kind)))
      .collect();
    Self { actions }
  }

  pub fn lookup(&self, name: &str) -> Option<&InstructionDescriptor> {
    self.actions.get(name)
  }

  pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.actions.keys().copied()
  }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::build);

pub fn registry() -> &'static Registry {
  &REGISTRY
}
