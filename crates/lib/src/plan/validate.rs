//! Whole-plan validation.
//!
//! Validation walks the staged instructions in order with a [`ValidationScope`]
//! that tracks which services and artifacts exist at each point of the plan.
//! Every problem is collected; nothing is executed when any is found.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InstructionRef, ValidationError, ValidationReason};

use super::InstructionPlan;
use super::graph::DependencyGraph;

/// What already exists in the target environment before the plan runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationEnvironment {
  pub artifacts: BTreeSet<String>,
  pub services: BTreeSet<String>,
}

/// Running view of the environment while walking a plan.
///
/// Origins are `None` for things that came from the environment.
#[derive(Debug)]
pub struct ValidationScope<'a> {
  plan: &'a InstructionPlan,
  env: &'a ValidationEnvironment,
  artifacts: BTreeMap<String, InstructionRef>,
  services: BTreeMap<String, Option<InstructionRef>>,
  persistent_keys: BTreeMap<String, InstructionRef>,
}

impl<'a> ValidationScope<'a> {
  pub fn new(plan: &'a InstructionPlan, env: &'a ValidationEnvironment) -> Self {
    Self {
      plan,
      env,
      artifacts: BTreeMap::new(),
      services: env.services.iter().map(|name| (name.clone(), None)).collect(),
      persistent_keys: BTreeMap::new(),
    }
  }

  pub fn plan(&self) -> &InstructionPlan {
    self.plan
  }

  pub fn has_artifact(&self, name: &str) -> bool {
    self.artifacts.contains_key(name) || self.env.artifacts.contains(name)
  }

  pub fn claim_artifact(&mut self, name: &str, origin: &InstructionRef) -> Result<(), ValidationReason> {
    if let Some(first) = self.artifacts.get(name) {
      return Err(ValidationReason::DuplicateArtifact {
        name: name.to_string(),
        first: Some(first.clone()),
      });
    }
    if self.env.artifacts.contains(name) {
      return Err(ValidationReason::DuplicateArtifact {
        name: name.to_string(),
        first: None,
      });
    }
    self.artifacts.insert(name.to_string(), origin.clone());
    Ok(())
  }

  pub fn is_service_live(&self, name: &str) -> bool {
    self.services.contains_key(name)
  }

  pub fn add_service(&mut self, name: &str, origin: &InstructionRef) -> Result<(), ValidationReason> {
    if let Some(first) = self.services.get(name) {
      return Err(ValidationReason::DuplicateService {
        name: name.to_string(),
        first: first.clone(),
      });
    }
    self.services.insert(name.to_string(), Some(origin.clone()));
    Ok(())
  }

  pub fn remove_service(&mut self, name: &str) -> Result<(), ValidationReason> {
    self
      .services
      .remove(name)
      .map(|_| ())
      .ok_or_else(|| ValidationReason::UnknownService(name.to_string()))
  }

  pub fn claim_persistent_key(&mut self, key: &str, origin: &InstructionRef) -> Result<(), ValidationReason> {
    if let Some(first) = self.persistent_keys.get(key) {
      return Err(ValidationReason::DuplicatePersistentKey {
        key: key.to_string(),
        first: first.clone(),
      });
    }
    self.persistent_keys.insert(key.to_string(), origin.clone());
    Ok(())
  }
}

/// Validate every instruction of `plan`, returning all errors found.
pub fn validate_plan(plan: &InstructionPlan, env: &ValidationEnvironment) -> Result<(), Vec<ValidationError>> {
  let mut errors = match DependencyGraph::from_plan(plan) {
    Ok(_) => Vec::new(),
    Err(errors) => errors,
  };

  let mut scope = ValidationScope::new(plan, env);
  for instruction in plan.instructions() {
    let name = instruction.kind().name();
    errors.extend(
      instruction
        .kind()
        .validate(instruction, &mut scope)
        .into_iter()
        .map(|e| e.in_callee(name).at(instruction.id())),
    );
  }

  debug!(instructions = plan.len(), errors = errors.len(), "validated plan");
  if errors.is_empty() { Ok(()) } else { Err(errors) }
}
