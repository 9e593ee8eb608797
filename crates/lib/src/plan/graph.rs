//! Dependency graph between the instructions of a plan.
//!
//! An edge runs from the instruction that produces a future to every instruction
//! whose arguments contain it. Since futures may only point backwards, the graph
//! is acyclic for any well-formed plan; building it re-checks that invariant.

use std::collections::BTreeSet;

use petgraph::Direction;
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{ValidationError, ValidationReason};

use super::InstructionPlan;

#[derive(Debug)]
pub struct DependencyGraph {
  graph: DiGraph<usize, ()>,
}

impl DependencyGraph {
  /// Build the graph, reporting every future that does not point at a future
  /// emitted by an earlier instruction.
  ///
  /// Node indices are instruction positions, so a plan whose positions are not
  /// exactly `0..len` is rejected before any edge is added.
  pub fn from_plan(plan: &InstructionPlan) -> Result<Self, Vec<ValidationError>> {
    let misplaced: Vec<_> = plan
      .instructions()
      .iter()
      .enumerate()
      .filter(|(index, instruction)| instruction.position() != *index)
      .map(|(index, instruction)| {
        ValidationError::new(ValidationReason::MisplacedInstruction {
          index,
          position: instruction.position(),
        })
      })
      .collect();
    if !misplaced.is_empty() {
      return Err(misplaced);
    }

    let mut graph = DiGraph::with_capacity(plan.len(), 0);
    for instruction in plan.instructions() {
      graph.add_node(instruction.position());
    }

    let mut errors = Vec::new();
    for instruction in plan.instructions() {
      let consumer = NodeIndex::new(instruction.position());
      for future in instruction.arguments().futures() {
        let emitted = future.position < instruction.position()
          && plan
            .instruction(future.position)
            .is_some_and(|origin| origin.emitted_futures().contains(&future));
        if emitted {
          graph.update_edge(NodeIndex::new(future.position), consumer, ());
        } else {
          errors.push(
            ValidationError::new(ValidationReason::ForwardReference {
              reference: future.to_string(),
            })
            .in_callee(instruction.kind().name())
            .at(instruction.id()),
          );
        }
      }
    }

    if toposort(&graph, None).is_err() {
      errors.push(ValidationError::new(ValidationReason::Cycle));
    }

    if errors.is_empty() { Ok(Self { graph }) } else { Err(errors) }
  }

  /// Positions whose futures `position` consumes directly.
  pub fn dependencies(&self, position: usize) -> BTreeSet<usize> {
    self.neighbors(position, Direction::Incoming)
  }

  /// Positions consuming futures of `position` directly.
  pub fn dependents(&self, position: usize) -> BTreeSet<usize> {
    self.neighbors(position, Direction::Outgoing)
  }

  /// Whether `position` consumes, directly or transitively, a future of `origin`.
  pub fn depends_on(&self, position: usize, origin: usize) -> bool {
    if position == origin || position >= self.graph.node_count() || origin >= self.graph.node_count() {
      return false;
    }
    has_path_connecting(&self.graph, NodeIndex::new(origin), NodeIndex::new(position), None)
  }

  fn neighbors(&self, position: usize, direction: Direction) -> BTreeSet<usize> {
    if position >= self.graph.node_count() {
      return BTreeSet::new();
    }
    self
      .graph
      .neighbors_directed(NodeIndex::new(position), direction)
      .map(|idx| self.graph[idx])
      .collect()
  }
}
