//! Script evaluation into an instruction plan.
//!
//! Evaluation is single-threaded and deterministic. It keeps going after a
//! failing statement so that one run reports every problem; names bound by a
//! failing `let` are poisoned, and later statements reading them are skipped
//! silently instead of producing follow-up errors.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::argument::RawArguments;
use crate::error::{InterpretationError, InterpretationReason, ValueError};
use crate::instruction::registry;
use crate::plan::InstructionPlan;
use crate::types;
use crate::value::Value;

use super::{CallNode, Expr, Script, Statement};

/// Interpret `script`, returning the staged plan or every interpretation error.
pub fn interpret(script: &Script) -> Result<InstructionPlan, Vec<InterpretationError>> {
  let mut interpreter = Interpreter::default();
  interpreter.run_block(&script.statements);

  debug!(
    instructions = interpreter.plan.len(),
    errors = interpreter.errors.len(),
    "script interpreted"
  );
  if interpreter.errors.is_empty() {
    Ok(interpreter.plan)
  } else {
    Err(interpreter.errors)
  }
}

enum EvalError {
  Failed(InterpretationError),
  /// Depends on a name whose definition already failed.
  Poisoned,
}

impl From<InterpretationError> for EvalError {
  fn from(e: InterpretationError) -> Self {
    EvalError::Failed(e)
  }
}

#[derive(Default)]
struct Interpreter {
  plan: InstructionPlan,
  poisoned: BTreeSet<String>,
  errors: Vec<InterpretationError>,
}

impl Interpreter {
  fn run_block(&mut self, statements: &[Statement]) {
    for statement in statements {
      self.run_statement(statement);
    }
  }

  fn run_statement(&mut self, statement: &Statement) {
    match statement {
      Statement::Call(call) => {
        if let Err(e) = self.eval_call(call) {
          self.report(e);
        }
      }
      Statement::Let(binding) => match self.eval(&binding.value) {
        Ok(value) => self.bind(&binding.name, value),
        Err(e) => {
          self.report(e);
          self.poisoned.insert(binding.name.clone());
        }
      },
      Statement::ForEach(each) => match self.eval(&each.items) {
        Ok(Value::List(items)) => {
          for item in items {
            self.bind(&each.var, item.deep_copy());
            self.run_block(&each.body);
          }
        }
        Ok(other) => self.report(EvalError::Failed(InterpretationError::new(ValueError::TypeMismatch {
          expected: "list".to_string(),
          actual: other.type_name().to_string(),
        }))),
        Err(e) => {
          self.report(e);
          self.poisoned.insert(each.var.clone());
        }
      },
    }
  }

  fn bind(&mut self, name: &str, value: Value) {
    self.poisoned.remove(name);
    self.plan.bind_value(name, value);
  }

  fn report(&mut self, error: EvalError) {
    if let EvalError::Failed(e) = error {
      debug!(error = %e, "statement failed");
      self.errors.push(e);
    }
  }

  fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
    Ok(match expr {
      Expr::Bool(b) => Value::Bool(*b),
      Expr::Int(n) => Value::Int(*n),
      Expr::String(s) => Value::String(s.clone()),
      Expr::List(items) => Value::List(items.iter().map(|item| self.eval(item)).collect::<Result<_, _>>()?),
      Expr::Dict(literal) => Value::Dict(
        literal
          .dict
          .iter()
          .map(|(key, item)| Ok((key.clone(), self.eval(item)?)))
          .collect::<Result<BTreeMap<_, _>, EvalError>>()?,
      ),
      Expr::Ref(reference) => {
        if self.poisoned.contains(&reference.name) {
          return Err(EvalError::Poisoned);
        }
        let value = self.plan.value(&reference.name).ok_or_else(|| {
          InterpretationError::new(InterpretationReason::UndefinedName(reference.name.clone()))
        })?;
        match &reference.field {
          None => value,
          Some(field) => match value {
            Value::Dict(mut fields) => fields
              .remove(field)
              .ok_or_else(|| InterpretationError::new(InterpretationReason::NoSuchField(field.clone())))?,
            _ => return Err(InterpretationError::new(InterpretationReason::NoSuchField(field.clone())).into()),
          },
        }
      }
      Expr::Call(call) => self.eval_call(call)?,
    })
  }

  /// Evaluate arguments, then dispatch to an action or a composite constructor.
  ///
  /// Arguments are evaluated first, so actions called inside them take the
  /// earlier positions.
  fn eval_call(&mut self, call: &CallNode) -> Result<Value, EvalError> {
    let mut raw = RawArguments::new();
    for arg in &call.args {
      raw.positional.push(arg.as_ref().map(|expr| self.eval(expr)).transpose()?);
    }
    for (name, expr) in &call.kwargs {
      let value = self.eval(expr)?;
      raw.keyword.insert(name.clone(), value);
    }

    if let Some(descriptor) = registry().lookup(&call.call) {
      let instruction = descriptor.stage(raw, &self.plan)?;
      let returns = instruction.returns().clone();
      self.plan.push(instruction);
      return Ok(returns);
    }

    if let Some(kind) = types::lookup(&call.call) {
      return Ok(Value::Composite(types::instantiate(kind, raw)?));
    }

    Err(InterpretationError::new(InterpretationReason::UnknownCallee(call.call.clone())).into())
  }
}
