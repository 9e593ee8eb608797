//! enclave-lib: script compilation and execution planning for multi-component environments
//!
//! Scripts describe services, file bundles and directories. This crate turns them
//! into an [`plan::InstructionPlan`] and runs it against a [`backend::Backend`]:
//! - `value`, `argument`: script values, argument schemas and binding
//! - `types`: the composite types scripts can construct (`Directory`, `PortSpec`)
//! - `instruction`: the action registry and the per-action handlers
//! - `plan`: interpret → validate → execute, with idempotent re-application
//! - `backend`: the backend contract and an in-process state backend

pub mod argument;
pub mod backend;
pub mod consts;
pub mod error;
pub mod instruction;
pub mod paths;
pub mod plan;
pub mod script;
pub mod types;
pub mod util;
pub mod value;
