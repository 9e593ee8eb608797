//! Integration tests for enclave-lib.
//!
//! Scripts are interpreted, validated and executed end to end against the
//! in-process state backend.

mod common;
mod pipeline_tests;
mod script_tests;
