//! Stratus Core
//!
//! Core library for Stratus providers: the value and schema model, name to
//! factory registries, the provider trait and the plan/apply machinery the
//! acceptance harness drives.

pub mod diagnostics;
pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod mutexkv;
pub mod parser;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod schema;
