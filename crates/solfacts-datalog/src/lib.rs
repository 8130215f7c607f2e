//! Soufflé datalog codec for solfacts syntax trees.
//!
//! This crate provides functionality to:
//! - Derive a relational schema from a node-kind grammar
//! - Encode trees into typed fact sets and write them as Soufflé input files
//! - Assemble and compile rule programs against the derived schema
//! - Run compiled programs and read back their output relations
//! - Lift output tuples to tree nodes and render them through message templates

mod analysis;
mod compiler;
pub mod config;
pub mod derived;
mod encoder;
mod error;
mod executor;
mod factset;
mod format;
mod lift;
mod program;
pub mod schema;
pub mod types;
mod value;

pub use analysis::Analysis;
pub use compiler::RuleCompiler;
pub use config::{CompilerConfig, EngineConfig};
pub use derived::{CompilerVersion, Enrichment, NoEnrichment, SolidityEnrichment};
pub use encoder::{FactEncoder, sanitize};
pub use error::DatalogError;
pub use executor::SouffleExecutor;
pub use factset::{FactSet, Tuple};
pub use format::TemplateFormatter;
pub use lift::{Lifted, LiftedFact, ResultLifter};
pub use program::ProgramInterface;
pub use schema::{RelationSchema, Schema, SkipSet};
pub use types::{ColumnType, TypeRegistry};
pub use value::RawValue;
