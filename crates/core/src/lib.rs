#![allow(clippy::result_large_err)]
//! modlogic-core: modular logic program compiler core library.
//!
//! Provides the five-pass pipeline from a component-based logic program
//! (templates, instances, propagations, command blocks) to an ordered list
//! of phases ready for code generation.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`compile()`] -- run the full 5-pass pipeline
//! - [`ProgramBuilder`], [`ComponentBuilder`], [`CommandBuilder`] -- hand a
//!   program over
//! - [`ProgramDocument`] -- the same, from JSON
//! - [`AtomUsage`] -- declared/used atoms per clause, component and program
//! - [`CompileError`], [`Diagnostic`] -- errors and warnings
//!
//! Individual pass entry functions are also re-exported for selective
//! pipeline execution.

pub mod ast;
pub mod atoms;
pub mod builder;
pub mod compile;
pub mod context;
pub mod document;
pub mod error;
pub mod pass1_flatten;
pub mod pass2_instantiate;
pub mod pass3_declarations;
pub mod pass4_graph;
pub mod pass5_schedule;
pub mod source;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Atom, Clause, ClauseId, Component, ComponentId, Element, Program, Propagation};
pub use atoms::{AtomMap, AtomUsage, Node};
pub use builder::{CommandBuilder, ComponentBuilder, ProgramBuilder};
pub use compile::Compilation;
pub use context::{CompileContext, CompileOptions};
pub use document::ProgramDocument;
pub use error::{CompileError, Diagnostic, ErrorId};
pub use pass4_graph::{DependencyGraph, GraphNode};
pub use pass5_schedule::{CommandPhase, FileAtom, LogicPhase, Phase};
pub use source::{LineMarkers, SourceLocation};

// ── Convenience re-exports: pipeline entry points ────────────────────

pub use compile::compile;
pub use pass1_flatten::{flatten, flatten_program};
pub use pass2_instantiate::instantiate;
pub use pass3_declarations::check_declarations;
pub use pass5_schedule::schedule;
