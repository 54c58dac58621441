//! Five-pass compiler: modular program -> ordered phases.
//!
//! This is a thin orchestrator that calls each pass module in order.

use crate::ast::Program;
use crate::atoms::AtomUsage;
use crate::context::{CompileContext, CompileOptions};
use crate::error::{CompileError, Diagnostic};
use crate::pass1_flatten;
use crate::pass2_instantiate;
use crate::pass3_declarations;
use crate::pass4_graph::{DependencyGraph, GraphNode};
use crate::pass5_schedule::{self, Phase};

/// Everything the code generator needs, plus what was learned on the way.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The instantiated program the phases refer into.
    pub program: Program,
    pub layers: Vec<Vec<GraphNode>>,
    pub phases: Vec<Phase>,
    pub warnings: Vec<Diagnostic>,
}

/// Compile `program`, or return the first error encountered.
pub fn compile(program: &Program, options: CompileOptions) -> Result<Compilation, CompileError> {
    let mut ctx = CompileContext::new(options);

    // Pass 1: inheritance and logical normalization
    let flat = pass1_flatten::flatten_program(program)?;

    // Pass 2: instances and frame rules
    let program = pass2_instantiate::instantiate(&flat, &mut ctx)?;
    let usage = AtomUsage::analyze(&program)?;

    // Pass 3: every use reaches a declaration
    pass3_declarations::check_declarations(&program, &usage, &mut ctx)?;

    // Pass 4: dependency layers
    let graph = DependencyGraph::build(&program, &usage);
    let layers = graph.layers()?;

    // Pass 5: phases
    let phases = pass5_schedule::schedule(&program, &usage, &graph, &layers)?;

    Ok(Compilation {
        program,
        layers,
        phases,
        warnings: ctx.into_warnings(),
    })
}
