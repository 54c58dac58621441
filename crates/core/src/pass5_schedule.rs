//! Pass 5: Scheduling -- turn dependency layers into the ordered phases
//! the code generator emits.
//!
//! Regular layers accumulate into one logic phase. A layer holding a
//! command instance is a barrier: the accumulated logic is flushed, then
//! each command gets a phase of its own. Global clauses are held back until
//! every global predicate they mention that has a node in the graph has
//! been scheduled.
//!
//! Commands exchange predicates through fact files. A file predicate's
//! columns come from its declaration and must match its arity.

use crate::ast::*;
use crate::atoms::{AtomUsage, Node};
use crate::error::{CompileError, ErrorId};
use crate::pass4_graph::{DependencyGraph, GraphNode};
use crate::source::SourceLocation;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Column type used when a file-backed predicate has no usable declaration.
pub const DEFAULT_COLUMN: &str = "string";

/// A predicate exchanged with an external tool through a fact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAtom {
    pub name: String,
    /// Column types in argument order.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogicPhase {
    pub nodes: Vec<GraphNode>,
    pub clauses: Vec<ClauseId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPhase {
    pub instance: String,
    pub command: String,
    /// Working directory of the external tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    pub exports: Vec<FileAtom>,
    pub imports: Vec<FileAtom>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Phase {
    Logic(LogicPhase),
    Command(CommandPhase),
}

pub fn schedule(
    program: &Program,
    usage: &AtomUsage,
    graph: &DependencyGraph,
    layers: &[Vec<GraphNode>],
) -> Result<Vec<Phase>, CompileError> {
    let mut scheduler = Scheduler {
        program,
        usage,
        graph,
        columns: declared_columns(program),
        held: program.global().clauses().collect(),
        handled: IndexSet::new(),
        pending: LogicPhase::default(),
        phases: Vec::new(),
    };

    for layer in layers {
        let (commands, regular): (Vec<&GraphNode>, Vec<&GraphNode>) =
            layer.iter().partition(|node| node.is_command());
        for node in regular {
            scheduler.add(node);
        }
        if commands.is_empty() {
            continue;
        }
        for node in &commands {
            scheduler.add_command_clauses(node);
        }
        scheduler.flush(false);
        for node in commands {
            scheduler.command(node)?;
        }
    }
    scheduler.flush(true);

    tracing::debug!(phases = scheduler.phases.len(), "scheduled phases");
    Ok(scheduler.phases)
}

struct Scheduler<'a> {
    program: &'a Program,
    usage: &'a AtomUsage,
    graph: &'a DependencyGraph,
    /// Declared predicate name -> column types.
    columns: IndexMap<String, Vec<String>>,
    /// Global clauses not yet emitted, in declaration/constraint/rule order.
    held: Vec<ClauseId>,
    handled: IndexSet<String>,
    pending: LogicPhase,
    phases: Vec<Phase>,
}

impl Scheduler<'_> {
    fn add(&mut self, node: &GraphNode) {
        match node {
            GraphNode::Predicate(name) => {
                self.handled.insert(name.clone());
            }
            GraphNode::Component(id) | GraphNode::Command(id) => {
                if let Some(component) = self.program.component_named(id) {
                    self.pending.clauses.extend(component.clauses());
                }
            }
        }
        self.pending.nodes.push(node.clone());
    }

    /// A command's declarations and the frame rules feeding it are loaded
    /// before its export runs.
    fn add_command_clauses(&mut self, node: &GraphNode) {
        if let Some(component) = self.program.component_named(node.name()) {
            self.pending.clauses.extend(component.clauses());
        }
    }

    fn ready(&self, id: ClauseId) -> bool {
        let waits_on = |name: &String| self.graph.handled().contains(name);
        self.usage
            .declared(Node::Clause(id))
            .keys()
            .chain(self.usage.used(Node::Clause(id)).keys())
            .filter(|name| waits_on(name))
            .all(|name| self.handled.contains(name))
    }

    fn flush(&mut self, last: bool) {
        let (released, held): (Vec<ClauseId>, Vec<ClauseId>) = std::mem::take(&mut self.held)
            .into_iter()
            .partition(|id| last || self.ready(*id));
        self.held = held;

        let mut phase = std::mem::take(&mut self.pending);
        if !released.is_empty() {
            let own = std::mem::replace(&mut phase.clauses, released);
            phase.clauses.extend(own);
        }
        if phase.clauses.is_empty() && phase.nodes.is_empty() {
            return;
        }
        tracing::debug!(
            nodes = phase.nodes.len(),
            clauses = phase.clauses.len(),
            "flushed logic phase"
        );
        self.phases.push(Phase::Logic(phase));
    }

    fn command(&mut self, node: &GraphNode) -> Result<(), CompileError> {
        let id = node.name();
        let Some(component) = self.program.component_named(id) else {
            return Ok(());
        };
        let Some(block) = component.command() else {
            return Ok(());
        };
        let loc = component.loc.as_ref();

        let mut exports: Vec<FileAtom> = Vec::new();
        for rid in &component.rules {
            let Clause::Rule(rule) = self.program.clause(*rid) else {
                continue;
            };
            let (Some(head), Some(Element::Atom { atom: source })) =
                (rule.head.first(), rule.body.as_ref())
            else {
                continue;
            };
            let arity = head
                .arity()
                .ok_or_else(|| CompileError::new(ErrorId::NoArity, &[head.name()]).at(loc))?;
            exports.push(FileAtom {
                name: head.name().to_string(),
                columns: self.columns_for(source.name(), arity, loc)?,
            });
        }
        for name in &block.exports {
            if exports.iter().any(|e| &e.name == name) {
                continue;
            }
            if !self.graph.global_atoms().contains(name) {
                return Err(CompileError::new(ErrorId::CmdExport, &[name.as_str(), id]).at(loc));
            }
            let arity = self.arity_of(name, loc)?;
            exports.push(FileAtom {
                name: name.clone(),
                columns: self.columns_for(name, arity, loc)?,
            });
        }

        let mut imports = Vec::with_capacity(block.imports.len());
        for name in &block.imports {
            let arity = self.arity_of(name, loc)?;
            imports.push(FileAtom {
                name: name.clone(),
                columns: self.columns_for(name, arity, loc)?,
            });
        }

        self.phases.push(Phase::Command(CommandPhase {
            instance: id.to_string(),
            command: block.eval.clone(),
            dir: block.dir.clone(),
            exports,
            imports,
        }));
        Ok(())
    }

    fn arity_of(&self, name: &str, loc: Option<&SourceLocation>) -> Result<usize, CompileError> {
        self.usage
            .declared(Node::Program)
            .get(name)
            .and_then(Atom::arity)
            .or_else(|| self.columns.get(name).map(Vec::len))
            .ok_or_else(|| CompileError::new(ErrorId::NoArity, &[name]).at(loc))
    }

    /// Declared column types of `name`, or `string` for every position when
    /// it has no typed declaration.
    fn columns_for(
        &self,
        name: &str,
        arity: usize,
        loc: Option<&SourceLocation>,
    ) -> Result<Vec<String>, CompileError> {
        match self.columns.get(name) {
            Some(columns) if columns.len() == arity => Ok(columns.clone()),
            Some(columns) => Err(CompileError::new(
                ErrorId::ColumnArity,
                &[name.to_string(), columns.len().to_string(), arity.to_string()],
            )
            .at(loc)),
            None => Ok(vec![DEFAULT_COLUMN.to_string(); arity]),
        }
    }
}

/// Column types of every typed declaration in the program. Declarations
/// with no type atoms give no columns.
fn declared_columns(program: &Program) -> IndexMap<String, Vec<String>> {
    let mut columns = IndexMap::new();
    for (_, clause) in program.clauses() {
        match clause {
            Clause::Declaration(d) if !d.types.is_empty() => {
                let types = d.types.iter().map(column_type).collect();
                columns.entry(d.atom.name().to_string()).or_insert(types);
            }
            Clause::RefModeDeclaration(d) => {
                let types = vec![d.entity.name.clone(), d.primitive.type_name()];
                columns.entry(d.refmode.name.clone()).or_insert(types);
            }
            _ => {}
        }
    }
    columns
}

fn column_type(atom: &Atom) -> String {
    match atom {
        Atom::Primitive(p) => p.type_name(),
        other => other.name().to_string(),
    }
}
