//! Atom-usage analysis: which atoms each clause, component and program
//! declares and which it uses.
//!
//! Results are tables indexed by [`ClauseId`] and [`ComponentId`], computed
//! bottom-up once per program. Element-level usage is cheap to recompute
//! and is exposed through the free functions [`element_atoms`],
//! [`atom_atoms`] and [`expr_atoms`].

use crate::ast::*;
use crate::error::{CompileError, ErrorId};
use indexmap::IndexMap;

/// Atom name to a representative atom carrying that name.
pub type AtomMap = IndexMap<String, Atom>;

/// A node whose declared/used atoms can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Program,
    Component(ComponentId),
    Clause(ClauseId),
}

#[derive(Debug, Clone)]
pub struct AtomUsage {
    clause_declared: Vec<AtomMap>,
    clause_used: Vec<AtomMap>,
    component_declared: Vec<AtomMap>,
    component_used: Vec<AtomMap>,
    program_declared: AtomMap,
    program_used: AtomMap,
}

impl AtomUsage {
    /// Analyze every clause and component of `program`.
    ///
    /// Fails when a command block's imports and declarations disagree.
    pub fn analyze(program: &Program) -> Result<AtomUsage, CompileError> {
        let mut clause_declared = Vec::with_capacity(program.clause_count());
        let mut clause_used = Vec::with_capacity(program.clause_count());
        for (_, clause) in program.clauses() {
            let (declared, used) = clause_atoms(clause);
            clause_declared.push(declared);
            clause_used.push(used);
        }

        let mut usage = AtomUsage {
            clause_declared,
            clause_used,
            component_declared: Vec::with_capacity(program.component_count()),
            component_used: Vec::with_capacity(program.component_count()),
            program_declared: AtomMap::new(),
            program_used: AtomMap::new(),
        };

        for (_, component) in program.all_components() {
            let (declared, used) = match component.command() {
                Some(block) => usage.command_atoms(component, block)?,
                None => usage.component_atoms(component),
            };
            extend(&mut usage.program_declared, &declared);
            extend(&mut usage.program_used, &used);
            usage.component_declared.push(declared);
            usage.component_used.push(used);
        }
        Ok(usage)
    }

    pub fn declared(&self, node: Node) -> &AtomMap {
        match node {
            Node::Program => &self.program_declared,
            Node::Component(id) => &self.component_declared[id.index()],
            Node::Clause(id) => &self.clause_declared[id.index()],
        }
    }

    pub fn used(&self, node: Node) -> &AtomMap {
        match node {
            Node::Program => &self.program_used,
            Node::Component(id) => &self.component_used[id.index()],
            Node::Clause(id) => &self.clause_used[id.index()],
        }
    }

    fn component_atoms(&self, component: &Component) -> (AtomMap, AtomMap) {
        let mut declared = AtomMap::new();
        let mut used = AtomMap::new();
        // Rules first: an explicit declaration of an atom a rule head
        // introduces replaces the rule's representative.
        for id in &component.rules {
            extend(&mut declared, &self.clause_declared[id.index()]);
        }
        for id in &component.declarations {
            extend(&mut declared, &self.clause_declared[id.index()]);
        }
        for id in component.clauses() {
            extend(&mut used, &self.clause_used[id.index()]);
        }
        (declared, used)
    }

    fn command_atoms(
        &self,
        component: &Component,
        block: &CommandBlock,
    ) -> Result<(AtomMap, AtomMap), CompileError> {
        let mut declared = AtomMap::new();
        for id in &component.declarations {
            extend(&mut declared, &self.clause_declared[id.index()]);
        }
        for import in &block.imports {
            if !declared.contains_key(import) {
                return Err(CompileError::new(ErrorId::CmdNoDecl, &[import])
                    .at(component.loc.as_ref()));
            }
        }
        for name in declared.keys() {
            if !block.imports.contains(name) {
                return Err(CompileError::new(ErrorId::CmdNoImport, &[name])
                    .at(component.loc.as_ref()));
            }
        }

        // Exports are what the external tool reads; they count as uses.
        // Frame rules feeding the block also read their sources.
        let mut used: AtomMap = block
            .exports
            .iter()
            .map(|name| (name.clone(), Atom::stub(name.clone())))
            .collect();
        for id in &component.rules {
            extend(&mut used, &self.clause_used[id.index()]);
            extend(&mut declared, &self.clause_declared[id.index()]);
        }
        Ok((declared, used))
    }
}

fn extend(into: &mut AtomMap, from: &AtomMap) {
    for (name, atom) in from {
        into.insert(name.clone(), atom.clone());
    }
}

/// Declared and used atoms of a single clause.
pub fn clause_atoms(clause: &Clause) -> (AtomMap, AtomMap) {
    let mut declared = AtomMap::new();
    let mut used = AtomMap::new();
    match clause {
        Clause::Declaration(d) => {
            declared.insert(d.atom.name().to_string(), d.atom.clone());
            for ty in &d.types {
                atom_atoms(ty, &mut used);
            }
        }
        Clause::RefModeDeclaration(d) => {
            declared.insert(d.refmode.name.clone(), Atom::RefMode(d.refmode.clone()));
            declared.insert(d.entity.name.clone(), Atom::Entity(d.entity.clone()));
        }
        Clause::Constraint(c) => {
            element_atoms(&c.head, &mut used);
            element_atoms(&c.body, &mut used);
        }
        Clause::Rule(r) => {
            for atom in &r.head {
                atom_atoms(atom, &mut declared);
            }
            if let Some(body) = &r.body {
                element_atoms(body, &mut used);
            }
        }
    }
    (declared, used)
}

/// Atoms used by an element tree.
pub fn element_atoms(element: &Element, out: &mut AtomMap) {
    match element {
        Element::Logical { elements, .. } => {
            for e in elements {
                element_atoms(e, out);
            }
        }
        Element::Negation { element } | Element::Group { element } => element_atoms(element, out),
        Element::Comparison { left, right, .. } => {
            expr_atoms(left, out);
            expr_atoms(right, out);
        }
        // The aggregate function is not a predicate.
        Element::Aggregation { body, .. } => element_atoms(body, out),
        Element::Atom { atom } => atom_atoms(atom, out),
    }
}

/// Atoms used by an atom: itself plus whatever its arguments use.
/// Primitives use nothing; directives use only their back-reference.
pub fn atom_atoms(atom: &Atom, out: &mut AtomMap) {
    match atom {
        Atom::Predicate(p) | Atom::Entity(p) => {
            out.insert(p.name.clone(), atom.clone());
            for arg in &p.args {
                expr_atoms(arg, out);
            }
        }
        Atom::Functional(f) => {
            out.insert(f.name.clone(), atom.clone());
            functional_exprs(f, out);
        }
        Atom::RefMode(r) => {
            out.insert(r.name.clone(), atom.clone());
            expr_atoms(&r.entity, out);
            expr_atoms(&r.value, out);
        }
        Atom::Directive(d) => {
            if let (true, Some(name)) = (d.is_predicate(), &d.backtick) {
                out.insert(name.clone(), Atom::stub(name.clone()));
            }
        }
        Atom::Primitive(_) | Atom::Stub(_) => {}
    }
}

fn functional_exprs(f: &Functional, out: &mut AtomMap) {
    for key in &f.keys {
        expr_atoms(key, out);
    }
    if let Some(value) = &f.value {
        expr_atoms(value, out);
    }
}

pub fn expr_atoms(expr: &Expr, out: &mut AtomMap) {
    match expr {
        Expr::Variable { .. } | Expr::Constant { .. } => {}
        Expr::Binary { left, right, .. } => {
            expr_atoms(left, out);
            expr_atoms(right, out);
        }
        Expr::Functional { atom } => {
            out.insert(atom.name.clone(), Atom::Functional(atom.clone()));
            functional_exprs(atom, out);
        }
        Expr::Group { expr } => expr_atoms(expr, out),
    }
}
