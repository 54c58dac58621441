//! Pass 3: Declaration reachability.
//!
//! Every atom an instance uses must resolve to a declaration somewhere in
//! the instantiated program, either directly or by following propagation
//! edges back to the instances that feed it. Global-scope uses must be
//! declared outright or written by a propagation to global scope.

use crate::ast::*;
use crate::atoms::{AtomUsage, Node};
use crate::context::CompileContext;
use crate::error::{CompileError, ErrorId};
use crate::pass2_instantiate::{global_name, PAST_SUFFIX};
use indexmap::{IndexMap, IndexSet};

/// Destination instance -> base name -> instance-level source names.
type Sources = IndexMap<String, IndexMap<String, IndexSet<String>>>;

pub fn check_declarations(
    program: &Program,
    usage: &AtomUsage,
    ctx: &mut CompileContext,
) -> Result<(), CompileError> {
    let declared = usage.declared(Node::Program);
    let sources = propagation_sources(program);

    let mut checked = 0usize;
    for (id, cid) in program.components() {
        let component = program.component(cid);
        for name in usage.used(Node::Component(cid)).keys() {
            checked += 1;
            if declared.contains_key(name) {
                continue;
            }
            let reachable = unpropagate(id, name, &sources)
                .iter()
                .any(|candidate| declared.contains_key(candidate));
            if !reachable {
                ctx.report(ErrorId::NoDecl, &[name], component.loc.as_ref())?;
            }
        }
    }

    let fed: IndexSet<String> = program
        .propagations()
        .iter()
        .filter(|prop| prop.to.is_none())
        .flat_map(|prop| prop.atoms.iter().map(move |atom| global_name(&prop.from, atom)))
        .collect();
    let global = program.global();
    for name in usage.used(Node::Component(program.global_id())).keys() {
        checked += 1;
        if declared.contains_key(name) || fed.contains(name) {
            continue;
        }
        ctx.report(ErrorId::NoDecl, &[name], global.loc.as_ref())?;
    }
    tracing::debug!(atoms = checked, "checked declarations");
    Ok(())
}

fn propagation_sources(program: &Program) -> Sources {
    let mut sources = Sources::new();
    for prop in program.propagations() {
        let Some(to) = &prop.to else {
            continue;
        };
        let table = sources.entry(to.clone()).or_default();
        for atom in &prop.atoms {
            table
                .entry(global_name(&prop.from, atom))
                .or_default()
                .insert(atom.clone());
        }
    }
    sources
}

/// Names that may stand behind `name` as used inside instance `id`: the
/// instance's own current copy of a `:past` name, plus every source name
/// propagated into `id` under the same base name.
fn unpropagate(id: &str, name: &str, sources: &Sources) -> Vec<String> {
    let Some(base) = name
        .strip_prefix(id)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|rest| rest.strip_suffix(PAST_SUFFIX))
    else {
        return Vec::new();
    };
    let mut candidates = vec![format!("{}:{}", id, base)];
    if let Some(from) = sources.get(id).and_then(|table| table.get(base)) {
        candidates.extend(from.iter().cloned());
    }
    candidates
}
