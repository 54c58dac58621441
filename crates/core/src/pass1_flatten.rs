//! Pass 1: Flattening -- resolve inheritance chains and splice nested
//! logical groups into a single level.
//!
//! Produces a new program in which no component has a parent, every
//! AND-inside-AND (and OR-inside-OR) has been spliced, and predicate
//! declarations of names marked by ``lang:entity(`X)`` are re-typed as
//! entities.

use crate::ast::*;
use crate::atoms::{atom_atoms, AtomMap};
use crate::error::{CompileError, ErrorId};
use indexmap::IndexSet;

/// Flatten `component`, unioning in the clauses of every ancestor found
/// in `templates`. The result has no parent link.
pub fn flatten(component: &Component, templates: &Program) -> Result<Component, CompileError> {
    let mut flat = component.clone();
    flat.parent = None;

    let mut visited: IndexSet<&str> = IndexSet::new();
    visited.insert(component.name.as_str());
    let mut next = component.parent.as_deref();
    while let Some(parent_name) = next {
        if !visited.insert(parent_name) {
            return Err(CompileError::new(ErrorId::CyclicInheritance, &[&component.name])
                .at(component.loc.as_ref()));
        }
        let parent = templates.component_named(parent_name).ok_or_else(|| {
            CompileError::new(ErrorId::UnknownComp, &[parent_name]).at(component.loc.as_ref())
        })?;
        flat.declarations.extend(parent.declarations.iter().copied());
        flat.constraints.extend(parent.constraints.iter().copied());
        flat.rules.extend(parent.rules.iter().copied());
        next = parent.parent.as_deref();
    }
    Ok(flat)
}

/// Flatten every component of `program` and normalize all clauses.
pub fn flatten_program(program: &Program) -> Result<Program, CompileError> {
    tracing::debug!(components = program.components.len(), "flattening program");

    let mut out = Program::empty();
    // Clause ids are preserved: clause i of the input becomes clause i of
    // the output.
    for (_, clause) in program.clauses() {
        out.push_clause(normalize_clause(clause));
    }

    let global = patch_entities(program.global().clone(), &mut out);
    *out.component_mut(out.global) = global;

    for (name, id) in program.components() {
        let flat = flatten(program.component(id), program)?;
        let flat = patch_entities(flat, &mut out);
        let new_id = out.push_component(flat);
        out.components.insert(name.to_string(), new_id);
    }
    out.instantiations = program.instantiations.clone();
    out.propagations = program.propagations.clone();
    Ok(out)
}

// ──────────────────────────────────────────────
// Logical normalization
// ──────────────────────────────────────────────

fn normalize_clause(clause: &Clause) -> Clause {
    match clause {
        Clause::Constraint(c) => Clause::Constraint(Constraint {
            head: normalize(&c.head),
            body: normalize(&c.body),
            loc: c.loc.clone(),
        }),
        Clause::Rule(r) => Clause::Rule(Rule {
            head: r.head.clone(),
            body: r.body.as_ref().map(normalize),
            loc: r.loc.clone(),
        }),
        Clause::Declaration(_) | Clause::RefModeDeclaration(_) => clause.clone(),
    }
}

/// Splice same-operator logical children into their parent.
pub fn normalize(element: &Element) -> Element {
    match element {
        Element::Logical { op, elements } => {
            let mut spliced = Vec::with_capacity(elements.len());
            for child in elements {
                match normalize(child) {
                    Element::Logical {
                        op: child_op,
                        elements: grandchildren,
                    } if child_op == *op => spliced.extend(grandchildren),
                    other => spliced.push(other),
                }
            }
            Element::Logical {
                op: *op,
                elements: spliced,
            }
        }
        Element::Negation { element } => Element::Negation {
            element: Box::new(normalize(element)),
        },
        Element::Group { element } => Element::Group {
            element: Box::new(normalize(element)),
        },
        Element::Aggregation {
            var,
            function,
            body,
        } => Element::Aggregation {
            var: var.clone(),
            function: function.clone(),
            body: Box::new(normalize(body)),
        },
        Element::Comparison { .. } | Element::Atom { .. } => element.clone(),
    }
}

// ──────────────────────────────────────────────
// Entity marking
// ──────────────────────────────────────────────

/// Names marked as entities by ``lang:entity(`X)`` rule heads.
fn entity_marks(component: &Component, program: &Program) -> IndexSet<String> {
    let mut marks = IndexSet::new();
    for id in &component.rules {
        let Clause::Rule(rule) = program.clause(*id) else {
            continue;
        };
        for atom in &rule.head {
            if let Atom::Directive(d) = atom {
                if d.name == Directive::ENTITY {
                    let mut refs = AtomMap::new();
                    atom_atoms(atom, &mut refs);
                    marks.extend(refs.into_keys());
                }
            }
        }
    }
    marks
}

/// Re-type predicate declarations of entity-marked names. Patched
/// declarations become new clauses so components sharing the original
/// are unaffected.
fn patch_entities(mut component: Component, program: &mut Program) -> Component {
    let marks = entity_marks(&component, program);
    if marks.is_empty() {
        return component;
    }

    let mut declarations = IndexSet::with_capacity(component.declarations.len());
    for id in &component.declarations {
        let patched = match program.clause(*id) {
            Clause::Declaration(Declaration {
                atom: Atom::Predicate(p),
                types,
                loc,
            }) if marks.contains(&p.name) => Some(Clause::Declaration(Declaration {
                atom: Atom::Entity(p.clone()),
                types: types.clone(),
                loc: loc.clone(),
            })),
            _ => None,
        };
        match patched {
            Some(clause) => declarations.insert(program.push_clause(clause)),
            None => declarations.insert(*id),
        };
    }
    component.declarations = declarations;
    component
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{AtomUsage, Node};
    use crate::builder::{ComponentBuilder, ProgramBuilder};

    fn pred(name: &str, vars: &[&str]) -> Atom {
        Atom::predicate(name, vars.iter().map(|v| Expr::var(*v)).collect())
    }

    fn fact(name: &str) -> Rule {
        Rule {
            head: vec![pred(name, &[])],
            body: None,
            loc: None,
        }
    }

    fn decl(name: &str) -> Declaration {
        Declaration::new(pred(name, &["x"]), vec![Atom::primitive("int", "x")], None).unwrap()
    }

    fn component(name: &str, parent: Option<&str>, rule: &str) -> ComponentBuilder {
        let mut c = ComponentBuilder::new(name);
        if let Some(p) = parent {
            c = c.extends(p);
        }
        c.add_rule(fact(rule));
        c
    }

    #[test]
    fn component_without_parent_is_unchanged() {
        let mut b = ProgramBuilder::new();
        let mut c = component("C", None, "r");
        c.add_declaration(decl("p"));
        b.add_component(c);
        let program = b.build().unwrap();
        let original = program.component_named("C").unwrap();
        let flat = flatten(original, &program).unwrap();
        assert_eq!(&flat, original);
    }

    #[test]
    fn inheritance_chain_is_unioned() {
        let mut b = ProgramBuilder::new();
        b.add_component(component("C1", None, "r1"));
        b.add_component(component("C2", Some("C1"), "r2"));
        b.add_component(component("C3", Some("C2"), "r3"));
        let program = b.build().unwrap();

        let flat = flatten_program(&program).unwrap();
        let c3 = flat.component_named("C3").unwrap();
        assert_eq!(c3.parent, None);
        assert_eq!(c3.rules.len(), 3);

        let usage = AtomUsage::analyze(&flat).unwrap();
        let declared = usage.declared(Node::Component(flat.component_id("C3").unwrap()));
        let mut names: Vec<&str> = declared.keys().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, vec!["r1", "r2", "r3"]);
    }

    #[test]
    fn cyclic_inheritance_is_detected() {
        let mut b = ProgramBuilder::new();
        b.add_component(component("A", Some("B"), "a"));
        b.add_component(component("B", Some("A"), "b"));
        let program = b.build().unwrap();
        let err = flatten_program(&program).unwrap_err();
        assert_eq!(err.id, ErrorId::CyclicInheritance);
    }

    #[test]
    fn self_inheritance_is_detected() {
        let mut b = ProgramBuilder::new();
        b.add_component(component("A", Some("A"), "a"));
        let err = flatten_program(&b.build().unwrap()).unwrap_err();
        assert_eq!(err.id, ErrorId::CyclicInheritance);
    }

    #[test]
    fn unknown_parent_is_reported() {
        let mut b = ProgramBuilder::new();
        b.add_component(component("A", Some("Missing"), "a"));
        let err = flatten_program(&b.build().unwrap()).unwrap_err();
        assert_eq!(err.id, ErrorId::UnknownComp);
        assert!(err.message.contains("Missing"));
    }

    #[test]
    fn nested_same_operator_groups_are_spliced() {
        let nested = Element::and(vec![
            pred("a", &[]).into(),
            Element::and(vec![
                pred("b", &[]).into(),
                Element::and(vec![pred("c", &[]).into()]),
            ]),
            Element::or(vec![pred("d", &[]).into(), pred("e", &[]).into()]),
        ]);
        let Element::Logical { op, elements } = normalize(&nested) else {
            panic!("expected logical element")
        };
        assert_eq!(op, LogicalOp::And);
        assert_eq!(elements.len(), 4);
        assert!(matches!(
            &elements[3],
            Element::Logical { op: LogicalOp::Or, elements } if elements.len() == 2
        ));
    }

    #[test]
    fn splicing_reaches_into_negation() {
        let nested = Element::not(Element::or(vec![
            pred("a", &[]).into(),
            Element::or(vec![pred("b", &[]).into(), pred("c", &[]).into()]),
        ]));
        let Element::Negation { element } = normalize(&nested) else {
            panic!("expected negation")
        };
        let Element::Logical { elements, .. } = *element else {
            panic!("expected logical element")
        };
        assert_eq!(elements.len(), 3);
    }

    #[test]
    fn entity_marked_declarations_are_retyped() {
        let mut b = ProgramBuilder::new();
        let mut base = ComponentBuilder::new("Base");
        base.add_declaration(
            Declaration::new(pred("Person", &["x"]), vec![], None).unwrap(),
        );
        b.add_component(base);
        let mut child = ComponentBuilder::new("Child").extends("Base");
        child.add_rule(Rule {
            head: vec![Atom::Directive(Directive {
                name: Directive::ENTITY.into(),
                backtick: Some("Person".into()),
                value: None,
            })],
            body: None,
            loc: None,
        });
        b.add_component(child);
        let program = b.build().unwrap();
        let flat = flatten_program(&program).unwrap();

        let is_entity = |name: &str| {
            let c = flat.component_named(name).unwrap();
            c.declarations.iter().any(|id| {
                matches!(
                    flat.clause(*id),
                    Clause::Declaration(Declaration {
                        atom: Atom::Entity(_),
                        ..
                    })
                )
            })
        };
        assert!(is_entity("Child"));
        // The parent has no mark of its own and keeps its original clause.
        assert!(!is_entity("Base"));
    }
}
