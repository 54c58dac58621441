//! Pass 2: Instantiation -- stamp out one namespaced copy of each template
//! per instance and turn propagations into frame rules.
//!
//! Naming inside instance `id`:
//!
//! - names declared in global scope are left alone
//! - `p@past` becomes `id:p:past@past`; in a rule head (or on an entity) it
//!   instead names the current `p` of the instance propagating it in
//! - names the template declares become `id:p`
//! - names propagated in from another instance become `id:p:past@past`
//! - anything else is external and left alone
//!
//! A propagation of `p` from `x` to `y` adds `y:p:past@past(..) <- x:p(..)`
//! to `y`; to global scope it adds `p(..) <- x:p(..)` to the global
//! component.

use crate::ast::*;
use crate::atoms::{AtomMap, AtomUsage, Node};
use crate::context::CompileContext;
use crate::error::{CompileError, ErrorId};
use indexmap::{IndexMap, IndexSet};

pub const PAST_SUFFIX: &str = ":past";

/// Atom name -> ids of the instances propagating it in.
type Incoming = IndexMap<String, IndexSet<String>>;

/// The global-scope name of atom `name` propagated out of instance `from`.
pub fn global_name(from: &str, name: &str) -> String {
    let local = name
        .strip_prefix(from)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(name);
    local.strip_suffix(PAST_SUFFIX).unwrap_or(local).to_string()
}

/// `var0`, `var1`, ... for frame-rule arguments.
fn positional_vars(arity: usize) -> Vec<Expr> {
    (0..arity).map(|i| Expr::var(format!("var{}", i))).collect()
}

pub fn instantiate(program: &Program, ctx: &mut CompileContext) -> Result<Program, CompileError> {
    let usage = AtomUsage::analyze(program)?;
    let global_declared = usage.declared(Node::Component(program.global_id()));
    let global_used = usage.used(Node::Component(program.global_id()));

    let mut out = Program::empty();
    let global = copy_component(program, program.global(), &mut out);
    *out.component_mut(out.global) = global;

    // ── Template-level propagation table ─────────────────────────────
    let mut incoming: IndexMap<String, Incoming> = IndexMap::new();
    let mut sources: Vec<(ComponentId, Vec<String>)> = Vec::new();
    for prop in program.propagations() {
        let template = template_of(program, &prop.from, prop)?;
        if let Some(to) = &prop.to {
            template_of(program, to, prop)?;
        }
        let names: Vec<String> = if prop.is_wildcard() {
            usage
                .declared(Node::Component(template))
                .iter()
                .filter(|(_, atom)| !matches!(atom, Atom::Directive(_)))
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            prop.atoms.clone()
        };
        if let Some(to) = &prop.to {
            let table = incoming.entry(to.clone()).or_default();
            for name in &names {
                table
                    .entry(name.clone())
                    .or_default()
                    .insert(prop.from.clone());
            }
        }
        sources.push((template, names));
    }

    // ── Propagations in instance names ───────────────────────────────
    let no_incoming = Incoming::new();
    let mut propagations = Vec::with_capacity(sources.len());
    for (prop, (template, names)) in program.propagations().iter().zip(sources) {
        let renamer = Renamer {
            strip: None,
            scope: Some(&prop.from),
            declared: usage.declared(Node::Component(template)),
            global: global_declared,
            incoming: incoming.get(&prop.from).unwrap_or(&no_incoming),
        };
        let atoms = names
            .iter()
            .map(|name| renamer.name(name))
            .collect::<Result<Vec<_>, _>>()?;
        propagations.push(Propagation {
            from: prop.from.clone(),
            atoms,
            to: prop.to.clone(),
            loc: prop.loc.clone(),
        });
    }

    // ── Instances ────────────────────────────────────────────────────
    for (id, inst) in program.instantiations() {
        let template_id = program.component_id(&inst.template).ok_or_else(|| {
            CompileError::new(ErrorId::UnknownComp, &[&inst.template]).at(inst.loc.as_ref())
        })?;
        let renamer = Renamer {
            strip: None,
            scope: Some(id),
            declared: usage.declared(Node::Component(template_id)),
            global: global_declared,
            incoming: incoming.get(id).unwrap_or(&no_incoming),
        };
        let component = renamer.component(program, program.component(template_id), id, &mut out)?;
        let cid = out.push_component(component);
        out.components.insert(id.clone(), cid);
    }
    tracing::debug!(instances = out.components.len(), "instantiated components");

    // ── Frame rules ──────────────────────────────────────────────────
    let instance_usage = AtomUsage::analyze(&out)?;
    let mut declared: IndexMap<String, AtomMap> = out
        .components()
        .map(|(name, cid)| {
            (
                name.to_string(),
                instance_usage.declared(Node::Component(cid)).clone(),
            )
        })
        .collect();

    // A propagation re-exporting what its source received waits until the
    // upstream frame rule has been synthesized.
    let nothing = AtomMap::new();
    let mut pending: Vec<&Propagation> = propagations.iter().collect();
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for prop in pending {
            let source = declared.get(&prop.from).unwrap_or(&nothing);
            if prop.atoms.iter().any(|name| !source.contains_key(name)) {
                deferred.push(prop);
                continue;
            }
            let rules = frame_rules(prop, source, global_declared, global_used, ctx)?;
            let target = match &prop.to {
                Some(to) => out.component_id(to),
                None => Some(out.global_id()),
            };
            for rule in rules {
                if let Some(map) = prop.to.as_ref().and_then(|to| declared.get_mut(to)) {
                    for atom in &rule.head {
                        map.insert(atom.name().to_string(), atom.clone());
                    }
                }
                let rid = out.push_clause(Clause::Rule(rule));
                if let Some(target) = target {
                    out.component_mut(target).rules.insert(rid);
                }
            }
        }
        if deferred.len() == before {
            let prop = deferred[0];
            let source = declared.get(&prop.from);
            let missing = prop
                .atoms
                .iter()
                .find(|name| !source.is_some_and(|s| s.contains_key(*name)))
                .cloned()
                .unwrap_or_default();
            return Err(
                CompileError::new(ErrorId::UnknownPred, &[missing.as_str(), prop.from.as_str()])
                    .at(prop.loc.as_ref()),
            );
        }
        pending = deferred;
    }

    out.propagations = propagations;
    Ok(out)
}

fn template_of(
    program: &Program,
    instance: &str,
    prop: &Propagation,
) -> Result<ComponentId, CompileError> {
    program
        .instantiations()
        .get(instance)
        .and_then(|inst| program.component_id(&inst.template))
        .ok_or_else(|| CompileError::new(ErrorId::UnknownComp, &[instance]).at(prop.loc.as_ref()))
}

fn copy_component(program: &Program, component: &Component, out: &mut Program) -> Component {
    let mut copy = component.clone();
    let mut copy_set = |ids: &IndexSet<ClauseId>| -> IndexSet<ClauseId> {
        ids.iter()
            .map(|id| out.push_clause(program.clause(*id).clone()))
            .collect()
    };
    copy.declarations = copy_set(&component.declarations);
    copy.constraints = copy_set(&component.constraints);
    copy.rules = copy_set(&component.rules);
    copy
}

/// One rule per propagated atom. Directives are pragmas and are never
/// copied. A stub is a name known only from its `lang:entity` mark and is
/// copied as a unary entity.
fn frame_rules(
    prop: &Propagation,
    source: &AtomMap,
    global_declared: &AtomMap,
    global_used: &AtomMap,
    ctx: &mut CompileContext,
) -> Result<Vec<Rule>, CompileError> {
    let unused = AtomMap::new();
    let no_incoming = Incoming::new();
    let renamer = Renamer {
        strip: Some(&prop.from),
        scope: prop.to.as_deref(),
        declared: &unused,
        global: global_declared,
        incoming: &no_incoming,
    };

    let mut rules = Vec::new();
    for name in &prop.atoms {
        let Some(atom) = source.get(name) else {
            continue;
        };
        let atom = match atom {
            Atom::Directive(_) => continue,
            Atom::Stub(stub) => Atom::entity(stub.name.clone(), "var0"),
            other => other.clone(),
        };
        let Some(arity) = atom.arity() else {
            continue;
        };
        let vars = positional_vars(arity);

        let head = match &prop.to {
            None => {
                let target = global_name(&prop.from, atom.name());
                if global_declared.contains_key(&target) {
                    return Err(CompileError::new(ErrorId::DepGlobal, &[&target])
                        .at(prop.loc.as_ref()));
                }
                if global_used.contains_key(&target) {
                    ctx.warn(ErrorId::DepGlobal, &[&target], prop.loc.as_ref());
                }
                atom.instantiate(None, &vars).with_name(target, None)
            }
            Some(_) => {
                let (target, stage) = renamer.rename(atom.name(), Some(&Stage::Past), false, false)?;
                atom.instantiate(stage.clone(), &vars).with_name(target, stage)
            }
        };
        let body = atom.instantiate(None, &vars);
        rules.push(Rule {
            head: vec![head],
            body: Some(body.into()),
            loc: prop.loc.clone(),
        });
    }
    Ok(rules)
}

// ──────────────────────────────────────────────
// Renaming
// ──────────────────────────────────────────────

struct Renamer<'a> {
    /// Instance prefix to remove before renaming (frame-rule heads).
    strip: Option<&'a str>,
    /// Instance being produced; `None` for global scope.
    scope: Option<&'a str>,
    /// Names declared by the template.
    declared: &'a AtomMap,
    /// Names declared in global scope.
    global: &'a AtomMap,
    incoming: &'a Incoming,
}

impl Renamer<'_> {
    fn rename(
        &self,
        name: &str,
        stage: Option<&Stage>,
        in_head: bool,
        entity: bool,
    ) -> Result<(String, Option<Stage>), CompileError> {
        let name = match self.strip {
            Some(from) => {
                let local = name
                    .strip_prefix(from)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .unwrap_or(name);
                local.strip_suffix(PAST_SUFFIX).unwrap_or(local)
            }
            None => name,
        };
        let Some(scope) = self.scope else {
            return Ok((name.to_string(), stage.cloned()));
        };
        if self.global.contains_key(name) {
            return Ok((name.to_string(), stage.cloned()));
        }

        let sources = self.incoming.get(name);
        if stage == Some(&Stage::Past) {
            if !(in_head || entity) {
                return Ok((format!("{}:{}{}", scope, name, PAST_SUFFIX), Some(Stage::Past)));
            }
            return match sources {
                None => Ok((name.to_string(), None)),
                Some(from) if from.len() == 1 => Ok((format!("{}:{}", from[0], name), None)),
                Some(from) => {
                    let list = from.iter().cloned().collect::<Vec<_>>().join(", ");
                    Err(CompileError::new(ErrorId::AmbiguousPast, &[name, list.as_str()]))
                }
            };
        }
        if self.declared.contains_key(name) {
            return Ok((format!("{}:{}", scope, name), stage.cloned()));
        }
        if sources.is_some() {
            return Ok((format!("{}:{}{}", scope, name, PAST_SUFFIX), Some(Stage::Past)));
        }
        Ok((name.to_string(), stage.cloned()))
    }

    fn name(&self, name: &str) -> Result<String, CompileError> {
        Ok(self.rename(name, None, false, false)?.0)
    }

    fn component(
        &self,
        program: &Program,
        template: &Component,
        id: &str,
        out: &mut Program,
    ) -> Result<Component, CompileError> {
        let mut component = Component::new(id);
        component.loc = template.loc.clone();
        for cid in &template.declarations {
            let clause = self.clause(program.clause(*cid))?;
            component.declarations.insert(out.push_clause(clause));
        }
        for cid in &template.constraints {
            let clause = self.clause(program.clause(*cid))?;
            component.constraints.insert(out.push_clause(clause));
        }
        for cid in &template.rules {
            let clause = self.clause(program.clause(*cid))?;
            component.rules.insert(out.push_clause(clause));
        }
        if let Some(block) = template.command() {
            component.kind = ComponentKind::Command(CommandBlock {
                eval: block.eval.clone(),
                dir: block.dir.clone(),
                imports: block
                    .imports
                    .iter()
                    .map(|n| self.name(n))
                    .collect::<Result<_, _>>()?,
                exports: block
                    .exports
                    .iter()
                    .map(|n| self.name(n))
                    .collect::<Result<_, _>>()?,
            });
        }
        Ok(component)
    }

    fn clause(&self, clause: &Clause) -> Result<Clause, CompileError> {
        let clause = match clause {
            Clause::Declaration(d) => Clause::Declaration(Declaration {
                atom: self.atom(&d.atom, false)?,
                types: d
                    .types
                    .iter()
                    .map(|t| self.atom(t, false))
                    .collect::<Result<_, _>>()?,
                loc: d.loc.clone(),
            }),
            Clause::RefModeDeclaration(d) => Clause::RefModeDeclaration(RefModeDeclaration {
                refmode: self.refmode(&d.refmode, false)?,
                entity: self.predicate(&d.entity, false, true)?,
                primitive: d.primitive.clone(),
                loc: d.loc.clone(),
            }),
            Clause::Constraint(c) => Clause::Constraint(Constraint {
                head: self.element(&c.head)?,
                body: self.element(&c.body)?,
                loc: c.loc.clone(),
            }),
            Clause::Rule(r) => Clause::Rule(Rule {
                head: r
                    .head
                    .iter()
                    .map(|a| self.atom(a, true))
                    .collect::<Result<_, _>>()?,
                body: r.body.as_ref().map(|b| self.element(b)).transpose()?,
                loc: r.loc.clone(),
            }),
        };
        Ok(clause)
    }

    fn element(&self, element: &Element) -> Result<Element, CompileError> {
        let element = match element {
            Element::Logical { op, elements } => Element::Logical {
                op: *op,
                elements: elements
                    .iter()
                    .map(|e| self.element(e))
                    .collect::<Result<_, _>>()?,
            },
            Element::Negation { element } => Element::Negation {
                element: Box::new(self.element(element)?),
            },
            Element::Group { element } => Element::Group {
                element: Box::new(self.element(element)?),
            },
            Element::Comparison { left, op, right } => Element::Comparison {
                left: self.expr(left, false)?,
                op: *op,
                right: self.expr(right, false)?,
            },
            Element::Aggregation {
                var,
                function,
                body,
            } => Element::Aggregation {
                var: var.clone(),
                function: function.clone(),
                body: Box::new(self.element(body)?),
            },
            Element::Atom { atom } => Element::Atom {
                atom: self.atom(atom, false)?,
            },
        };
        Ok(element)
    }

    fn atom(&self, atom: &Atom, in_head: bool) -> Result<Atom, CompileError> {
        let atom = match atom {
            Atom::Predicate(p) => Atom::Predicate(self.predicate(p, in_head, false)?),
            Atom::Entity(p) => Atom::Entity(self.predicate(p, in_head, true)?),
            Atom::RefMode(r) => Atom::RefMode(self.refmode(r, in_head)?),
            Atom::Functional(f) => Atom::Functional(self.functional(f, in_head)?),
            Atom::Primitive(_) => atom.clone(),
            Atom::Directive(d) => Atom::Directive(Directive {
                name: d.name.clone(),
                backtick: d.backtick.as_deref().map(|b| self.name(b)).transpose()?,
                value: d.value.clone(),
            }),
            Atom::Stub(s) => Atom::stub(self.name(&s.name)?),
        };
        Ok(atom)
    }

    fn predicate(&self, p: &Predicate, in_head: bool, entity: bool) -> Result<Predicate, CompileError> {
        let (name, stage) = self.rename(&p.name, p.stage.as_ref(), in_head, entity)?;
        Ok(Predicate {
            name,
            stage,
            args: p
                .args
                .iter()
                .map(|e| self.expr(e, in_head))
                .collect::<Result<_, _>>()?,
        })
    }

    fn refmode(&self, r: &RefMode, in_head: bool) -> Result<RefMode, CompileError> {
        let (name, stage) = self.rename(&r.name, r.stage.as_ref(), in_head, false)?;
        Ok(RefMode {
            name,
            stage,
            entity: self.expr(&r.entity, in_head)?,
            value: self.expr(&r.value, in_head)?,
        })
    }

    fn functional(&self, f: &Functional, in_head: bool) -> Result<Functional, CompileError> {
        let (name, stage) = self.rename(&f.name, f.stage.as_ref(), in_head, false)?;
        Ok(Functional {
            name,
            stage,
            keys: f
                .keys
                .iter()
                .map(|e| self.expr(e, in_head))
                .collect::<Result<_, _>>()?,
            value: f
                .value
                .as_deref()
                .map(|e| self.expr(e, in_head).map(Box::new))
                .transpose()?,
        })
    }

    fn expr(&self, expr: &Expr, in_head: bool) -> Result<Expr, CompileError> {
        let expr = match expr {
            Expr::Variable { .. } | Expr::Constant { .. } => expr.clone(),
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.expr(left, in_head)?),
                op: *op,
                right: Box::new(self.expr(right, in_head)?),
            },
            Expr::Functional { atom } => Expr::Functional {
                atom: self.functional(atom, in_head)?,
            },
            Expr::Group { expr } => Expr::Group {
                expr: Box::new(self.expr(expr, in_head)?),
            },
        };
        Ok(expr)
    }
}
