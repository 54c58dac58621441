//! Textual form of clauses, as the evaluator reads them.

use modlogic_core::ast::*;
use modlogic_core::FileAtom;

const STORAGE_MODEL: &str = "lang:physical:storageModel";
const FILE_PATH: &str = "lang:physical:filePath";
const DELIMITER: &str = "lang:physical:delimiter";
const HAS_COLUMN_NAMES: &str = "lang:physical:hasColumnNames";

/// One clause, terminated by `.`.
pub fn clause(clause: &Clause) -> String {
    match clause {
        Clause::Declaration(d) => {
            let types = d.types.iter().map(atom).collect::<Vec<_>>().join(", ");
            if types.is_empty() {
                format!("{} -> .", atom(&d.atom))
            } else {
                format!("{} -> {}.", atom(&d.atom), types)
            }
        }
        Clause::RefModeDeclaration(d) => format!(
            "{}, {} -> {}.",
            predicate(&d.entity),
            refmode(&d.refmode),
            primitive(&d.primitive)
        ),
        Clause::Constraint(c) => format!("{} -> {}.", element(&c.head), element(&c.body)),
        Clause::Rule(r) => rule(r, ""),
    }
}

/// A rule, each head atom prefixed with `delta` (`+` for an insertion).
fn rule(r: &Rule, delta: &str) -> String {
    let head = r
        .head
        .iter()
        .map(|a| format!("{}{}", delta, atom(a)))
        .collect::<Vec<_>>()
        .join(", ");
    match &r.body {
        Some(body) => format!("{} <- {}.", head, element(body)),
        None => format!("{}.", head),
    }
}

pub fn element(e: &Element) -> String {
    match e {
        Element::Logical { op, elements } => {
            let sep = match op {
                LogicalOp::And => ", ",
                LogicalOp::Or => "; ",
            };
            elements
                .iter()
                .map(|child| match child {
                    Element::Logical { .. } => format!("({})", element(child)),
                    _ => element(child),
                })
                .collect::<Vec<_>>()
                .join(sep)
        }
        Element::Negation { element: inner } => match **inner {
            Element::Logical { .. } => format!("!({})", element(inner)),
            _ => format!("!{}", element(inner)),
        },
        Element::Group { element: inner } => format!("({})", element(inner)),
        Element::Comparison { left, op, right } => {
            format!("{} {} {}", expr(left), op.symbol(), expr(right))
        }
        Element::Aggregation {
            var,
            function,
            body,
        } => format!("agg<<{} = {}>> {}", var, predicate(function), element(body)),
        Element::Atom { atom: a } => atom(a),
    }
}

pub fn atom(a: &Atom) -> String {
    match a {
        Atom::Predicate(p) | Atom::Entity(p) => predicate(p),
        Atom::RefMode(r) => refmode(r),
        Atom::Primitive(p) => primitive(p),
        Atom::Functional(f) => functional(f),
        Atom::Directive(d) => directive(d),
        Atom::Stub(s) => s.name.clone(),
    }
}

fn stage(stage: &Option<Stage>) -> &str {
    stage.as_ref().map_or("", Stage::as_str)
}

fn args(args: &[Expr]) -> String {
    args.iter().map(expr).collect::<Vec<_>>().join(", ")
}

fn predicate(p: &Predicate) -> String {
    format!("{}{}({})", p.name, stage(&p.stage), args(&p.args))
}

fn refmode(r: &RefMode) -> String {
    format!(
        "{}{}({}:{})",
        r.name,
        stage(&r.stage),
        expr(&r.entity),
        expr(&r.value)
    )
}

fn primitive(p: &Primitive) -> String {
    format!("{}({})", p.type_name(), expr(&p.var))
}

fn functional(f: &Functional) -> String {
    let lhs = format!("{}{}[{}]", f.name, stage(&f.stage), args(&f.keys));
    match &f.value {
        Some(v) => format!("{} = {}", lhs, expr(v)),
        None => lhs,
    }
}

fn directive(d: &Directive) -> String {
    let target = d
        .backtick
        .as_ref()
        .map(|b| format!("`{}", b))
        .unwrap_or_default();
    match &d.value {
        Some(value) => format!("{}[{}] = {}", d.name, target, constant(value)),
        None => format!("{}({})", d.name, target),
    }
}

pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Variable { name } => name.clone(),
        Expr::Constant { value } => constant(value),
        Expr::Binary { left, op, right } => {
            format!("{} {} {}", expr(left), op.symbol(), expr(right))
        }
        Expr::Functional { atom } => functional(atom),
        Expr::Group { expr: inner } => format!("({})", expr(inner)),
    }
}

pub fn constant(c: &Constant) -> String {
    match c {
        Constant::Integer(i) => i.to_string(),
        Constant::Real(r) => format!("{:?}", r),
        Constant::Boolean(b) => b.to_string(),
        Constant::String(s) => quote(s),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

// ──────────────────────────────────────────────
// File-backed predicates
// ──────────────────────────────────────────────

/// The file-backed shadow of a predicate.
pub fn shadow_name(name: &str) -> String {
    format!("_{}", name)
}

/// The name the evaluator reads the delimiter of a shadow under.
fn delimiter_name(name: &str) -> String {
    format!("{}_", name)
}

fn positional(arity: usize) -> Vec<Expr> {
    (0..arity).map(|i| Expr::var(format!("var{}", i))).collect()
}

/// Storage metadata and typed declaration of the shadow of `file`.
pub fn file_predicate(file: &FileAtom) -> Vec<String> {
    let shadow = shadow_name(&file.name);
    let property = |name: &str, target: &str, value: Constant| {
        clause(&Clause::Rule(Rule {
            head: vec![Atom::Directive(Directive {
                name: name.to_string(),
                backtick: Some(target.to_string()),
                value: Some(value),
            })],
            body: None,
            loc: None,
        }))
    };

    let vars = positional(file.columns.len());
    let types = file
        .columns
        .iter()
        .zip(&vars)
        .map(|(column, var)| Atom::predicate(column.clone(), vec![var.clone()]))
        .collect();
    let declaration = Clause::Declaration(Declaration {
        atom: Atom::predicate(shadow.clone(), vars),
        types,
        loc: None,
    });

    vec![
        property(STORAGE_MODEL, &shadow, Constant::String("DelimitedFile".into())),
        property(FILE_PATH, &shadow, Constant::String(format!("{}.facts", file.name))),
        property(DELIMITER, &delimiter_name(&file.name), Constant::String("\t".into())),
        property(HAS_COLUMN_NAMES, &shadow, Constant::Boolean(false)),
        clause(&declaration),
    ]
}

fn bridge(head: &str, body: &str, arity: usize) -> String {
    let vars = positional(arity);
    rule(
        &Rule {
            head: vec![Atom::predicate(head, vars.clone())],
            body: Some(Atom::predicate(body, vars).into()),
            loc: None,
        },
        "+",
    )
}

/// `+_N(..) <- N(..).`: copy a predicate out to its file.
pub fn export_rule(file: &FileAtom) -> String {
    bridge(&shadow_name(&file.name), &file.name, file.columns.len())
}

/// `+N(..) <- _N(..).`: load a predicate back from its file.
pub fn import_rule(file: &FileAtom) -> String {
    bridge(&file.name, &shadow_name(&file.name), file.columns.len())
}
