//! Tree model for modular logic programs.
//!
//! A [`Program`] owns an arena of clauses and components. Components refer
//! to their clauses by [`ClauseId`], so a clause inherited by several
//! components is stored once and analysis tables can be indexed by id.
//! Trees are never mutated once built: passes produce new programs.

use crate::source::SourceLocation;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Stages
// ──────────────────────────────────────────────

/// Stage marker on an atom. `None` on the atom means the current stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    /// `@past`: the value as of the previous evaluation round.
    Past,
    /// Any other evaluator stage marker, kept verbatim.
    Other(String),
}

impl Stage {
    pub const PAST: &'static str = "@past";

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Past => Self::PAST,
            Stage::Other(s) => s,
        }
    }
}

impl From<String> for Stage {
    fn from(s: String) -> Self {
        if s == Stage::PAST {
            Stage::Past
        } else {
            Stage::Other(s)
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_string()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Constant {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "*")]
    Mult,
    #[serde(rename = "/")]
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mult => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Leq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Geq,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Leq => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Geq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Variable {
        name: String,
    },
    Constant {
        value: Constant,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// A functional atom used as a value, e.g. `f[x] + 1`.
    Functional {
        atom: Functional,
    },
    Group {
        expr: Box<Expr>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable { name: name.into() }
    }

    pub fn constant(value: Constant) -> Self {
        Expr::Constant { value }
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Expr::Variable { name } => Some(name),
            _ => None,
        }
    }
}

// ──────────────────────────────────────────────
// Atoms
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub args: Vec<Expr>,
}

/// `name(entity:value)`, tying an entity to a primitive-typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefMode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub entity: Expr,
    pub value: Expr,
}

/// A primitive type atom such as `int[32](x)` or `string(s)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitive {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    pub var: Expr,
}

impl Primitive {
    pub const DEFAULT_CAPACITY: u32 = 64;

    /// Numeric primitives without an explicit capacity default to 64 bits.
    pub fn effective_capacity(&self) -> Option<u32> {
        match (self.name.as_str(), self.capacity) {
            (_, Some(c)) => Some(c),
            ("int" | "uint" | "float" | "decimal", None) => Some(Self::DEFAULT_CAPACITY),
            _ => None,
        }
    }

    /// The type name as it appears in declarations, e.g. `int[64]`.
    pub fn type_name(&self) -> String {
        match self.effective_capacity() {
            Some(c) => format!("{}[{}]", self.name, c),
            None => self.name.clone(),
        }
    }
}

/// `name[keys] = value`, or `name[keys]` when used without a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Functional {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub keys: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Box<Expr>>,
}

/// A compiler/evaluator pragma such as ``lang:entity(`Person)`` or
/// ``lang:cmd:EVAL[] = "..."``.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Constant>,
}

impl Directive {
    pub const ENTITY: &'static str = "lang:entity";

    /// Predicate form ``name(`x)`` as opposed to ``name[`x] = c``.
    pub fn is_predicate(&self) -> bool {
        self.value.is_none()
    }
}

/// A name-only placeholder for an atom whose structure is not known here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StubAtom {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Atom {
    Predicate(Predicate),
    /// A predicate introducing an identity domain.
    Entity(Predicate),
    RefMode(RefMode),
    Primitive(Primitive),
    Functional(Functional),
    Directive(Directive),
    Stub(StubAtom),
}

impl Atom {
    pub fn predicate(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Atom::Predicate(Predicate {
            name: name.into(),
            stage: None,
            args,
        })
    }

    pub fn entity(name: impl Into<String>, var: impl Into<String>) -> Self {
        Atom::Entity(Predicate {
            name: name.into(),
            stage: None,
            args: vec![Expr::var(var)],
        })
    }

    pub fn primitive(name: impl Into<String>, var: impl Into<String>) -> Self {
        Atom::Primitive(Primitive {
            name: name.into(),
            capacity: None,
            var: Expr::var(var),
        })
    }

    pub fn stub(name: impl Into<String>) -> Self {
        Atom::Stub(StubAtom { name: name.into() })
    }

    pub fn name(&self) -> &str {
        match self {
            Atom::Predicate(p) | Atom::Entity(p) => &p.name,
            Atom::RefMode(r) => &r.name,
            Atom::Primitive(p) => &p.name,
            Atom::Functional(f) => &f.name,
            Atom::Directive(d) => &d.name,
            Atom::Stub(s) => &s.name,
        }
    }

    pub fn stage(&self) -> Option<&Stage> {
        match self {
            Atom::Predicate(p) | Atom::Entity(p) => p.stage.as_ref(),
            Atom::RefMode(r) => r.stage.as_ref(),
            Atom::Functional(f) => f.stage.as_ref(),
            Atom::Primitive(_) | Atom::Directive(_) | Atom::Stub(_) => None,
        }
    }

    /// Number of argument positions; `None` for stubs, which carry no
    /// structure.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Atom::Predicate(p) | Atom::Entity(p) => Some(p.args.len()),
            Atom::RefMode(_) => Some(2),
            Atom::Primitive(_) => Some(1),
            Atom::Functional(f) => Some(f.keys.len() + usize::from(f.value.is_some())),
            Atom::Directive(d) => Some(usize::from(d.backtick.is_some()) + usize::from(d.value.is_some())),
            Atom::Stub(_) => None,
        }
    }

    /// Variable name at each argument position (`None` where the argument
    /// is not a plain variable).
    pub fn vars(&self) -> Vec<Option<&str>> {
        match self {
            Atom::Predicate(p) | Atom::Entity(p) => p.args.iter().map(Expr::as_var).collect(),
            Atom::RefMode(r) => vec![r.entity.as_var(), r.value.as_var()],
            Atom::Primitive(p) => vec![p.var.as_var()],
            Atom::Functional(f) => f
                .keys
                .iter()
                .chain(f.value.as_deref())
                .map(Expr::as_var)
                .collect(),
            Atom::Directive(_) | Atom::Stub(_) => Vec::new(),
        }
    }

    /// A sibling atom of the same kind and name with its arguments replaced
    /// by `vars` and its stage set to `stage`. Primitives, directives and
    /// stubs have nothing to substitute and come back unchanged.
    pub fn instantiate(&self, stage: Option<Stage>, vars: &[Expr]) -> Atom {
        match self {
            Atom::Predicate(p) => Atom::Predicate(Predicate {
                name: p.name.clone(),
                stage,
                args: vars.to_vec(),
            }),
            Atom::Entity(p) => Atom::Entity(Predicate {
                name: p.name.clone(),
                stage,
                args: vars.to_vec(),
            }),
            Atom::RefMode(r) => Atom::RefMode(RefMode {
                name: r.name.clone(),
                stage,
                entity: vars.first().cloned().unwrap_or_else(|| r.entity.clone()),
                value: vars.get(1).cloned().unwrap_or_else(|| r.value.clone()),
            }),
            Atom::Functional(f) => {
                let (keys, value) = match (f.value.is_some(), vars.split_last()) {
                    (true, Some((last, keys))) => (keys.to_vec(), Some(Box::new(last.clone()))),
                    _ => (vars.to_vec(), None),
                };
                Atom::Functional(Functional {
                    name: f.name.clone(),
                    stage,
                    keys,
                    value,
                })
            }
            Atom::Primitive(_) | Atom::Directive(_) | Atom::Stub(_) => self.clone(),
        }
    }

    /// The same atom under a different name and stage. Arguments are kept.
    pub fn with_name(&self, name: String, stage: Option<Stage>) -> Atom {
        match self {
            Atom::Predicate(p) => Atom::Predicate(Predicate {
                name,
                stage,
                args: p.args.clone(),
            }),
            Atom::Entity(p) => Atom::Entity(Predicate {
                name,
                stage,
                args: p.args.clone(),
            }),
            Atom::RefMode(r) => Atom::RefMode(RefMode {
                name,
                stage,
                ..r.clone()
            }),
            Atom::Functional(f) => Atom::Functional(Functional {
                name,
                stage,
                ..f.clone()
            }),
            Atom::Primitive(p) => Atom::Primitive(Primitive { name, ..p.clone() }),
            Atom::Directive(d) => Atom::Directive(Directive { name, ..d.clone() }),
            Atom::Stub(_) => Atom::Stub(StubAtom { name }),
        }
    }
}

// ──────────────────────────────────────────────
// Elements
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Logical {
        op: LogicalOp,
        elements: Vec<Element>,
    },
    Negation {
        element: Box<Element>,
    },
    Group {
        element: Box<Element>,
    },
    Comparison {
        left: Expr,
        op: ComparisonOp,
        right: Expr,
    },
    /// `agg<<var = function>> body`
    Aggregation {
        var: String,
        function: Predicate,
        body: Box<Element>,
    },
    Atom {
        atom: Atom,
    },
}

impl Element {
    pub fn and(elements: Vec<Element>) -> Self {
        Element::Logical {
            op: LogicalOp::And,
            elements,
        }
    }

    pub fn or(elements: Vec<Element>) -> Self {
        Element::Logical {
            op: LogicalOp::Or,
            elements,
        }
    }

    pub fn not(element: Element) -> Self {
        Element::Negation {
            element: Box::new(element),
        }
    }
}

impl From<Atom> for Element {
    fn from(atom: Atom) -> Self {
        Element::Atom { atom }
    }
}

// ──────────────────────────────────────────────
// Clauses
// ──────────────────────────────────────────────

/// `head -> type1, type2, ...`. Type atoms are stored in the positional
/// order of the head's variables; see [`Declaration::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub atom: Atom,
    pub types: Vec<Atom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

/// `Entity(x), refmode(x:v) -> primitive(v).`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefModeDeclaration {
    pub refmode: RefMode,
    pub entity: Predicate,
    pub primitive: Primitive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

/// `head -> body.`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub head: Element,
    pub body: Element,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

/// `head <- body.`, or a fact `head.` when there is no body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Vec<Atom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Declaration(Declaration),
    RefModeDeclaration(RefModeDeclaration),
    Constraint(Constraint),
    Rule(Rule),
}

impl Clause {
    pub fn loc(&self) -> Option<&SourceLocation> {
        match self {
            Clause::Declaration(d) => d.loc.as_ref(),
            Clause::RefModeDeclaration(d) => d.loc.as_ref(),
            Clause::Constraint(c) => c.loc.as_ref(),
            Clause::Rule(r) => r.loc.as_ref(),
        }
    }
}

// ──────────────────────────────────────────────
// Components and programs
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClauseId(usize);

impl ClauseId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ComponentId(usize);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The external-tool half of a command block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBlock {
    pub eval: String,
    /// Working directory the tool runs in, from `lang:cmd:DIR`.
    pub dir: Option<String>,
    pub imports: IndexSet<String>,
    pub exports: IndexSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    Regular,
    Command(CommandBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub parent: Option<String>,
    pub declarations: IndexSet<ClauseId>,
    pub constraints: IndexSet<ClauseId>,
    pub rules: IndexSet<ClauseId>,
    pub kind: ComponentKind,
    pub loc: Option<SourceLocation>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            parent: None,
            declarations: IndexSet::new(),
            constraints: IndexSet::new(),
            rules: IndexSet::new(),
            kind: ComponentKind::Regular,
            loc: None,
        }
    }

    pub fn command(&self) -> Option<&CommandBlock> {
        match &self.kind {
            ComponentKind::Command(block) => Some(block),
            ComponentKind::Regular => None,
        }
    }

    pub fn is_command(&self) -> bool {
        self.command().is_some()
    }

    /// Declarations, then constraints, then rules.
    pub fn clauses(&self) -> impl Iterator<Item = ClauseId> + '_ {
        self.declarations
            .iter()
            .chain(&self.constraints)
            .chain(&self.rules)
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instantiation {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

/// Makes atoms of instance `from` visible in instance `to`, or in global
/// scope when `to` is absent. An empty atom list propagates everything the
/// source declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Propagation {
    pub from: String,
    #[serde(default)]
    pub atoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

impl Propagation {
    pub fn is_wildcard(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// A whole program: the global component, named components, the
/// instantiation table and the propagation edges.
///
/// Before instantiation `components` holds templates keyed by template
/// name; afterwards it holds instances keyed by instance id and the
/// instantiation table is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) clauses: Vec<Clause>,
    pub(crate) arena: Vec<Component>,
    pub(crate) global: ComponentId,
    pub(crate) components: IndexMap<String, ComponentId>,
    pub(crate) instantiations: IndexMap<String, Instantiation>,
    pub(crate) propagations: Vec<Propagation>,
}

impl Program {
    /// A program holding only an empty global component.
    pub(crate) fn empty() -> Self {
        Program {
            clauses: Vec::new(),
            arena: vec![Component::new("")],
            global: ComponentId(0),
            components: IndexMap::new(),
            instantiations: IndexMap::new(),
            propagations: Vec::new(),
        }
    }

    pub(crate) fn push_clause(&mut self, clause: Clause) -> ClauseId {
        self.clauses.push(clause);
        ClauseId(self.clauses.len() - 1)
    }

    pub(crate) fn push_component(&mut self, component: Component) -> ComponentId {
        self.arena.push(component);
        ComponentId(self.arena.len() - 1)
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.arena[id.0]
    }

    pub fn clause(&self, id: ClauseId) -> &Clause {
        &self.clauses[id.0]
    }

    pub fn clauses(&self) -> impl Iterator<Item = (ClauseId, &Clause)> {
        self.clauses.iter().enumerate().map(|(i, c)| (ClauseId(i), c))
    }

    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.arena[id.0]
    }

    /// Every component in the arena, the global one included.
    pub fn all_components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.arena.iter().enumerate().map(|(i, c)| (ComponentId(i), c))
    }

    pub fn component_count(&self) -> usize {
        self.arena.len()
    }

    pub fn global_id(&self) -> ComponentId {
        self.global
    }

    pub fn global(&self) -> &Component {
        self.component(self.global)
    }

    /// Named components (templates or instances), in insertion order.
    pub fn components(&self) -> impl Iterator<Item = (&str, ComponentId)> {
        self.components.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn component_id(&self, name: &str) -> Option<ComponentId> {
        self.components.get(name).copied()
    }

    pub fn component_named(&self, name: &str) -> Option<&Component> {
        self.component_id(name).map(|id| self.component(id))
    }

    pub fn instantiations(&self) -> &IndexMap<String, Instantiation> {
        &self.instantiations
    }

    pub fn propagations(&self) -> &[Propagation] {
        &self.propagations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_primitives_default_to_64_bits() {
        let Atom::Primitive(p) = Atom::primitive("int", "x") else {
            unreachable!()
        };
        assert_eq!(p.type_name(), "int[64]");

        let s = Primitive {
            name: "string".into(),
            capacity: None,
            var: Expr::var("s"),
        };
        assert_eq!(s.type_name(), "string");

        let f = Primitive {
            name: "float".into(),
            capacity: Some(32),
            var: Expr::var("f"),
        };
        assert_eq!(f.type_name(), "float[32]");
    }

    #[test]
    fn instantiate_predicate_replaces_args_and_stage() {
        let atom = Atom::predicate("p", vec![Expr::var("a"), Expr::var("b")]);
        let vars = [Expr::var("var0"), Expr::var("var1")];
        let inst = atom.instantiate(Some(Stage::Past), &vars);
        assert_eq!(inst.name(), "p");
        assert_eq!(inst.stage(), Some(&Stage::Past));
        assert_eq!(inst.vars(), vec![Some("var0"), Some("var1")]);
    }

    #[test]
    fn instantiate_functional_splits_value() {
        let atom = Atom::Functional(Functional {
            name: "f".into(),
            stage: None,
            keys: vec![Expr::var("k")],
            value: Some(Box::new(Expr::var("v"))),
        });
        assert_eq!(atom.arity(), Some(2));
        let inst = atom.instantiate(None, &[Expr::var("var0"), Expr::var("var1")]);
        let Atom::Functional(f) = inst else {
            panic!("expected functional")
        };
        assert_eq!(f.keys, vec![Expr::var("var0")]);
        assert_eq!(f.value.as_deref(), Some(&Expr::var("var1")));
    }

    #[test]
    fn instantiate_keeps_entity_kind() {
        let atom = Atom::entity("Person", "x");
        let inst = atom.instantiate(None, &[Expr::var("var0")]);
        assert!(matches!(inst, Atom::Entity(_)));
    }

    #[test]
    fn stub_has_no_arity() {
        assert_eq!(Atom::stub("p").arity(), None);
        assert!(Atom::stub("p").vars().is_empty());
    }

    #[test]
    fn stage_round_trips_through_strings() {
        assert_eq!(Stage::from("@past".to_string()), Stage::Past);
        assert_eq!(String::from(Stage::Other("@prev".into())), "@prev");
    }

    #[test]
    fn atom_deserializes_from_tagged_json() {
        let json = r#"{"kind":"predicate","name":"p","stage":"@past","args":[{"kind":"variable","name":"x"}]}"#;
        let atom: Atom = serde_json::from_str(json).unwrap();
        assert_eq!(atom.name(), "p");
        assert_eq!(atom.stage(), Some(&Stage::Past));
        assert_eq!(atom.arity(), Some(1));
    }
}
