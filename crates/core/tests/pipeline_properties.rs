//! End-to-end properties of the compile pipeline: inheritance, propagation,
//! scheduling and command-block linkage.

use modlogic_core::ast::*;
use modlogic_core::{
    compile, flatten, AtomUsage, CommandBuilder, CompileOptions, ComponentBuilder, ErrorId, Node,
    Phase, ProgramBuilder,
};
use proptest::prelude::*;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn pred(name: &str, vars: &[&str]) -> Atom {
    Atom::predicate(name, vars.iter().map(|v| Expr::var(*v)).collect())
}

fn typed(name: &str, vars: &[&str], types: &[&str]) -> Declaration {
    let type_atoms = vars
        .iter()
        .zip(types)
        .map(|(v, t)| Atom::primitive(*t, *v))
        .collect();
    Declaration::new(pred(name, vars), type_atoms, None).unwrap()
}

fn rule(head: Atom, body: Atom) -> Rule {
    Rule {
        head: vec![head],
        body: Some(body.into()),
        loc: None,
    }
}

fn directive(name: &str, backtick: Option<&str>, value: Option<&str>) -> Rule {
    Rule {
        head: vec![Atom::Directive(Directive {
            name: name.into(),
            backtick: backtick.map(str::to_string),
            value: value.map(|v| Constant::String(v.into())),
        })],
        body: None,
        loc: None,
    }
}

fn propagate(from: &str, atoms: &[&str], to: Option<&str>) -> Propagation {
    Propagation {
        from: from.into(),
        atoms: atoms.iter().map(|a| a.to_string()).collect(),
        to: to.map(str::to_string),
        loc: None,
    }
}

/// `T` declares `p(x)` and derives it from external `seed`.
fn producer() -> ComponentBuilder {
    let mut t = ComponentBuilder::new("T");
    t.add_declaration(typed("p", &["x"], &["int"]));
    t.add_rule(rule(pred("p", &["x"]), pred("seed", &["x"])));
    t
}

fn rules_in(program: &Program, component: &Component) -> Vec<Rule> {
    component
        .rules
        .iter()
        .filter_map(|id| match program.clause(*id) {
            Clause::Rule(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

fn global_rules(program: &Program) -> Vec<Rule> {
    rules_in(program, program.global())
}

fn strict() -> CompileOptions {
    CompileOptions { strict: true }
}

// ──────────────────────────────────────────────
// Inheritance
// ──────────────────────────────────────────────

#[test]
fn flattening_parentless_component_is_identity() {
    let mut b = ProgramBuilder::new();
    b.add_component(producer());
    let program = b.build().unwrap();
    let t = program.component_named("T").unwrap();
    let flat = flatten(t, &program).unwrap();
    assert_eq!(flat.declarations, t.declarations);
    assert_eq!(flat.constraints, t.constraints);
    assert_eq!(flat.rules, t.rules);
    assert_eq!(flat.parent, None);
}

#[test]
fn flattening_unions_the_whole_chain() {
    let mut b = ProgramBuilder::new();
    let mut c1 = ComponentBuilder::new("C1");
    c1.add_declaration(typed("a", &["x"], &["int"]));
    let mut c2 = ComponentBuilder::new("C2").extends("C1");
    c2.add_declaration(typed("b", &["x"], &["int"]));
    let mut c3 = ComponentBuilder::new("C3").extends("C2");
    c3.add_declaration(typed("c", &["x"], &["int"]));
    c3.add_rule(rule(pred("c", &["x"]), pred("a", &["x"])));
    b.add_component(c1);
    b.add_component(c2);
    b.add_component(c3);
    let program = b.build().unwrap();

    let flat = flatten(program.component_named("C3").unwrap(), &program).unwrap();
    assert_eq!(flat.parent, None);
    assert_eq!(flat.declarations.len(), 3);
    assert_eq!(flat.rules.len(), 1);
}

// ──────────────────────────────────────────────
// Propagation
// ──────────────────────────────────────────────

fn two_predicate_program(atoms: &[&str]) -> Program {
    let mut b = ProgramBuilder::new();
    let mut x = ComponentBuilder::new("X");
    x.add_declaration(typed("A", &["a", "b"], &["int", "string"]));
    x.add_declaration(typed("B", &["a"], &["int"]));
    x.add_rule(directive("lang:physical:capacity", Some("B"), Some("8")));
    b.add_component(x);
    b.add_instantiation("x", "X", None).unwrap();
    b.add_propagation(propagate("x", atoms, None));
    b.build().unwrap()
}

#[test]
fn wildcard_propagation_matches_explicit_list() {
    let wildcard = compile(&two_predicate_program(&[]), CompileOptions::default()).unwrap();
    let explicit = compile(&two_predicate_program(&["A", "B"]), CompileOptions::default()).unwrap();

    let mut from_wildcard = global_rules(&wildcard.program);
    let mut from_explicit = global_rules(&explicit.program);
    let key = |r: &Rule| r.head[0].name().to_string();
    from_wildcard.sort_by_key(key);
    from_explicit.sort_by_key(key);
    assert_eq!(from_wildcard.len(), 2);
    assert_eq!(from_wildcard, from_explicit);
}

#[test]
fn reintroducing_declared_global_predicate_is_fatal() {
    let mut b = ProgramBuilder::new();
    b.global().add_declaration(typed("p", &["x"], &["int"]));
    b.add_component(producer());
    b.add_instantiation("a", "T", None).unwrap();
    b.add_propagation(propagate("a", &["p"], None));
    let err = compile(&b.build().unwrap(), CompileOptions::default()).unwrap_err();
    assert_eq!(err.id, ErrorId::DepGlobal);
}

#[test]
fn reintroducing_used_global_predicate_warns() {
    let mut b = ProgramBuilder::new();
    b.global().add_declaration(typed("q", &["x"], &["int"]));
    b.global().add_rule(rule(pred("q", &["x"]), pred("p", &["x"])));
    b.add_component(producer());
    b.add_instantiation("a", "T", None).unwrap();
    b.add_propagation(propagate("a", &["p"], None));
    let compiled = compile(&b.build().unwrap(), CompileOptions::default()).unwrap();
    assert!(compiled
        .warnings
        .iter()
        .any(|w| w.id == ErrorId::DepGlobal));
}

/// `x:T` declares the entity `Person` with reference mode `person_id`;
/// `y:U` reads both without declaring either.
fn identity_program(atoms: &[&str]) -> Program {
    let mut b = ProgramBuilder::new();
    let mut t = ComponentBuilder::new("T");
    t.add_refmode(RefModeDeclaration {
        refmode: RefMode {
            name: "person_id".into(),
            stage: None,
            entity: Expr::var("x"),
            value: Expr::var("v"),
        },
        entity: Predicate {
            name: "Person".into(),
            stage: None,
            args: vec![Expr::var("x")],
        },
        primitive: Primitive {
            name: "string".into(),
            capacity: None,
            var: Expr::var("v"),
        },
        loc: None,
    });
    b.add_component(t);

    let mut u = ComponentBuilder::new("U");
    u.add_declaration(Declaration::new(pred("known", &["x"]), vec![], None).unwrap());
    u.add_rule(rule(pred("known", &["x"]), pred("Person", &["x"])));
    u.add_rule(rule(
        pred("known", &["x"]),
        Atom::RefMode(RefMode {
            name: "person_id".into(),
            stage: None,
            entity: Expr::var("x"),
            value: Expr::var("v"),
        }),
    ));
    b.add_component(u);
    b.add_instantiation("x", "T", None).unwrap();
    b.add_instantiation("y", "U", None).unwrap();
    b.add_propagation(propagate("x", atoms, Some("y")));
    b.build().unwrap()
}

#[test]
fn propagated_entity_and_refmode_are_written_into_the_receiver() {
    let explicit_and_wildcard: [&[&str]; 2] = [&["Person", "person_id"], &[]];
    for atoms in explicit_and_wildcard {
        let compiled = compile(&identity_program(atoms), strict()).unwrap();
        assert!(compiled.warnings.is_empty(), "propagating {:?}", atoms);

        let y = compiled.program.component_named("y").unwrap();
        let frames: Vec<(String, String)> = rules_in(&compiled.program, y)
            .iter()
            .filter_map(|r| match &r.body {
                Some(Element::Atom { atom }) if atom.name().starts_with("x:") => {
                    Some((r.head[0].name().to_string(), atom.name().to_string()))
                }
                _ => None,
            })
            .collect();
        assert!(frames.contains(&("y:Person:past".into(), "x:Person".into())));
        assert!(frames.contains(&("y:person_id:past".into(), "x:person_id".into())));
    }
}

#[test]
fn undeclared_global_use_fails_in_strict_mode() {
    let mut b = ProgramBuilder::new();
    b.global().add_declaration(typed("s", &["x"], &["int"]));
    b.global().add_rule(rule(pred("s", &["x"]), pred("nowhere", &["x"])));
    let program = b.build().unwrap();

    let err = compile(&program, strict()).unwrap_err();
    assert_eq!(err.id, ErrorId::NoDecl);
    assert!(err.message.contains("`nowhere`"));

    let compiled = compile(&program, CompileOptions::default()).unwrap();
    assert_eq!(compiled.warnings.len(), 1);
    assert_eq!(compiled.warnings[0].id, ErrorId::NoDecl);
}

// ──────────────────────────────────────────────
// Scheduling
// ──────────────────────────────────────────────

#[test]
fn mutual_propagation_is_a_dependency_cycle() {
    let mut b = ProgramBuilder::new();
    b.add_component(producer());
    b.add_instantiation("a", "T", None).unwrap();
    b.add_instantiation("b", "T", None).unwrap();
    b.add_propagation(propagate("a", &["p"], Some("b")));
    b.add_propagation(propagate("b", &["p"], Some("a")));
    let err = compile(&b.build().unwrap(), CompileOptions::default()).unwrap_err();
    assert_eq!(err.id, ErrorId::DepCycle);
}

fn dag_program(n: usize, edges: &[(usize, usize)]) -> Program {
    let mut b = ProgramBuilder::new();
    b.add_component(producer());
    for i in 0..n {
        b.add_instantiation(format!("c{}", i), "T", None).unwrap();
    }
    for (from, to) in edges {
        b.add_propagation(propagate(
            &format!("c{}", from),
            &["p"],
            Some(&format!("c{}", to)),
        ));
    }
    b.build().unwrap()
}

fn arb_dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..8).prop_flat_map(|n| {
        let edge = (0..n, 0..n)
            .prop_filter("no self loops", |(a, b)| a != b)
            .prop_map(|(a, b)| (a.min(b), a.max(b)));
        (Just(n), prop::collection::vec(edge, 0..12))
    })
}

proptest! {
    #[test]
    fn dag_layering_respects_every_edge((n, edges) in arb_dag()) {
        let compiled = compile(&dag_program(n, &edges), CompileOptions::default()).unwrap();
        let layer_of = |id: String| {
            compiled
                .layers
                .iter()
                .position(|layer| layer.iter().any(|node| node.name() == id))
                .unwrap()
        };
        for (from, to) in &edges {
            let from_layer = layer_of(format!("c{}", from));
            let to_layer = layer_of(format!("c{}", to));
            prop_assert!(from_layer < to_layer);
        }
        let scheduled: usize = compiled.layers.iter().map(Vec::len).sum();
        prop_assert_eq!(scheduled, n);
    }
}

// ──────────────────────────────────────────────
// Command blocks
// ──────────────────────────────────────────────

fn command(declares: &[&str], imports: &[&str]) -> CommandBuilder {
    let mut cmd = CommandBuilder::new("Tool");
    cmd.add_rule(directive("lang:cmd:EVAL", None, Some("\"tool\"")))
        .unwrap();
    for name in declares {
        cmd.add_declaration(typed(name, &["x"], &["int"]));
    }
    for name in imports {
        cmd.add_rule(directive("lang:cmd:import", Some(name), None))
            .unwrap();
    }
    cmd
}

fn compile_command(cmd: CommandBuilder) -> Result<modlogic_core::Compilation, modlogic_core::CompileError> {
    let mut b = ProgramBuilder::new();
    b.add_command(cmd);
    b.add_instantiation("t", "Tool", None).unwrap();
    compile(&b.build().unwrap(), CompileOptions::default())
}

#[test]
fn command_import_needs_declaration() {
    let err = compile_command(command(&[], &["r"])).unwrap_err();
    assert_eq!(err.id, ErrorId::CmdNoDecl);
    assert!(err.message.contains("`r`"));
}

#[test]
fn command_declaration_needs_import() {
    let err = compile_command(command(&["s"], &[])).unwrap_err();
    assert_eq!(err.id, ErrorId::CmdNoImport);
    assert!(err.message.contains("`s`"));
}

#[test]
fn command_declared_and_imported_compiles() {
    let compiled = compile_command(command(&["t"], &["t"])).unwrap();
    let phase = compiled
        .phases
        .iter()
        .find_map(|p| match p {
            Phase::Command(c) => Some(c),
            Phase::Logic(_) => None,
        })
        .unwrap();
    assert_eq!(phase.imports.len(), 1);
    assert_eq!(phase.imports[0].name, "t:t");
}

#[test]
fn command_columns_follow_declaration_order() {
    let mut cmd = CommandBuilder::new("Tool");
    cmd.add_rule(directive("lang:cmd:EVAL", None, Some("\"tool\"")))
        .unwrap();
    cmd.add_rule(directive("lang:cmd:import", Some("q"), None))
        .unwrap();
    // types listed out of order; the declaration orders them by variable
    cmd.add_declaration(
        Declaration::new(
            pred("q", &["a", "b"]),
            vec![Atom::primitive("string", "b"), Atom::primitive("int", "a")],
            None,
        )
        .unwrap(),
    );
    let compiled = compile_command(cmd).unwrap();
    let Some(Phase::Command(phase)) = compiled.phases.iter().find(|p| matches!(p, Phase::Command(_)))
    else {
        panic!("expected a command phase")
    };
    assert_eq!(phase.imports[0].columns, vec!["int[64]", "string"]);
}

#[test]
fn import_declared_with_fewer_types_than_arity_is_rejected() {
    let mut cmd = CommandBuilder::new("Tool");
    cmd.add_rule(directive("lang:cmd:EVAL", None, Some("\"tool\"")))
        .unwrap();
    cmd.add_rule(directive("lang:cmd:import", Some("q"), None))
        .unwrap();
    // `q(a, 1) -> int(a).`: the constant position has no type
    cmd.add_declaration(
        Declaration::new(
            Atom::predicate("q", vec![Expr::var("a"), Expr::constant(Constant::Integer(1))]),
            vec![Atom::primitive("int", "a")],
            None,
        )
        .unwrap(),
    );
    let err = compile_command(cmd).unwrap_err();
    assert_eq!(err.id, ErrorId::ColumnArity);
    assert!(err.message.contains("`t:q`"));
}

#[test]
fn instantiated_program_usage_is_queryable() {
    let mut b = ProgramBuilder::new();
    b.add_component(producer());
    b.add_instantiation("a", "T", None).unwrap();
    let compiled = compile(&b.build().unwrap(), CompileOptions::default()).unwrap();
    let usage = AtomUsage::analyze(&compiled.program).unwrap();
    let a = compiled.program.component_id("a").unwrap();
    assert!(usage.declared(Node::Component(a)).contains_key("a:p"));
    assert!(usage.used(Node::Component(a)).contains_key("seed"));
}
