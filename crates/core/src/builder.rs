//! Builders the front end uses to hand a program over.
//!
//! Components are accumulated clause by clause and then consumed into an
//! immutable [`Program`]. Structural checks that only need the clause at
//! hand (declaration shape, command-block directives, duplicate instance
//! ids) happen here, as the clause is added.

use crate::ast::*;
use crate::error::{CompileError, ErrorId};
use crate::source::SourceLocation;
use indexmap::{IndexMap, IndexSet};

const CMD_EVAL: &str = "lang:cmd:EVAL";
const CMD_DIR: &str = "lang:cmd:DIR";
const CMD_EXPORT: &str = "lang:cmd:export";
const CMD_IMPORT: &str = "lang:cmd:import";

impl Declaration {
    /// Build a declaration, ordering `types` by the position of their
    /// variable in `atom`.
    ///
    /// An empty type list declares the head without typing it (the usual
    /// shape for entities, `Person(x) -> .`). Otherwise the type atoms must
    /// cover every head variable exactly once.
    pub fn new(
        atom: Atom,
        types: Vec<Atom>,
        loc: Option<SourceLocation>,
    ) -> Result<Declaration, CompileError> {
        if types.is_empty() {
            return Ok(Declaration { atom, types, loc });
        }

        let head_vars: Vec<&str> = atom.vars().into_iter().flatten().collect();
        let mut ordered: Vec<Option<Atom>> = vec![None; head_vars.len()];
        for ty in &types {
            let var = ty.vars().into_iter().flatten().next().unwrap_or_default();
            let Some(pos) = head_vars.iter().position(|v| *v == var) else {
                return Err(CompileError::new(ErrorId::UnknownVar, &[var]).at(loc.as_ref()));
            };
            ordered[pos] = Some(ty.clone());
        }

        let var_count = head_vars.len();
        let ordered: Option<Vec<Atom>> = ordered.into_iter().collect();
        match ordered {
            Some(ordered) if ordered.len() == types.len() => Ok(Declaration {
                atom,
                types: ordered,
                loc,
            }),
            _ => Err(CompileError::new(
                ErrorId::DeclShape,
                &[
                    atom.name().to_string(),
                    types.len().to_string(),
                    var_count.to_string(),
                ],
            )
            .at(loc.as_ref())),
        }
    }
}

// ──────────────────────────────────────────────
// Components
// ──────────────────────────────────────────────

/// Accumulates the clauses of an ordinary component (or the global one).
#[derive(Debug, Clone)]
pub struct ComponentBuilder {
    name: String,
    parent: Option<String>,
    declarations: Vec<Clause>,
    constraints: Vec<Constraint>,
    rules: Vec<Rule>,
    loc: Option<SourceLocation>,
}

impl ComponentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ComponentBuilder {
            name: name.into(),
            parent: None,
            declarations: Vec::new(),
            constraints: Vec::new(),
            rules: Vec::new(),
            loc: None,
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_declaration(&mut self, declaration: Declaration) -> &mut Self {
        self.declarations.push(Clause::Declaration(declaration));
        self
    }

    pub fn add_refmode(&mut self, declaration: RefModeDeclaration) -> &mut Self {
        self.declarations
            .push(Clause::RefModeDeclaration(declaration));
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    fn finish(self, program: &mut Program) -> Component {
        let mut component = Component::new(self.name);
        component.parent = self.parent;
        component.loc = self.loc;
        for clause in self.declarations {
            component.declarations.insert(program.push_clause(clause));
        }
        for constraint in self.constraints {
            component
                .constraints
                .insert(program.push_clause(Clause::Constraint(constraint)));
        }
        for rule in self.rules {
            component.rules.insert(program.push_clause(Clause::Rule(rule)));
        }
        component
    }
}

/// Accumulates a command block. Command blocks accept declarations and
/// the `lang:cmd:*` directives only.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    name: String,
    declarations: Vec<Declaration>,
    eval: Option<String>,
    dir: Option<String>,
    imports: IndexSet<String>,
    exports: IndexSet<String>,
    loc: Option<SourceLocation>,
}

impl CommandBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        CommandBuilder {
            name: name.into(),
            declarations: Vec::new(),
            eval: None,
            dir: None,
            imports: IndexSet::new(),
            exports: IndexSet::new(),
            loc: None,
        }
    }

    pub fn at(mut self, loc: SourceLocation) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_declaration(&mut self, declaration: Declaration) -> &mut Self {
        self.declarations.push(declaration);
        self
    }

    pub fn add_refmode(&mut self, declaration: RefModeDeclaration) -> Result<(), CompileError> {
        Err(CompileError::new(ErrorId::CmdRefMode, &[&self.name]).at(declaration.loc.as_ref()))
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), CompileError> {
        Err(CompileError::new(ErrorId::CmdConstraint, &[] as &[&str]).at(constraint.loc.as_ref()))
    }

    /// Accept a `lang:cmd:*` directive. Anything else is rejected.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), CompileError> {
        match rule.head.as_slice() {
            [Atom::Directive(directive)] => self.add_directive(directive, rule.loc.as_ref()),
            _ => Err(CompileError::new(ErrorId::CmdRule, &[] as &[&str]).at(rule.loc.as_ref())),
        }
    }

    fn add_directive(
        &mut self,
        directive: &Directive,
        loc: Option<&SourceLocation>,
    ) -> Result<(), CompileError> {
        let invalid = || CompileError::new(ErrorId::CmdDirective, &[&directive.name]).at(loc);
        match directive.name.as_str() {
            CMD_EVAL => {
                if self.eval.is_some() {
                    return Err(CompileError::new(ErrorId::CmdEval, &[&self.name]).at(loc));
                }
                let command = match &directive.value {
                    Some(Constant::String(s)) => s.trim_matches('"').to_string(),
                    _ => return Err(invalid()),
                };
                self.eval = Some(command);
            }
            CMD_DIR => {
                if self.dir.is_some() {
                    return Err(CompileError::new(ErrorId::CmdDir, &[&self.name]).at(loc));
                }
                let dir = match &directive.value {
                    Some(Constant::String(s)) => s.trim_matches('"').to_string(),
                    _ => return Err(invalid()),
                };
                self.dir = Some(dir);
            }
            CMD_EXPORT => {
                let name = directive.backtick.clone().ok_or_else(invalid)?;
                self.exports.insert(name);
            }
            CMD_IMPORT => {
                let name = directive.backtick.clone().ok_or_else(invalid)?;
                self.imports.insert(name);
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }

    fn finish(self, program: &mut Program) -> Result<Component, CompileError> {
        let Some(eval) = self.eval else {
            return Err(CompileError::new(ErrorId::CmdNoEval, &[&self.name]).at(self.loc.as_ref()));
        };
        let mut component = Component::new(self.name);
        component.loc = self.loc;
        for declaration in self.declarations {
            component
                .declarations
                .insert(program.push_clause(Clause::Declaration(declaration)));
        }
        component.kind = ComponentKind::Command(CommandBlock {
            eval,
            dir: self.dir,
            imports: self.imports,
            exports: self.exports,
        });
        Ok(component)
    }
}

// ──────────────────────────────────────────────
// Programs
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
enum PendingComponent {
    Regular(ComponentBuilder),
    Command(CommandBuilder),
}

/// Accumulates a whole program.
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    global: ComponentBuilder,
    components: IndexMap<String, PendingComponent>,
    instantiations: IndexMap<String, Instantiation>,
    propagations: Vec<Propagation>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder {
            global: ComponentBuilder::new(""),
            components: IndexMap::new(),
            instantiations: IndexMap::new(),
            propagations: Vec::new(),
        }
    }

    /// The global component. Clauses outside any component go here.
    pub fn global(&mut self) -> &mut ComponentBuilder {
        &mut self.global
    }

    /// Add a component template. A later template with the same name
    /// replaces the earlier one.
    pub fn add_component(&mut self, component: ComponentBuilder) -> &mut Self {
        self.components.insert(
            component.name().to_string(),
            PendingComponent::Regular(component),
        );
        self
    }

    pub fn add_command(&mut self, command: CommandBuilder) -> &mut Self {
        self.components
            .insert(command.name().to_string(), PendingComponent::Command(command));
        self
    }

    /// Bind instance `id` to `template`. Ids are unique across the program.
    pub fn add_instantiation(
        &mut self,
        id: impl Into<String>,
        template: impl Into<String>,
        loc: Option<SourceLocation>,
    ) -> Result<(), CompileError> {
        let id = id.into();
        if self.instantiations.contains_key(&id) {
            return Err(CompileError::new(ErrorId::IdInUse, &[&id]).at(loc.as_ref()));
        }
        self.instantiations.insert(
            id,
            Instantiation {
                template: template.into(),
                loc,
            },
        );
        Ok(())
    }

    pub fn add_propagation(&mut self, propagation: Propagation) -> &mut Self {
        self.propagations.push(propagation);
        self
    }

    /// Consume the builder into an immutable program. Fails only on command
    /// blocks missing their EVAL property.
    pub fn build(self) -> Result<Program, CompileError> {
        let mut program = Program::empty();
        let global = self.global.finish(&mut program);
        *program.component_mut(program.global) = global;

        for (name, pending) in self.components {
            let component = match pending {
                PendingComponent::Regular(c) => c.finish(&mut program),
                PendingComponent::Command(c) => c.finish(&mut program)?,
            };
            let id = program.push_component(component);
            program.components.insert(name, id);
        }
        program.instantiations = self.instantiations;
        program.propagations = self.propagations;
        Ok(program)
    }
}
