//! JSON tree interchange.
//!
//! A [`ProgramDocument`] is what a front end writes when it does not link
//! against this crate. It is fed through the builders, so a document gets
//! exactly the structural checks a builder-assembled program gets.

use crate::ast::*;
use crate::builder::{CommandBuilder, ComponentBuilder, ProgramBuilder};
use crate::error::CompileError;
use crate::source::SourceLocation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDocument {
    #[serde(default)]
    pub global: BlockDocument,
    #[serde(default)]
    pub components: Vec<ComponentDocument>,
    #[serde(default)]
    pub commands: Vec<CommandDocument>,
    #[serde(default)]
    pub instantiations: Vec<InstantiationDocument>,
    #[serde(default)]
    pub propagations: Vec<Propagation>,
}

/// The clauses of the global component or of a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockDocument {
    #[serde(default)]
    pub declarations: Vec<DeclarationDocument>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub body: BlockDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDocument {
    pub name: String,
    #[serde(default)]
    pub declarations: Vec<DeclarationDocument>,
    /// `lang:cmd:*` directives.
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

/// A declaration before its type atoms have been put in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeclarationDocument {
    RefMode(RefModeDeclaration),
    Typed {
        head: Atom,
        #[serde(default)]
        types: Vec<Atom>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        loc: Option<SourceLocation>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantiationDocument {
    pub id: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

impl ProgramDocument {
    pub fn from_json(text: &str) -> Result<ProgramDocument, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Assemble the program through the builders.
    pub fn into_program(self) -> Result<Program, CompileError> {
        let mut builder = ProgramBuilder::new();
        self.global.fill(builder.global())?;

        for doc in self.components {
            let mut component = ComponentBuilder::new(doc.name);
            if let Some(parent) = doc.parent {
                component = component.extends(parent);
            }
            if let Some(loc) = doc.loc {
                component = component.at(loc);
            }
            doc.body.fill(&mut component)?;
            builder.add_component(component);
        }

        for doc in self.commands {
            let mut command = CommandBuilder::new(doc.name);
            if let Some(loc) = doc.loc {
                command = command.at(loc);
            }
            for declaration in doc.declarations {
                match declaration {
                    DeclarationDocument::RefMode(d) => command.add_refmode(d)?,
                    DeclarationDocument::Typed { head, types, loc } => {
                        command.add_declaration(Declaration::new(head, types, loc)?);
                    }
                }
            }
            for rule in doc.rules {
                command.add_rule(rule)?;
            }
            builder.add_command(command);
        }

        for inst in self.instantiations {
            builder.add_instantiation(inst.id, inst.template, inst.loc)?;
        }
        for prop in self.propagations {
            builder.add_propagation(prop);
        }
        builder.build()
    }
}

impl BlockDocument {
    fn fill(self, component: &mut ComponentBuilder) -> Result<(), CompileError> {
        for declaration in self.declarations {
            match declaration {
                DeclarationDocument::RefMode(d) => {
                    component.add_refmode(d);
                }
                DeclarationDocument::Typed { head, types, loc } => {
                    component.add_declaration(Declaration::new(head, types, loc)?);
                }
            }
        }
        for constraint in self.constraints {
            component.add_constraint(constraint);
        }
        for rule in self.rules {
            component.add_rule(rule);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorId;

    const DOC: &str = r#"{
        "global": {
            "declarations": [
                {"head": {"kind": "predicate", "name": "seed", "args": [{"kind": "variable", "name": "x"}]},
                 "types": [{"kind": "primitive", "name": "int", "var": {"kind": "variable", "name": "x"}}]}
            ]
        },
        "components": [
            {"name": "T",
             "declarations": [
                {"head": {"kind": "predicate", "name": "p", "args": [{"kind": "variable", "name": "x"}]},
                 "types": [{"kind": "primitive", "name": "int", "var": {"kind": "variable", "name": "x"}}]}
             ],
             "rules": [
                {"head": [{"kind": "predicate", "name": "p", "args": [{"kind": "variable", "name": "x"}]}],
                 "body": {"kind": "atom", "atom": {"kind": "predicate", "name": "seed", "args": [{"kind": "variable", "name": "x"}]}}}
             ]}
        ],
        "instantiations": [{"id": "a", "template": "T", "loc": [{"file": "main.logic", "line": 3}]}],
        "propagations": [{"from": "a", "atoms": ["p"]}]
    }"#;

    #[test]
    fn document_builds_program() {
        let program = ProgramDocument::from_json(DOC).unwrap().into_program().unwrap();
        assert_eq!(program.global().declarations.len(), 1);
        let t = program.component_named("T").unwrap();
        assert_eq!(t.declarations.len(), 1);
        assert_eq!(t.rules.len(), 1);
        let inst = &program.instantiations()["a"];
        assert_eq!(inst.template, "T");
        assert_eq!(inst.loc.as_ref().unwrap().frames()[0].line, 3);
        assert_eq!(program.propagations()[0].to, None);
    }

    #[test]
    fn document_declarations_are_shape_checked() {
        let doc = r#"{"global": {"declarations": [
            {"head": {"kind": "predicate", "name": "p", "args": [{"kind": "variable", "name": "x"}]},
             "types": [{"kind": "primitive", "name": "int", "var": {"kind": "variable", "name": "y"}}]}
        ]}}"#;
        let err = ProgramDocument::from_json(doc)
            .unwrap()
            .into_program()
            .unwrap_err();
        assert_eq!(err.id, ErrorId::UnknownVar);
    }

    #[test]
    fn document_commands_go_through_directive_checks() {
        let doc = r#"{"commands": [{"name": "C", "rules": [
            {"head": [{"kind": "directive", "name": "lang:cmd:bogus", "backtick": "p"}]}
        ]}]}"#;
        let err = ProgramDocument::from_json(doc)
            .unwrap()
            .into_program()
            .unwrap_err();
        assert_eq!(err.id, ErrorId::CmdDirective);
    }

    #[test]
    fn document_command_working_directory_is_kept() {
        let doc = r#"{"commands": [{"name": "C", "rules": [
            {"head": [{"kind": "directive", "name": "lang:cmd:EVAL", "value": {"type": "string", "value": "run"}}]},
            {"head": [{"kind": "directive", "name": "lang:cmd:DIR", "value": {"type": "string", "value": "work"}}]}
        ]}]}"#;
        let program = ProgramDocument::from_json(doc).unwrap().into_program().unwrap();
        let block = program.component_named("C").unwrap().command().unwrap();
        assert_eq!(block.dir.as_deref(), Some("work"));
    }

    #[test]
    fn duplicate_instance_ids_are_rejected() {
        let doc = r#"{"instantiations": [
            {"id": "a", "template": "T"},
            {"id": "a", "template": "U"}
        ]}"#;
        let err = ProgramDocument::from_json(doc)
            .unwrap()
            .into_program()
            .unwrap_err();
        assert_eq!(err.id, ErrorId::IdInUse);
    }
}
