//! Error Manager: diagnostic ids with their message templates, fatal
//! errors and collected warnings.

use crate::source::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every diagnostic the compiler can raise. Each id carries a fixed
/// message template with positional `{0}`, `{1}`, ... placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorId {
    CmdConstraint,
    CmdDirective,
    CmdEval,
    CmdDir,
    CmdNoEval,
    CmdRule,
    CmdRefMode,
    CmdNoDecl,
    CmdNoImport,
    CmdExport,
    DepCycle,
    DepGlobal,
    IdInUse,
    NoDecl,
    UnknownVar,
    DeclShape,
    UnknownComp,
    UnknownPred,
    CyclicInheritance,
    AmbiguousPast,
    ColumnArity,
    NoArity,
}

impl ErrorId {
    pub fn template(self) -> &'static str {
        match self {
            ErrorId::CmdConstraint => "Constraints are not supported in a command block",
            ErrorId::CmdDirective => "Invalid directive in command block `{0}`",
            ErrorId::CmdEval => "EVAL property already specified in command block `{0}`",
            ErrorId::CmdDir => "DIR property already specified in command block `{0}`",
            ErrorId::CmdNoEval => "Command block `{0}` has no EVAL property",
            ErrorId::CmdRule => "Normal rules are not supported in a command block",
            ErrorId::CmdRefMode => {
                "Reference-mode declarations are not supported in command block `{0}`"
            }
            ErrorId::CmdNoDecl => "Predicate `{0}` is imported but has no declaration",
            ErrorId::CmdNoImport => "Predicate `{0}` is declared but not imported",
            ErrorId::CmdExport => {
                "Predicate `{0}` is exported by command block `{1}` but nothing propagates it"
            }
            ErrorId::DepCycle => "Cycle detected in the dependency graph of components: {0}",
            ErrorId::DepGlobal => "Reintroducing predicate `{0}` to global space",
            ErrorId::IdInUse => "Id `{0}` already used to initialize a component",
            ErrorId::NoDecl => "Predicate `{0}` used but not declared",
            ErrorId::UnknownVar => "Unknown var `{0}` appears in declaration",
            ErrorId::DeclShape => "Declaration of `{0}` has {1} type atoms for {2} variables",
            ErrorId::UnknownComp => "Unknown component `{0}`",
            ErrorId::UnknownPred => "Unknown predicate `{0}` in propagation from `{1}`",
            ErrorId::CyclicInheritance => "Cyclic inheritance involving component `{0}`",
            ErrorId::AmbiguousPast => {
                "Predicate `{0}` written with `@past` is propagated from several components ({1})"
            }
            ErrorId::ColumnArity => {
                "Predicate `{0}` is declared with {1} column types but has arity {2}"
            }
            ErrorId::NoArity => "Cannot determine the arity of file predicate `{0}`",
        }
    }

    /// Substitute `args` into the message template.
    pub fn format<S: AsRef<str>>(self, args: &[S]) -> String {
        let mut message = self.template().to_string();
        for (i, arg) in args.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", i), arg.as_ref());
        }
        message
    }
}

fn location_suffix(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) if !loc.is_empty() => format!("\n{}", loc),
        _ => String::new(),
    }
}

/// A fatal compilation error. Halts the pipeline at the pass that raised it.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("error: {message}{}", location_suffix(.location))]
pub struct CompileError {
    pub id: ErrorId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl CompileError {
    pub fn new<S: AsRef<str>>(id: ErrorId, args: &[S]) -> Self {
        CompileError {
            id,
            message: id.format(args),
            location: None,
        }
    }

    pub fn at(mut self, location: Option<&SourceLocation>) -> Self {
        self.location = location.cloned();
        self
    }
}

/// A non-fatal diagnostic collected during compilation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub id: ErrorId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "warning: {}{}",
            self.message,
            location_suffix(&self.location)
        )
    }
}
