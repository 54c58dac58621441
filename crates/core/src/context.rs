//! Compilation context threaded through every pass.

use crate::error::{CompileError, Diagnostic, ErrorId};
use crate::source::SourceLocation;
use serde::{Deserialize, Serialize};

/// Options that change how the pipeline reacts to diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Treat predicates used without a reachable declaration as errors
    /// instead of warnings.
    pub strict: bool,
}

/// Per-compilation state: options plus the warnings raised so far.
#[derive(Debug, Default)]
pub struct CompileContext {
    options: CompileOptions,
    warnings: Vec<Diagnostic>,
}

impl CompileContext {
    pub fn new(options: CompileOptions) -> Self {
        CompileContext {
            options,
            warnings: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn warn<S: AsRef<str>>(
        &mut self,
        id: ErrorId,
        args: &[S],
        location: Option<&SourceLocation>,
    ) {
        let diagnostic = Diagnostic {
            id,
            message: id.format(args),
            location: location.cloned(),
        };
        tracing::warn!(id = ?id, "{}", diagnostic.message);
        self.warnings.push(diagnostic);
    }

    /// Raise a diagnostic whose severity depends on strict mode.
    pub fn report<S: AsRef<str>>(
        &mut self,
        id: ErrorId,
        args: &[S],
        location: Option<&SourceLocation>,
    ) -> Result<(), CompileError> {
        if self.options.strict {
            return Err(CompileError::new(id, args).at(location));
        }
        self.warn(id, args, location);
        Ok(())
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Diagnostic> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_report_records_warning() {
        let mut ctx = CompileContext::default();
        ctx.report(ErrorId::NoDecl, &["p"], None).unwrap();
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(ctx.warnings()[0].id, ErrorId::NoDecl);
    }

    #[test]
    fn strict_report_fails() {
        let mut ctx = CompileContext::new(CompileOptions { strict: true });
        let err = ctx.report(ErrorId::NoDecl, &["p"], None).unwrap_err();
        assert_eq!(err.id, ErrorId::NoDecl);
        assert!(ctx.warnings().is_empty());
    }
}
