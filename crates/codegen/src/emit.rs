//! Ordered fragment emission.
//!
//! Each fragment is a freshly created file in the output directory. For a
//! command phase the order is EXPORT, COMMAND, IMPORT; the logic feeding
//! the export has already been written by the preceding logic phase.

use crate::render;
use crate::{CodegenError, LogicConfig, Output};
use modlogic_core::{CommandPhase, Compilation, LogicPhase, Phase, Program};
use std::io::Write;
use std::path::PathBuf;

pub(crate) struct Emitter<'a> {
    config: &'a LogicConfig,
    outputs: Vec<Output>,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(config: &'a LogicConfig) -> Self {
        Emitter {
            config,
            outputs: Vec::new(),
        }
    }

    pub(crate) fn emit(mut self, compilation: &Compilation) -> Result<Vec<Output>, CodegenError> {
        for phase in &compilation.phases {
            match phase {
                Phase::Logic(logic) => self.logic(&compilation.program, logic)?,
                Phase::Command(command) => self.command(command)?,
            }
        }
        Ok(self.outputs)
    }

    fn logic(&mut self, program: &Program, phase: &LogicPhase) -> Result<(), CodegenError> {
        let lines: Vec<String> = phase
            .clauses
            .iter()
            .map(|id| render::clause(program.clause(*id)))
            .collect();
        let path = self.write(".logic", &lines)?;
        self.outputs.push(Output::Logic { path });
        Ok(())
    }

    fn command(&mut self, phase: &CommandPhase) -> Result<(), CodegenError> {
        if !phase.exports.is_empty() {
            let mut lines = Vec::new();
            for file in &phase.exports {
                lines.extend(render::file_predicate(file));
                lines.push(render::export_rule(file));
            }
            let path = self.write("-export.logic", &lines)?;
            self.outputs.push(Output::Export { path });
        }

        self.outputs.push(Output::Command {
            command: phase.command.clone(),
            dir: phase.dir.clone(),
        });

        if !phase.imports.is_empty() {
            let mut lines = Vec::new();
            for file in &phase.imports {
                lines.extend(render::file_predicate(file));
                lines.push(render::import_rule(file));
            }
            let path = self.write("-import.logic", &lines)?;
            self.outputs.push(Output::Import { path });
        }
        Ok(())
    }

    fn write(&self, suffix: &str, lines: &[String]) -> Result<PathBuf, CodegenError> {
        let dir = &self.config.out_dir;
        let mut file = tempfile::Builder::new()
            .prefix(&self.config.prefix)
            .suffix(suffix)
            .tempfile_in(dir)
            .map_err(|source| CodegenError::Create {
                dir: dir.clone(),
                source,
            })?;
        for line in lines {
            writeln!(file, "{}", line).map_err(|source| CodegenError::Write {
                path: file.path().to_path_buf(),
                source,
            })?;
        }
        let (_, path) = file.keep().map_err(|e| CodegenError::Persist {
            path: e.file.path().to_path_buf(),
            source: e.error,
        })?;
        tracing::debug!(path = %path.display(), lines = lines.len(), "wrote fragment");
        Ok(path)
    }
}
