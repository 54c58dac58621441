//! modlogic-codegen: writes the logic fragments of a compiled program.
//!
//! Takes the phases produced by [`modlogic_core::compile`] and turns them
//! into an ordered list of [`Output`] records: LOGIC, EXPORT and IMPORT
//! fragments written to fresh files, and COMMAND records carrying the
//! external invocation string. Commands are never executed here.

pub mod render;

mod emit;

use modlogic_core::Compilation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where and how fragment files are created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicConfig {
    pub out_dir: PathBuf,
    /// File name prefix of every fragment.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "out_".to_string()
}

impl LogicConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        LogicConfig {
            out_dir: out_dir.into(),
            prefix: default_prefix(),
        }
    }
}

/// One emitted fragment, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Output {
    Logic { path: PathBuf },
    Export { path: PathBuf },
    Command {
        command: String,
        /// Working directory the command is meant to run in.
        #[serde(skip_serializing_if = "Option::is_none")]
        dir: Option<String>,
    },
    Import { path: PathBuf },
}

impl Output {
    pub fn kind(&self) -> &'static str {
        match self {
            Output::Logic { .. } => "LOGIC",
            Output::Export { .. } => "EXPORT",
            Output::Command { .. } => "COMMAND",
            Output::Import { .. } => "IMPORT",
        }
    }

    /// The fragment file, for everything but commands.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Output::Logic { path } | Output::Export { path } | Output::Import { path } => Some(path),
            Output::Command { .. } => None,
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Command { command, dir } => {
                write!(f, "{} {}", self.kind(), command)?;
                if let Some(dir) = dir {
                    write!(f, " (in {})", dir)?;
                }
                Ok(())
            }
            Output::Logic { path } | Output::Export { path } | Output::Import { path } => {
                write!(f, "{} {}", self.kind(), path.display())
            }
        }
    }
}

/// Error type for fragment emission.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    #[error("cannot create output directory {}: {source}", dir.display())]
    OutDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot create fragment in {}: {source}", dir.display())]
    Create {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write fragment {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot keep fragment {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Write every phase of `compilation` under `config.out_dir`.
pub fn generate(
    compilation: &Compilation,
    config: &LogicConfig,
) -> Result<Vec<Output>, CodegenError> {
    std::fs::create_dir_all(&config.out_dir).map_err(|source| CodegenError::OutDir {
        dir: config.out_dir.clone(),
        source,
    })?;
    let outputs = emit::Emitter::new(config).emit(compilation)?;
    tracing::debug!(outputs = outputs.len(), "generated fragments");
    Ok(outputs)
}
