//! `modlogic.toml`: compile and codegen settings.
//!
//! ```toml
//! [compile]
//! strict = true
//!
//! [codegen]
//! out_dir = "build/logic"
//! prefix = "stage_"
//! ```
//!
//! Command-line flags override the file.

use modlogic_core::CompileOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "modlogic.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub compile: CompileOptions,
    #[serde(default)]
    pub codegen: CodegenSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodegenSection {
    pub out_dir: Option<PathBuf>,
    pub prefix: Option<String>,
}

/// Read the config at `path`, or `modlogic.toml` if present, or defaults.
///
/// Returns a human-readable error string on failure.
pub fn load(path: Option<&Path>) -> Result<Config, String> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    parse(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}
