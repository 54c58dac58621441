mod config;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use modlogic_codegen::{generate, LogicConfig};
use modlogic_core::{compile, Compilation, CompileError, CompileOptions, Phase, ProgramDocument};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Modular logic program compiler.
#[derive(Parser)]
#[command(name = "modlogic", version, about = "Modular logic program compiler")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    format: OutputFormat,

    /// Log pass boundaries and emitted fragments
    #[arg(long, global = true)]
    verbose: bool,

    /// Config file (default: ./modlogic.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program document into logic fragments
    Compile {
        /// Path to the program document (JSON)
        file: PathBuf,
        /// Directory the fragments are written to
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Treat undeclared predicates as errors
        #[arg(long)]
        strict: bool,
    },

    /// Print dependency layers and phases without writing fragments
    Schedule {
        /// Path to the program document (JSON)
        file: PathBuf,
        /// Treat undeclared predicates as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.format);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Compile {
            file,
            out_dir,
            strict,
        } => {
            let options = CompileOptions {
                strict: strict || config.compile.strict,
            };
            let logic = LogicConfig {
                out_dir: out_dir
                    .or(config.codegen.out_dir)
                    .unwrap_or_else(|| PathBuf::from(".")),
                prefix: config
                    .codegen
                    .prefix
                    .unwrap_or_else(|| LogicConfig::new(".").prefix),
            };
            cmd_compile(&file, options, &logic, cli.format);
        }
        Commands::Schedule { file, strict } => {
            let options = CompileOptions {
                strict: strict || config.compile.strict,
            };
            cmd_schedule(&file, options, cli.format);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

/// Read, assemble and compile a program document, exiting on failure.
fn load_and_compile(file: &Path, options: CompileOptions, output: OutputFormat) -> Compilation {
    let text = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            report_error(
                &format!("error reading file '{}': {}", file.display(), e),
                output,
            );
            process::exit(1);
        }
    };
    let document = match ProgramDocument::from_json(&text) {
        Ok(d) => d,
        Err(e) => {
            report_error(
                &format!("invalid program document '{}': {}", file.display(), e),
                output,
            );
            process::exit(1);
        }
    };
    match document
        .into_program()
        .and_then(|program| compile(&program, options))
    {
        Ok(compilation) => compilation,
        Err(e) => {
            report_compile_error(&e, output);
            process::exit(1);
        }
    }
}

fn cmd_compile(file: &Path, options: CompileOptions, logic: &LogicConfig, output: OutputFormat) {
    let compilation = load_and_compile(file, options, output);
    let outputs = match generate(&compilation, logic) {
        Ok(o) => o,
        Err(e) => {
            report_error(&format!("error: {}", e), output);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Text => {
            for out in &outputs {
                println!("{}", out);
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "outputs": outputs,
                "warnings": compilation.warnings,
            });
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
    }
}

fn cmd_schedule(file: &Path, options: CompileOptions, output: OutputFormat) {
    let compilation = load_and_compile(file, options, output);

    match output {
        OutputFormat::Text => {
            for (i, layer) in compilation.layers.iter().enumerate() {
                let nodes: Vec<String> = layer.iter().map(|n| n.to_string()).collect();
                println!("layer {}: {}", i, nodes.join(", "));
            }
            for (i, phase) in compilation.phases.iter().enumerate() {
                println!("phase {}: {}", i, describe_phase(phase));
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "layers": compilation.layers,
                "phases": compilation.phases,
                "warnings": compilation.warnings,
            });
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
    }
}

fn describe_phase(phase: &Phase) -> String {
    match phase {
        Phase::Logic(logic) => format!("LOGIC ({} clauses)", logic.clauses.len()),
        Phase::Command(cmd) => format!(
            "COMMAND {} `{}`{} (exports {}, imports {})",
            cmd.instance,
            cmd.command,
            cmd.dir
                .as_ref()
                .map(|dir| format!(" in {}", dir))
                .unwrap_or_default(),
            names(cmd.exports.iter().map(|f| f.name.as_str())),
            names(cmd.imports.iter().map(|f| f.name.as_str())),
        ),
    }
}

fn names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let list: Vec<&str> = names.collect();
    if list.is_empty() {
        "none".to_string()
    } else {
        list.join(", ")
    }
}

fn report_compile_error(e: &CompileError, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{}", e),
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(e).unwrap_or_else(|_| format!("{:?}", e));
            eprintln!("{}", err_json);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
