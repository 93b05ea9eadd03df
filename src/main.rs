//! `hsxc` command-line driver: reads one IR file, compiles it, and writes
//! the assembly (and optionally the JSON metadata) back out.

use clap::Parser as ClapParser;
use hsxc::{compile, CompileOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, ClapParser)]
#[command(name = "hsxc", about = "Lower textual IR into HSX assembly", version)]
struct Cli {
    /// Path to the `.ll`-style IR source file.
    input: PathBuf,

    /// Write assembly here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write compilation metadata (JSON) to this path.
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Load base options from a TOML config file; explicit flags below
    /// still override whatever it sets.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit one source-IR comment line per lowered instruction; implicitly
    /// disables the peephole pass.
    #[arg(long)]
    trace: bool,

    #[arg(long)]
    no_peephole: bool,

    #[arg(long)]
    no_coalesce: bool,

    #[arg(long)]
    no_split: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("hsxc=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut options = match &cli.config {
        Some(path) => CompileOptions::from_toml_file(path)?,
        None => CompileOptions::default(),
    };
    if cli.trace {
        options = options.with_trace(true);
    }
    if cli.no_peephole {
        options = options.with_peephole(false);
    }
    if cli.no_coalesce {
        options = options.with_coalesce(false);
    }
    if cli.no_split {
        options = options.with_split(false);
    }

    let source = std::fs::read_to_string(&cli.input).map_err(|e| format!("reading {}: {}", cli.input.display(), e))?;
    let (asm, metadata) = compile(&source, options).map_err(|e| e.to_string())?;

    match &cli.output {
        Some(path) => std::fs::write(path, asm).map_err(|e| format!("writing {}: {}", path.display(), e))?,
        None => print!("{}", asm),
    }

    if let Some(path) = &cli.metadata {
        let json = serde_json::to_string_pretty(&metadata).map_err(|e| format!("serializing metadata: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("writing {}: {}", path.display(), e))?;
    }

    Ok(())
}
