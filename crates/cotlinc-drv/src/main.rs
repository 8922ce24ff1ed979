//! The `cotlinc` command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cotlinc_drv::{compile, Options};

/// Cotlin compiler - produces standalone Windows x86-64 executables.
#[derive(Parser, Debug)]
#[command(name = "cotlinc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compiles a Cotlin source file to a Windows executable")]
struct Cli {
    /// Source file (UTF-8 or UTF-16LE)
    input: PathBuf,

    /// Output executable (default: input with an .exe extension)
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Usage errors exit 1, the same as every compilation diagnostic.
    // Help and version output still exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return code;
        }
    };

    let options = Options {
        input: cli.input,
        output: cli.output,
    };
    match compile(&options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
