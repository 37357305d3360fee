//! mpu - assembler driver, test runner, and single-step monitor for the MPU
//! toolchain.
//!
//! Parses arguments, initializes logging, and dispatches to the appropriate
//! command handler. Grounded on `faxt`'s `main.rs` for the overall shape
//! (global args with `env` fallbacks, `tracing_subscriber` init, a
//! `thiserror`-backed error type at the binary boundary).

mod assemble;
mod commands;
mod error;
mod formatter;
mod listing;
mod monitor;
mod reporter;
mod source;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use error::Result;

/// mpu - assembler, linker, interpreter, and test runner for the MPU toy
/// 16-bit virtual computer.
#[derive(Parser, Debug)]
#[command(name = "mpu")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Assembler, interpreter, and test runner for the MPU toolchain", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true, env = "MPU_VERBOSE")]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "MPU_NO_COLOR")]
    no_color: bool,

    /// Directory to search for included assets (`include "..."` targets)
    #[arg(long, global = true, hide = true, env = "MPU_ASSET_PATH")]
    asset_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble and link one or more source files into a binary image
    Build {
        /// Source files to assemble
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output path (default: input with a `.bin` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print a source/byte listing alongside the binary
        #[arg(short, long)]
        listing: bool,
    },

    /// Assemble and run a program
    Run {
        /// Source file to run
        input: PathBuf,

        /// Run under the interactive single-step TUI monitor
        #[arg(short, long)]
        monitor: bool,
    },

    /// Print a source file's canonical formatting
    Fmt {
        /// Source file to format
        input: PathBuf,
    },

    /// Run every `test Name():` block in one or more source files
    Test {
        /// Source files to test
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print failure detail even for runtime errors without a message
        #[arg(short, long)]
        verbose: bool,

        /// Force colored output even when not a TTY
        #[arg(long)]
        color: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.no_color);

    let asset_path = cli.asset_path.as_ref();
    match cli.command {
        Commands::Build { inputs, output, listing } => commands::build::run(&inputs, &output, listing, asset_path)?,
        Commands::Run { input, monitor } => commands::run::run(&input, monitor, asset_path)?,
        Commands::Fmt { input } => commands::fmt::run(&input)?,
        Commands::Test { inputs, verbose, color } => {
            let failed = commands::test::run(&inputs, verbose, color || !cli.no_color, asset_path)?;
            if failed > 0 {
                return Err(error::CliError::TestsFailed(failed));
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, no_color: bool) {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };
    let subscriber = fmt::layer().with_ansi(!no_color).with_target(false);

    let _ = tracing_subscriber::registry().with(filter).with(subscriber).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_at_least_one_input() {
        let result = Cli::try_parse_from(["mpu", "build"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_parses_with_monitor_flag() {
        let cli = Cli::parse_from(["mpu", "run", "--monitor", "prog.mpu"]);
        match cli.command {
            Commands::Run { input, monitor } => {
                assert_eq!(input, PathBuf::from("prog.mpu"));
                assert!(monitor);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_accepts_multiple_inputs() {
        let cli = Cli::parse_from(["mpu", "test", "a.mpu", "b.mpu"]);
        match cli.command {
            Commands::Test { inputs, .. } => assert_eq!(inputs.len(), 2),
            other => panic!("expected Test, got {other:?}"),
        }
    }

    #[test]
    fn global_verbose_flag_is_accepted_before_the_subcommand() {
        let cli = Cli::parse_from(["mpu", "--verbose", "fmt", "prog.mpu"]);
        assert!(cli.verbose);
    }
}
