//! Decoder generator CLI.
//!
//! ```text
//! decodegen fmt    --table x86.table [--check]
//! decodegen check  --table x86.table
//! decodegen gen    --table x86.table [-o decoder.rs] [--runtime-path my_crate]
//! decodegen splice --table x86.table src/decode.rs [--then "cargo test"]
//! ```
//!
//! `DECODEGEN_TABLE` supplies the table path when `--table` is omitted;
//! `RUST_LOG` overrides the `-v` log level.

use clap::{Args, Parser, Subcommand};
use decodegen::driver::{self, Pipeline};
use decodegen::{Anchors, CodegenConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "decodegen",
    version,
    about = "Generate a Rust instruction decoder from an encoding table"
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct TableArgs {
    /// Encoding table.
    #[arg(short, long, env = "DECODEGEN_TABLE")]
    table: PathBuf,
}

#[derive(Args, Debug)]
struct CodegenArgs {
    /// Module path the generated code imports runtime types from.
    #[arg(long, default_value = "crate")]
    runtime_path: String,
}

impl CodegenArgs {
    fn config(&self) -> CodegenConfig {
        CodegenConfig {
            runtime_path: self.runtime_path.clone(),
            ..CodegenConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rewrite the table in canonical layout.
    Fmt {
        #[command(flatten)]
        table: TableArgs,

        /// Exit with status 1 if the table is not canonical; write nothing.
        #[arg(long)]
        check: bool,
    },

    /// Parse, validate and partition the table without writing anything.
    Check {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Emit a standalone decoder module.
    Gen {
        #[command(flatten)]
        table: TableArgs,

        #[command(flatten)]
        codegen: CodegenArgs,

        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Splice enumerators and decoder body into a source file.
    Splice {
        #[command(flatten)]
        table: TableArgs,

        /// File containing the anchors.
        target: PathBuf,

        /// Leave the table file untouched.
        #[arg(long)]
        no_format: bool,

        /// Shell command to run after writing, e.g. "cargo test".
        #[arg(long)]
        then: Option<String>,

        #[arg(long, default_value = "pub enum InstrKind {")]
        enum_open: String,

        #[arg(long, default_value = "}")]
        enum_close: String,

        #[arg(long, default_value = "// @codegen")]
        begin: String,

        #[arg(long, default_value = "// @end")]
        end: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(command: Commands) -> decodegen::Result<ExitCode> {
    match command {
        Commands::Fmt { table, check } => {
            let changed = driver::format_file(&table.table, check)?;
            if check && changed {
                eprintln!("{} is not canonically formatted", table.table.display());
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Check { table } => {
            let stats = driver::check_file(&table.table, &CodegenConfig::default())?;
            println!("{stats}");
        }
        Commands::Gen {
            table,
            codegen,
            output,
        } => {
            let module = driver::generate_file(&table.table, output.as_deref(), &codegen.config())?;
            if output.is_none() {
                print!("{module}");
            }
        }
        Commands::Splice {
            table,
            target,
            no_format,
            then,
            enum_open,
            enum_close,
            begin,
            end,
        } => {
            let pipeline = Pipeline {
                anchors: Anchors {
                    enum_open,
                    enum_close,
                    codegen_begin: begin,
                    codegen_end: end,
                },
                format_table: !no_format,
                then,
                ..Pipeline::new(table.table, target)
            };
            let report = pipeline.run()?;
            log::info!(
                "table {}, target {}",
                if report.table_changed { "reformatted" } else { "unchanged" },
                if report.target_changed { "updated" } else { "unchanged" }
            );
            log::info!("{}", report.stats);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
