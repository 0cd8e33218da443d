//! minic CLI
//!
//! The front half of the pipeline (lexer, parser, semantic analysis) runs
//! elsewhere and hands the syntax tree over as JSON; this driver binds a
//! symbol table, lowers the tree, and prints the ILOC program.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use minic::ast::Program;
use minic::error::CompileError;
use minic::iloc::RegAlloc;
use minic::lower::Lower;
use minic::sema::SymbolTable;

#[derive(Parser)]
#[command(name = "minic", version, about = "minic compiler back end - ILOC code generation")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lower a syntax tree to ILOC and print the program
    Lower {
        /// Syntax tree file (JSON, as emitted by the parser stage)
        file: PathBuf,
    },
    /// Validate a syntax tree file and pretty-print it (debug)
    Ast {
        /// Syntax tree file (JSON, as emitted by the parser stage)
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Lower { file } => lower_file(&file),
        Command::Ast { file } => dump_tree(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: u8) {
    use fern::colors::{Color, ColoredLevelConfig};

    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Blue)
        .debug(Color::Magenta)
        .trace(Color::Green);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("{}: {message}", colors.color(record.level())))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .expect("logger is initialized once");
}

fn read_tree(path: &Path) -> Result<Program, CompileError> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| CompileError::io_error(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&source).map_err(|e| CompileError::ast_error(e.to_string()))
}

fn lower_file(path: &Path) -> Result<(), CompileError> {
    let mut program = read_tree(path)?;

    // Register 0 is reserved as the data-segment base all symbol slots
    // hang off; lowering continues numbering from there.
    let mut regs = RegAlloc::new();
    let data_base = regs.next_id();
    let mut symbols = SymbolTable::new(data_base);
    symbols.bind_program(&program);

    let mut cx = Lower::with_registers(regs, &symbols);
    program.lower(&mut cx)?;

    print!("{}", program.code);
    Ok(())
}

fn dump_tree(path: &Path) -> Result<(), CompileError> {
    let program = read_tree(path)?;
    let text =
        serde_json::to_string_pretty(&program).map_err(|e| CompileError::ast_error(e.to_string()))?;
    println!("{text}");
    Ok(())
}
