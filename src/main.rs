//! heft CLI: rank the symbols of a binary by transitive size weight.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use heft::analysis::vtable::scan_vtables;
use heft::core::object::TraceConfig;
use heft::core::program::Program;
use heft::demangle::{Demangler, LibraryDemangler, ToolDemangler};
use heft::formats::elf;
use heft::io::BinaryData;
use heft::{logging, report};

/// Explain where the bytes in a linked executable went.
#[derive(Parser)]
#[command(name = "heft", version)]
#[command(about = "Rank the symbols of a binary by transitive size weight", long_about = None)]
struct Cli {
    /// The executable to analyze
    binary: PathBuf,

    /// Symbol to trace through ingestion, edge addition, vtable scanning,
    /// and reachability
    watch_symbol: Option<String>,

    /// Emit per-edge diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Demangle through an external filter (e.g. c++filt) instead of the
    /// built-in demanglers
    #[arg(long, value_name = "CMD")]
    demangler: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let trace = TraceConfig {
        watch_symbol: cli.watch_symbol,
        verbose: cli.verbose,
    };
    let demangler: Box<dyn Demangler> = match &cli.demangler {
        Some(cmd) => Box::new(ToolDemangler::spawn(cmd)?),
        None => Box::new(LibraryDemangler),
    };
    let mut program = Program::new(demangler, trace);

    let binary = BinaryData::open(&cli.binary)
        .with_context(|| format!("cannot read {}", cli.binary.display()))?;
    let word_size = elf::word_size(binary.bytes())?;

    elf::read_symbols(binary.bytes(), &mut program)?;
    elf::read_disassembly_refs(&cli.binary, &mut program)?;
    elf::read_file_mappings(binary.bytes(), &mut program)?;
    scan_vtables(&mut program, &binary, word_size)?;

    if !program.has_files() {
        warn!("no debug information present");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    report::print_garbage(&program)?;
    report::print_symbols_by_transitive_weight(&mut program, &mut out)?;
    report::print_symbols(&program, &mut out)?;
    report::print_files(&program, &mut out)?;
    Ok(())
}
