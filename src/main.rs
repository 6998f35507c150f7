use crate::asm::encode::{decode, encode};
use crate::asm::machine::{DEFAULT_STEP_LIMIT, Machine};
use crate::asm::{AsmProgram, parse_listing};
use crate::driver::{CompileError, compile_file};
use crate::parser::file_cache::FileCache;
use crate::tac::error::report_errors;
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod asm;
mod ast;
mod driver;
mod parser;
mod symbols;
mod tac;

#[cfg(test)]
mod tests;

/// What to write out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// One machine instruction per line.
    Asm,

    /// The three-address code.
    Tac,

    /// Basic blocks of every procedure.
    Cfg,

    /// The byte encoding of the
    /// machine instructions.
    Binary,
}

/// Compiles imp programs for the
/// accumulator machine.
#[derive(Debug, Parser)]
#[command(name = "impc", version)]
struct Args {
    /// The source file.
    input: PathBuf,

    /// Where to write the output.
    /// Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Emit::Asm)]
    emit: Emit,

    /// Run the program after compiling it.
    #[arg(long)]
    run: bool,

    /// Treat the input as a machine listing
    /// and run it as is.
    #[arg(long, conflicts_with = "emit")]
    listing: bool,

    /// Treat the input as encoded machine
    /// code and run it as is.
    #[arg(long, conflicts_with_all = ["emit", "listing"])]
    binary: bool,

    /// Give up on programs that run
    /// for longer than this.
    #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
    step_limit: u64,

    /// Values for READ, separated by commas.
    /// Read from stdin if not given.
    #[arg(long = "input", value_delimiter = ',', allow_hyphen_values = true)]
    values: Option<Vec<i64>>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let cache = FileCache::default();

    let result = if args.listing {
        run_listing(&args, &cache)
    } else if args.binary {
        run_binary(&args)
    } else {
        compile(&args, &cache)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn compile(args: &Args, cache: &FileCache) -> Result<(), Box<dyn std::error::Error>> {
    let compilation = match compile_file(&args.input, cache) {
        Ok(compilation) => compilation,
        Err(CompileError::Generate(errors)) => {
            report_errors(&errors, cache)?;
            return Err(format!("{} errors found in {}", errors.len(), args.input.display()).into());
        }
        Err(err) => return Err(err.to_string().into()),
    };

    for symbol in compilation.symbols.symbols() {
        log::debug!("{}.{} is at {}", symbol.scope, symbol.name, symbol.address);
    }

    let output = match args.emit {
        Emit::Asm => compilation.asm.to_string().into_bytes(),
        Emit::Tac => compilation.tac.to_string().into_bytes(),
        Emit::Cfg => compilation.graph().to_string().into_bytes(),
        Emit::Binary => encode(&compilation.asm)?,
    };

    match &args.output {
        Some(path) => fs::write(path, output)?,
        None if !args.run => io::stdout().write_all(&output)?,
        None => {}
    }

    if args.run {
        run(args, &compilation.asm)?;
    }

    Ok(())
}

fn run_listing(args: &Args, cache: &FileCache) -> Result<(), Box<dyn std::error::Error>> {
    let program = parse_listing(cache.get(&args.input)?)?;
    log::info!(
        "Loaded {} instructions from {}",
        program.instructions.len(),
        args.input.display()
    );

    run(args, &program)
}

fn run_binary(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let program = load_binary(&args.input)?;
    log::info!(
        "Decoded {} instructions from {}",
        program.instructions.len(),
        args.input.display()
    );

    run(args, &program)
}

/// Reads a program written
/// with `--emit binary`.
fn load_binary(path: &Path) -> Result<AsmProgram, Box<dyn std::error::Error>> {
    Ok(decode(&fs::read(path)?)?)
}

fn run(args: &Args, program: &AsmProgram) -> Result<(), Box<dyn std::error::Error>> {
    let values = match &args.values {
        Some(values) => values.clone(),
        None => read_values()?,
    };

    let execution = Machine::with_step_limit(args.step_limit).run(program, &values)?;
    for value in &execution.output {
        println!("> {value}");
    }
    log::info!("Finished with cost {}", execution.cost);

    Ok(())
}

/// Reads whitespace separated numbers
/// from stdin.
fn read_values() -> Result<Vec<i64>, Box<dyn std::error::Error>> {
    let mut values = Vec::new();

    for line in io::stdin().lock().lines() {
        for word in line?.split_whitespace() {
            values.push(word.parse()?);
        }
    }

    Ok(values)
}
