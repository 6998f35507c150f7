use crate::asm::AsmProgram;
use crate::asm::lower::{TranslateError, translate};
use crate::ast::Program;
use crate::parser::file_cache::FileCache;
use crate::parser::{ParseError, parse_file, parse_source};
use crate::symbols::SymbolTable;
use crate::tac::cfg::ProgramGraph;
use crate::tac::error::GenerateError;
use crate::tac::generate::generate;
use crate::tac::{LabelError, TacProgram, check_labels};
use std::path::Path;
use thiserror::Error;

/// Anything that stops a compilation.
#[derive(Debug, Error)]
pub enum CompileError<'a> {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Every problem found in the program.
    #[error("found {} errors", .0.len())]
    Generate(Vec<GenerateError<'a>>),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

/// Everything produced by compiling a file.
#[derive(Debug, Clone)]
pub struct Compilation<'a> {
    pub tac: TacProgram<'a>,
    pub symbols: SymbolTable<'a>,
    pub asm: AsmProgram,
}

impl<'a> Compilation<'a> {
    /// The basic blocks of every procedure
    /// and of main.
    pub fn graph(&self) -> ProgramGraph<'a> {
        ProgramGraph::build(&self.tac)
    }
}

/// Compiles a file, reading it
/// through the file cache.
pub fn compile_file<'a>(location: &'a Path, cache: &FileCache) -> Result<Compilation<'a>, CompileError<'a>> {
    log::info!("Compiling {}", location.display());

    compile_program(parse_file(location, cache)?)
}

/// Compiles source text that
/// doesn't need to live on disk.
pub fn compile_source<'a>(location: &'a Path, data: &'a str) -> Result<Compilation<'a>, CompileError<'a>> {
    log::info!("Compiling {}", location.display());

    compile_program(parse_source(location, data)?)
}

/// Runs every stage after parsing.
fn compile_program(program: Program<'_>) -> Result<Compilation<'_>, CompileError<'_>> {
    log::debug!("Parsed {} procedures", program.procedures.len());

    let generated = generate(&program).map_err(CompileError::Generate)?;
    check_labels(&generated.program.instructions)?;

    let asm = translate(&generated.program, &generated.symbols)?;

    Ok(Compilation {
        tac: generated.program,
        symbols: generated.symbols,
        asm,
    })
}
