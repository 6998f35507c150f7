use crate::parser::file_cache::FileCache;
use crate::parser::span::Span;
use crate::symbols::SymbolError;
use ariadne::{ColorGenerator, Label, Report, ReportKind};
use std::io;
use thiserror::Error;

/// Something wrong with the program that
/// was found while generating code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateErrorKind {
    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),

    #[error("`{0}` is not an array and can't be indexed")]
    NotAnArray(String),

    #[error("array `{0}` must be indexed")]
    MissingIndex(String),

    #[error("procedure `{0}` can't call itself")]
    RecursiveCall(String),

    #[error("procedure `{procedure}` takes {expected} arguments, but {found} were given")]
    ArgumentCount {
        procedure: String,
        expected: usize,
        found: usize,
    },

    #[error("argument `{name}` of `{procedure}` must be {expected}")]
    ArgumentKind {
        procedure: String,
        name: String,
        expected: &'static str,
    },
}

/// A generation error and the
/// code that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct GenerateError<'a> {
    pub kind: GenerateErrorKind,
    pub span: Span<'a>,

    /// The innermost command or
    /// condition around the error.
    pub context: Option<Span<'a>>,
}

impl<'a> GenerateError<'a> {
    pub fn new(kind: impl Into<GenerateErrorKind>, span: Span<'a>) -> GenerateError<'a> {
        GenerateError {
            kind: kind.into(),
            span,
            context: None,
        }
    }

    /// Places the error inside of `context`,
    /// unless it already has a closer one.
    pub fn within(mut self, context: &Span<'a>) -> GenerateError<'a> {
        if self.context.is_none() {
            self.context = Some(context.clone());
        }

        self
    }
}

/// Prints every error against
/// the source that caused it.
pub fn report_errors(errors: &[GenerateError], cache: &FileCache) -> io::Result<()> {
    let mut colors = ColorGenerator::new();

    for error in errors {
        let mut report = Report::build(ReportKind::Error, error.span.clone())
            .with_message(error.kind.to_string())
            .with_label(
                Label::new(error.span.clone())
                    .with_message(label_message(&error.kind))
                    .with_color(colors.next()),
            );

        if let Some(context) = error.context.as_ref().filter(|context| **context != error.span) {
            report = report.with_label(
                Label::new(context.clone())
                    .with_message("Part of this")
                    .with_color(colors.next()),
            );
        }

        report.finish().eprint(cache.clone())?;
    }

    Ok(())
}

fn label_message(kind: &GenerateErrorKind) -> &'static str {
    match kind {
        GenerateErrorKind::Symbol(SymbolError::DuplicateDeclaration { .. })
        | GenerateErrorKind::Symbol(SymbolError::DuplicateProcedure { .. }) => "Redeclaration here",
        GenerateErrorKind::Symbol(SymbolError::UndeclaredIdentifier { .. })
        | GenerateErrorKind::Symbol(SymbolError::UndeclaredProcedure { .. }) => "Used here",
        GenerateErrorKind::Symbol(_) => "Declared here",
        GenerateErrorKind::UnknownOperator(_) | GenerateErrorKind::InvalidNumber(_) => {
            "Found here"
        }
        GenerateErrorKind::NotAnArray(_) | GenerateErrorKind::MissingIndex(_) => "Accessed here",
        GenerateErrorKind::RecursiveCall(_)
        | GenerateErrorKind::ArgumentCount { .. }
        | GenerateErrorKind::ArgumentKind { .. } => "Called here",
    }
}
