pub mod file_cache;
pub mod span;

use crate::ast::{
    ArgDecl, CallArg, Command, Condition, Declaration, Identifier, Index, Main, MathExpression,
    NumberLiteral, Operator, Procedure, Program, Value,
};
use crate::parser::file_cache::FileCache;
use crate::parser::span::Span;
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "parser/program.pest"]
struct ImpParser;

/// Failure to turn source text into
/// an AST.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read source file: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Syntax(Box<pest::error::Error<Rule>>),
}

/// Parses a file into an AST,
/// reading it through the file cache.
pub fn parse_file<'a>(location: &'a Path, cache: &FileCache) -> Result<Program<'a>, ParseError> {
    let data = cache.get(location)?;

    parse_source(location, data)
}

/// Parses source text into an AST.
/// The path is only used for spans
/// and error messages.
pub fn parse_source<'a>(location: &'a Path, data: &'a str) -> Result<Program<'a>, ParseError> {
    let mut ast = ImpParser::parse(Rule::program, data).map_err(|err| {
        ParseError::Syntax(Box::new(
            err.with_path(&location.display().to_string()),
        ))
    })?;

    let program = ast.next().unwrap();
    assert_eq!(program.as_rule(), Rule::program);

    let mut procedures = Vec::new();
    let mut main = None;

    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::procedure => procedures.push(parse_procedure(location, pair)),
            Rule::main => main = Some(parse_main(location, pair)),
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }

    Ok(Program {
        procedures,
        // The grammar requires exactly one main block.
        main: main.unwrap(),
    })
}

fn parse_procedure<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Procedure<'a> {
    assert_eq!(value.as_rule(), Rule::procedure);

    let span = Span::from_pest(location, value.as_span());
    let mut data = value.into_inner();

    let mut head = data.next().unwrap().into_inner();
    let name = head.next().unwrap().as_str();
    let args = head
        .next()
        .map(|args| {
            args.into_inner()
                .map(|arg| parse_arg_decl(location, arg))
                .collect()
        })
        .unwrap_or_default();

    let (declarations, commands) = parse_body(location, data);

    Procedure {
        name,
        args,
        declarations,
        commands,
        span,
    }
}

fn parse_arg_decl<'a>(location: &'a Path, value: Pair<'a, Rule>) -> ArgDecl<'a> {
    assert_eq!(value.as_rule(), Rule::argDecl);

    let span = Span::from_pest(location, value.as_span());
    let mut is_array = false;
    let mut name = "";

    for pair in value.into_inner() {
        match pair.as_rule() {
            Rule::arrayMarker => is_array = true,
            Rule::pidentifier => name = pair.as_str(),
            _ => unreachable!(),
        }
    }

    ArgDecl {
        name,
        is_array,
        span,
    }
}

fn parse_main<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Main<'a> {
    assert_eq!(value.as_rule(), Rule::main);

    let (declarations, commands) = parse_body(location, value.into_inner());

    Main {
        declarations,
        commands,
    }
}

/// Parses the optional declarations
/// and the commands that make up the
/// rest of a procedure or main block.
fn parse_body<'a>(
    location: &'a Path,
    data: impl Iterator<Item = Pair<'a, Rule>>,
) -> (Vec<Declaration<'a>>, Vec<Command<'a>>) {
    let mut declarations = Vec::new();
    let mut commands = Vec::new();

    for pair in data {
        match pair.as_rule() {
            Rule::declarations => {
                declarations = pair
                    .into_inner()
                    .map(|decl| parse_declaration(location, decl))
                    .collect();
            }
            Rule::commands => commands = parse_commands(location, pair),
            _ => unreachable!(),
        }
    }

    (declarations, commands)
}

fn parse_declaration<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Declaration<'a> {
    assert_eq!(value.as_rule(), Rule::declaration);

    let span = Span::from_pest(location, value.as_span());
    let mut data = value.into_inner();

    let name = data.next().unwrap().as_str();

    match (data.next(), data.next()) {
        (Some(from), Some(to)) => Declaration::Array {
            name,
            from: parse_number(location, from),
            to: parse_number(location, to),
            span,
        },
        _ => Declaration::Scalar { name, span },
    }
}

fn parse_commands<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Vec<Command<'a>> {
    assert_eq!(value.as_rule(), Rule::commands);

    value
        .into_inner()
        .map(|command| parse_command(location, command))
        .collect()
}

fn parse_command<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Command<'a> {
    let span = Span::from_pest(location, value.as_span());
    let rule = value.as_rule();
    let mut data = value.into_inner();

    match rule {
        Rule::assign => Command::Assign {
            target: parse_identifier(location, data.next().unwrap()),
            value: parse_expression(location, data.next().unwrap()),
            span,
        },
        Rule::ifCommand => {
            let condition = parse_condition(location, data.next().unwrap());
            let then_commands = parse_commands(location, data.next().unwrap());
            let else_commands = data
                .next()
                .map(|branch| {
                    assert_eq!(branch.as_rule(), Rule::elseBranch);
                    parse_commands(location, branch.into_inner().next().unwrap())
                })
                .unwrap_or_default();

            Command::If {
                condition,
                then_commands,
                else_commands,
                span,
            }
        }
        Rule::whileCommand => Command::While {
            condition: parse_condition(location, data.next().unwrap()),
            commands: parse_commands(location, data.next().unwrap()),
            span,
        },
        Rule::repeatCommand => Command::Repeat {
            commands: parse_commands(location, data.next().unwrap()),
            condition: parse_condition(location, data.next().unwrap()),
            span,
        },
        Rule::forCommand => {
            let iterator = data.next().unwrap().as_str();
            let from = parse_value(location, data.next().unwrap());
            let downto = data.next().unwrap().as_str() == "DOWNTO";
            let to = parse_value(location, data.next().unwrap());
            let commands = parse_commands(location, data.next().unwrap());

            Command::For {
                iterator,
                from,
                to,
                downto,
                commands,
                span,
            }
        }
        Rule::procCall => {
            let name = data.next().unwrap().as_str();
            let args = data
                .next()
                .map(|args| {
                    args.into_inner()
                        .map(|arg| CallArg {
                            name: arg.as_str(),
                            span: Span::from_pest(location, arg.as_span()),
                        })
                        .collect()
                })
                .unwrap_or_default();

            Command::ProcCall { name, args, span }
        }
        Rule::readCommand => Command::Read {
            target: parse_identifier(location, data.next().unwrap()),
            span,
        },
        Rule::writeCommand => Command::Write {
            value: parse_value(location, data.next().unwrap()),
            span,
        },
        _ => unreachable!(),
    }
}

fn parse_expression<'a>(location: &'a Path, value: Pair<'a, Rule>) -> MathExpression<'a> {
    assert_eq!(value.as_rule(), Rule::expression);

    let span = Span::from_pest(location, value.as_span());
    let mut data = value.into_inner();

    let left = parse_value(location, data.next().unwrap());
    let right = data.next().map(|op| {
        (
            parse_operator(location, op),
            parse_value(location, data.next().unwrap()),
        )
    });

    MathExpression { left, right, span }
}

fn parse_condition<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Condition<'a> {
    assert_eq!(value.as_rule(), Rule::condition);

    let span = Span::from_pest(location, value.as_span());
    let mut data = value.into_inner();

    Condition {
        left: parse_value(location, data.next().unwrap()),
        operator: parse_operator(location, data.next().unwrap()),
        right: parse_value(location, data.next().unwrap()),
        span,
    }
}

fn parse_operator<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Operator<'a> {
    assert!(matches!(value.as_rule(), Rule::mathOp | Rule::compareOp));

    Operator {
        text: value.as_str(),
        span: Span::from_pest(location, value.as_span()),
    }
}

fn parse_value<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Value<'a> {
    match value.as_rule() {
        Rule::num => Value::Number(parse_number(location, value)),
        Rule::identifier => Value::Identifier(parse_identifier(location, value)),
        _ => unreachable!(),
    }
}

fn parse_identifier<'a>(location: &'a Path, value: Pair<'a, Rule>) -> Identifier<'a> {
    assert_eq!(value.as_rule(), Rule::identifier);

    let span = Span::from_pest(location, value.as_span());
    let mut data = value.into_inner();

    let name = data.next().unwrap().as_str();
    let index = data.next().map(|index| match index.as_rule() {
        Rule::num => Index::Number(parse_number(location, index)),
        Rule::pidentifier => {
            Index::Variable(index.as_str(), Span::from_pest(location, index.as_span()))
        }
        _ => unreachable!(),
    });

    Identifier { name, index, span }
}

fn parse_number<'a>(location: &'a Path, value: Pair<'a, Rule>) -> NumberLiteral<'a> {
    assert_eq!(value.as_rule(), Rule::num);

    NumberLiteral {
        text: value.as_str(),
        span: Span::from_pest(location, value.as_span()),
    }
}
