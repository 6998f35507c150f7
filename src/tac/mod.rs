pub mod cfg;
mod display;
pub mod error;
pub mod generate;

use crate::symbols::ScopeId;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;

/// A whole program in three-address form.
/// Starts with a jump to main, followed by
/// every procedure and then main itself.
#[derive(Debug, Clone, Default)]
pub struct TacProgram<'a> {
    pub instructions: Vec<TacInstruction<'a>>,
}

/// A single three-address instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TacInstruction<'a> {
    /// Marks the next instruction as
    /// a jump target.
    Label(Label<'a>),

    /// `dest = src`
    Assign { dest: Place<'a>, src: Operand<'a> },

    /// `dest = left OP right`
    Arith {
        op: ArithOp,
        dest: Place<'a>,
        left: Operand<'a>,
        right: Operand<'a>,
    },

    /// Unconditional jump.
    Goto(Label<'a>),

    /// Jumps to the target if the
    /// comparison holds, falling through
    /// otherwise.
    IfGoto {
        cmp: CmpOp,
        left: Operand<'a>,
        right: Operand<'a>,
        target: Label<'a>,
    },

    /// Passes a reference to the named
    /// storage to the next call.
    Param(Name<'a>),

    /// Calls a procedure with the last
    /// `args` parameters.
    Call { procedure: &'a str, args: usize },

    /// Returns from the current procedure.
    Return,

    /// Stops the program.
    Halt,

    /// Reads a number from input.
    Read(Place<'a>),

    /// Writes a number to output.
    Write(Operand<'a>),
}

impl<'a> TacInstruction<'a> {
    /// The label this instruction
    /// can jump to, if any.
    pub fn jump_target(&self) -> Option<&Label<'a>> {
        match self {
            TacInstruction::Goto(target) | TacInstruction::IfGoto { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Does this instruction end a
    /// basic block?
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            TacInstruction::Goto(_)
                | TacInstruction::IfGoto { .. }
                | TacInstruction::Return
                | TacInstruction::Halt
        )
    }
}

/// A jump target.
/// Block labels are numbered across the
/// whole program. Procedure and main
/// entries are tagged so they never need to
/// be told apart by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label<'a> {
    Block(u32),
    Procedure(&'a str),
    Main,
}

/// A variable, qualified by the scope
/// that declared it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name<'a> {
    pub scope: ScopeId<'a>,
    pub ident: Cow<'a, str>,
}

impl<'a> Name<'a> {
    pub fn new(scope: ScopeId<'a>, ident: impl Into<Cow<'a, str>>) -> Name<'a> {
        Name {
            scope,
            ident: ident.into(),
        }
    }
}

/// Something that can be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place<'a> {
    Var(Name<'a>),
    Indexed { array: Name<'a>, index: Index<'a> },
}

/// Something that can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand<'a> {
    Num(i64),
    Place(Place<'a>),
}

/// An array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index<'a> {
    Num(i64),
    Var(Name<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn from_symbol(symbol: &str) -> Option<ArithOp> {
        Some(match symbol {
            "+" => ArithOp::Add,
            "-" => ArithOp::Sub,
            "*" => ArithOp::Mul,
            "/" => ArithOp::Div,
            "%" => ArithOp::Mod,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn from_symbol(symbol: &str) -> Option<CmpOp> {
        Some(match symbol {
            "=" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => return None,
        })
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// The operator that holds exactly
    /// when this one doesn't.
    pub fn inverse(&self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Lt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Le => CmpOp::Gt,
        }
    }

    #[cfg(test)]
    pub fn evaluate(&self, left: i64, right: i64) -> bool {
        match self {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
            CmpOp::Lt => left < right,
            CmpOp::Le => left <= right,
            CmpOp::Gt => left > right,
            CmpOp::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("label `{0}` is referenced but never defined")]
    Undefined(String),

    #[error("label `{0}` is defined more than once")]
    Duplicate(String),
}

/// Checks that every label a jump refers
/// to is defined exactly once.
pub fn check_labels(instructions: &[TacInstruction]) -> Result<(), LabelError> {
    let mut defined = HashSet::new();

    for instruction in instructions {
        if let TacInstruction::Label(label) = instruction {
            if !defined.insert(*label) {
                return Err(LabelError::Duplicate(label.to_string()));
            }
        }
    }

    for target in instructions.iter().filter_map(|i| i.jump_target()) {
        if !defined.contains(target) {
            return Err(LabelError::Undefined(target.to_string()));
        }
    }

    Ok(())
}
