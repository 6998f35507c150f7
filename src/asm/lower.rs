use crate::asm::{AsmProgram, Instruction, Mnemonic};
use crate::symbols::{ScopeId, Symbol, SymbolKind, SymbolTable};
use crate::tac::{
    ArithOp, CmpOp, Index, Label, Name, Operand, Place, TacInstruction, TacProgram,
};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Something that makes a program
/// impossible to lower.
/// All of these stop translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("no storage is known for `{0}`")]
    UnresolvedSymbol(String),

    #[error("`{0}` can't be accessed this way")]
    InvalidAccess(String),

    #[error("jump to undefined label `{0}`")]
    UndefinedLabel(String),

    #[error("label `{0}` is defined more than once")]
    DuplicateLabel(String),

    #[error("`{0}` is not a procedure")]
    UnknownProcedure(String),

    #[error("call to `{procedure}` passes {found} parameters, but it takes {expected}")]
    ParameterMismatch {
        procedure: String,
        expected: usize,
        found: usize,
    },

    #[error("return outside of a procedure")]
    ReturnOutsideProcedure,
}

/// Lowers three-address code into
/// machine instructions.
///
/// The program is walked twice. The first
/// pass only measures, recording where every
/// label lands. The second emits, turning
/// every jump into an offset from itself.
pub fn translate<'a>(
    program: &TacProgram<'a>,
    symbols: &SymbolTable<'a>,
) -> Result<AsmProgram, TranslateError> {
    let mut translator = Translator::new(symbols);

    log::debug!("Measuring {} instructions", program.instructions.len());
    translator.run(&program.instructions)?;

    translator.start_emitting();

    log::debug!("Resolved {} labels", translator.positions.len());
    translator.run(&program.instructions)?;

    log::debug!(
        "Lowered into {} instructions, scratch ends at {}",
        translator.output.len(),
        translator.next_scratch
    );

    Ok(AsmProgram {
        instructions: translator.output,
    })
}

/// A jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target<'a> {
    /// A label from the program.
    Tac(Label<'a>),

    /// A label inside of an idiom.
    Local(u32),
}

impl<'a> Display for Target<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tac(label) => write!(f, "{label}"),
            Target::Local(id) => write!(f, ".local{id}"),
        }
    }
}

/// Where a value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// In the given cell.
    Direct(i64),

    /// In the cell whose address
    /// is in the given cell.
    Indirect(i64),

    /// Nowhere. It's a constant.
    Immediate(i64),
}

struct Translator<'t, 'a> {
    symbols: &'t SymbolTable<'a>,

    /// Label -> position.
    /// Filled in by the first pass.
    positions: HashMap<Target<'a>, i64>,

    /// Is this the second pass?
    emitting: bool,

    output: Vec<Instruction>,

    /// The position of the next instruction.
    position: i64,

    /// The next free scratch cell.
    /// Scratch lives above every symbol.
    next_scratch: i64,

    local_counter: u32,

    /// The procedure being lowered,
    /// if not in main.
    procedure: Option<&'a str>,

    /// Parameters waiting for a call.
    params: Vec<Name<'a>>,
}

impl<'t, 'a> Translator<'t, 'a> {
    fn new(symbols: &'t SymbolTable<'a>) -> Translator<'t, 'a> {
        Translator {
            symbols,
            positions: HashMap::new(),
            emitting: false,
            output: Vec::new(),
            position: 0,
            next_scratch: symbols.next_address(),
            local_counter: 0,
            procedure: None,
            params: Vec::new(),
        }
    }

    /// Resets everything but the label
    /// positions for the second pass.
    fn start_emitting(&mut self) {
        self.emitting = true;
        self.position = 0;
        self.next_scratch = self.symbols.next_address();
        self.local_counter = 0;
        self.procedure = None;
        self.params.clear();
    }

    fn run(&mut self, instructions: &[TacInstruction<'a>]) -> Result<(), TranslateError> {
        for instruction in instructions {
            if self.emitting {
                log::trace!("Lowering {instruction} at {}", self.position);
            }

            self.lower(instruction)?;
        }

        Ok(())
    }

    fn lower(&mut self, instruction: &TacInstruction<'a>) -> Result<(), TranslateError> {
        match instruction {
            TacInstruction::Label(label) => {
                match label {
                    Label::Procedure(name) => self.procedure = Some(*name),
                    Label::Main => self.procedure = None,
                    Label::Block(_) => {}
                }

                self.define(Target::Tac(*label))?;
            }
            TacInstruction::Assign { dest, src } => {
                let src = self.operand(src)?;
                let dest = self.place(dest)?;

                self.load(src);
                self.store(dest)?;
            }
            TacInstruction::Arith {
                op,
                dest,
                left,
                right,
            } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                let dest = self.place(dest)?;

                match op {
                    ArithOp::Add | ArithOp::Sub => {
                        let right = self.materialize(right);

                        self.load(left);
                        self.combine(*op == ArithOp::Add, right)?;
                        self.store(dest)?;
                    }
                    ArithOp::Mul => self.multiply(left, right, dest)?,
                    ArithOp::Div => self.divide(left, right, dest, false)?,
                    ArithOp::Mod => self.divide(left, right, dest, true)?,
                }
            }
            TacInstruction::Goto(label) => self.jump(Mnemonic::Jump, Target::Tac(*label))?,
            TacInstruction::IfGoto {
                cmp,
                left,
                right,
                target,
            } => {
                let left = self.operand(left)?;
                let right = self.operand(right)?;
                let right = self.materialize(right);

                self.load(left);
                self.combine(false, right)?;
                self.branch(*cmp, Target::Tac(*target))?;
            }
            TacInstruction::Param(name) => self.params.push(name.clone()),
            TacInstruction::Call { procedure, args } => self.call(*procedure, *args)?,
            TacInstruction::Return => {
                let procedure = self
                    .procedure
                    .ok_or(TranslateError::ReturnOutsideProcedure)?;
                let cell = self.return_cell(procedure)?;

                self.push(Mnemonic::Rtrn, cell);
            }
            TacInstruction::Halt => self.push_bare(Mnemonic::Halt),
            TacInstruction::Read(place) => match self.place(place)? {
                Access::Direct(address) => self.push(Mnemonic::Get, address),
                Access::Indirect(pointer) => {
                    let scratch = self.scratch();

                    self.push(Mnemonic::Get, scratch);
                    self.push(Mnemonic::Load, scratch);
                    self.push(Mnemonic::StoreI, pointer);
                }
                Access::Immediate(_) => {
                    return Err(TranslateError::InvalidAccess(place.to_string()));
                }
            },
            TacInstruction::Write(value) => match self.operand(value)? {
                Access::Direct(address) => self.push(Mnemonic::Put, address),
                access => {
                    let scratch = self.scratch();

                    self.load(access);
                    self.push(Mnemonic::Store, scratch);
                    self.push(Mnemonic::Put, scratch);
                }
            },
        }

        Ok(())
    }

    /// Emits the jumps for `acc OP 0`, where the
    /// accumulator holds `left - right`.
    fn branch(&mut self, cmp: CmpOp, target: Target<'a>) -> Result<(), TranslateError> {
        match cmp {
            CmpOp::Eq => self.jump(Mnemonic::JZero, target)?,
            CmpOp::Lt => self.jump(Mnemonic::JNeg, target)?,
            CmpOp::Gt => self.jump(Mnemonic::JPos, target)?,
            CmpOp::Le => {
                self.jump(Mnemonic::JNeg, target)?;
                self.jump(Mnemonic::JZero, target)?;
            }
            CmpOp::Ge => {
                self.jump(Mnemonic::JPos, target)?;
                self.jump(Mnemonic::JZero, target)?;
            }
            CmpOp::Ne => {
                let skip = self.local_label();

                self.jump(Mnemonic::JZero, skip)?;
                self.jump(Mnemonic::Jump, target)?;
                self.define(skip)?;
            }
        }

        Ok(())
    }

    /// Stores a reference for every pending
    /// parameter into the callee's argument
    /// cells, then the return position, then
    /// jumps to the callee.
    fn call(&mut self, procedure: &'a str, args: usize) -> Result<(), TranslateError> {
        let info = self
            .symbols
            .procedure(procedure)
            .map_err(|_| TranslateError::UnknownProcedure(procedure.to_string()))?;

        if self.params.len() != args || info.args.len() != args {
            return Err(TranslateError::ParameterMismatch {
                procedure: procedure.to_string(),
                expected: info.args.len(),
                found: self.params.len(),
            });
        }

        let params = std::mem::take(&mut self.params);
        for (actual, (formal, _)) in params.iter().zip(&info.args) {
            let formal = self
                .symbols
                .lookup(ScopeId::Procedure(procedure), formal)
                .map_err(|_| TranslateError::UnresolvedSymbol(format!("{procedure}.{formal}")))?
                .address;
            let actual = self.symbol(actual)?;

            match actual.kind {
                // Already a reference, pass it along.
                SymbolKind::Argument { .. } => self.push(Mnemonic::Load, actual.address),
                SymbolKind::Array(_) => self.push(Mnemonic::Set, actual.zero_point()),
                _ => self.push(Mnemonic::Set, actual.address),
            }
            self.push(Mnemonic::Store, formal);
        }

        // SET, STORE, JUMP, then back here.
        let return_position = self.position + 3;
        self.push(Mnemonic::Set, return_position);
        self.push(Mnemonic::Store, info.return_cell);
        self.jump(Mnemonic::Jump, Target::Tac(Label::Procedure(procedure)))?;

        Ok(())
    }

    fn return_cell(&self, procedure: &str) -> Result<i64, TranslateError> {
        self.symbols
            .procedure(procedure)
            .map(|info| info.return_cell)
            .map_err(|_| TranslateError::UnknownProcedure(procedure.to_string()))
    }

    /// `dest = left * right`, by shift and add.
    /// The multiplier is halved with an arithmetic
    /// shift until it is 0, or -1 for a negative
    /// one, whose top bit counts as `-a`.
    fn multiply(&mut self, left: Access, right: Access, dest: Access) -> Result<(), TranslateError> {
        let a = self.scratch();
        let b = self.scratch();
        let result = self.scratch();
        let half = self.scratch();
        let twice_half = self.scratch();

        let next_bit = self.local_label();
        let even = self.local_label();
        let last = self.local_label();
        let done = self.local_label();

        self.load(left);
        self.push(Mnemonic::Store, a);
        self.load(right);
        self.push(Mnemonic::Store, b);
        self.push(Mnemonic::Set, 0);
        self.push(Mnemonic::Store, result);

        self.define(next_bit)?;
        self.push(Mnemonic::Load, b);
        self.jump(Mnemonic::JZero, done)?;
        self.push_bare(Mnemonic::Half);
        self.push(Mnemonic::Store, half);
        self.push(Mnemonic::Load, b);
        self.push(Mnemonic::Sub, half);
        self.jump(Mnemonic::JZero, last)?;
        self.push(Mnemonic::Load, half);
        self.push(Mnemonic::Add, half);
        self.push(Mnemonic::Store, twice_half);
        self.push(Mnemonic::Load, b);
        self.push(Mnemonic::Sub, twice_half);
        self.jump(Mnemonic::JZero, even)?;
        self.push(Mnemonic::Load, result);
        self.push(Mnemonic::Add, a);
        self.push(Mnemonic::Store, result);

        self.define(even)?;
        self.push(Mnemonic::Load, a);
        self.push(Mnemonic::Add, a);
        self.push(Mnemonic::Store, a);
        self.push(Mnemonic::Load, half);
        self.push(Mnemonic::Store, b);
        self.jump(Mnemonic::Jump, next_bit)?;

        // b == -1
        self.define(last)?;
        self.push(Mnemonic::Load, result);
        self.push(Mnemonic::Sub, a);
        self.push(Mnemonic::Store, result);

        self.define(done)?;
        self.push(Mnemonic::Load, result);
        self.store(dest)
    }

    /// `dest = left / right` or `dest = left % right`
    /// with floor semantics: the remainder takes
    /// the sign of the divisor. Anything divided
    /// by 0 is 0, and so is its remainder.
    ///
    /// Divides by long division first, then fixes
    /// up the signs. Magnitudes are kept negated
    /// so that `i64::MIN` fits and the divisor
    /// never doubles past the dividend.
    fn divide(
        &mut self,
        left: Access,
        right: Access,
        dest: Access,
        remainder: bool,
    ) -> Result<(), TranslateError> {
        let a = self.scratch();
        let b = self.scratch();
        let quotient = self.scratch();
        let rest = self.scratch();
        let divisor = self.scratch();
        let power = self.scratch();
        let gap = self.scratch();
        let half = self.scratch();

        let a_negative = self.local_label();
        let b_negative = self.local_label();
        let grow = self.local_label();
        let shrink = self.local_label();
        let next = self.local_label();
        let fix_signs = self.local_label();
        let done = self.local_label();

        self.push(Mnemonic::Set, 0);
        self.push(Mnemonic::Store, quotient);
        self.push(Mnemonic::Store, rest);
        self.load(right);
        self.push(Mnemonic::Store, b);
        self.jump(Mnemonic::JZero, done)?;
        self.load(left);
        self.push(Mnemonic::Store, a);
        self.jump(Mnemonic::JZero, done)?;

        // rest = -|a|
        self.jump(Mnemonic::JNeg, a_negative)?;
        self.push(Mnemonic::Set, 0);
        self.push(Mnemonic::Sub, a);
        self.define(a_negative)?;
        self.push(Mnemonic::Store, rest);

        // divisor = -|b|
        self.push(Mnemonic::Load, b);
        self.jump(Mnemonic::JNeg, b_negative)?;
        self.push(Mnemonic::Set, 0);
        self.push(Mnemonic::Sub, b);
        self.define(b_negative)?;
        self.push(Mnemonic::Store, divisor);
        self.push(Mnemonic::Set, -1);
        self.push(Mnemonic::Store, power);

        // Double the divisor while twice
        // of it still fits into the rest.
        self.define(grow)?;
        self.push(Mnemonic::Load, rest);
        self.push(Mnemonic::Sub, divisor);
        self.jump(Mnemonic::JPos, shrink)?;
        self.push(Mnemonic::Store, gap);
        self.push(Mnemonic::Load, divisor);
        self.push(Mnemonic::Sub, gap);
        self.jump(Mnemonic::JNeg, shrink)?;
        self.push(Mnemonic::Load, divisor);
        self.push(Mnemonic::Add, divisor);
        self.push(Mnemonic::Store, divisor);
        self.push(Mnemonic::Load, power);
        self.push(Mnemonic::Add, power);
        self.push(Mnemonic::Store, power);
        self.jump(Mnemonic::Jump, grow)?;

        // Then halve it, subtracting wherever it fits.
        self.define(shrink)?;
        self.push(Mnemonic::Load, rest);
        self.push(Mnemonic::Sub, divisor);
        self.jump(Mnemonic::JPos, next)?;
        self.push(Mnemonic::Store, rest);
        self.push(Mnemonic::Load, quotient);
        self.push(Mnemonic::Add, power);
        self.push(Mnemonic::Store, quotient);

        // HALF keeps -1 at -1, which
        // is where the powers run out.
        self.define(next)?;
        self.push(Mnemonic::Load, power);
        self.push_bare(Mnemonic::Half);
        self.push(Mnemonic::Store, half);
        self.push(Mnemonic::Load, power);
        self.push(Mnemonic::Sub, half);
        self.jump(Mnemonic::JZero, fix_signs)?;
        self.push(Mnemonic::Load, half);
        self.push(Mnemonic::Store, power);
        self.push(Mnemonic::Load, divisor);
        self.push_bare(Mnemonic::Half);
        self.push(Mnemonic::Store, divisor);
        self.jump(Mnemonic::Jump, shrink)?;

        self.define(fix_signs)?;
        if remainder {
            self.fix_remainder(a, b, rest, done)?;
        } else {
            self.fix_quotient(a, b, quotient, rest, done)?;
        }

        self.define(done)?;
        self.push(Mnemonic::Load, if remainder { rest } else { quotient });
        self.store(dest)
    }

    /// Turns `-(|a| / |b|)` into `floor(a / b)`.
    /// With the same signs that's the negation,
    /// otherwise one less when something was left
    /// over.
    fn fix_quotient(
        &mut self,
        a: i64,
        b: i64,
        quotient: i64,
        rest: i64,
        done: Target<'a>,
    ) -> Result<(), TranslateError> {
        let a_negative = self.local_label();
        let same = self.local_label();
        let opposite = self.local_label();

        self.push(Mnemonic::Load, a);
        self.jump(Mnemonic::JNeg, a_negative)?;
        self.push(Mnemonic::Load, b);
        self.jump(Mnemonic::JNeg, opposite)?;
        self.jump(Mnemonic::Jump, same)?;

        self.define(a_negative)?;
        self.push(Mnemonic::Load, b);
        self.jump(Mnemonic::JPos, opposite)?;

        self.define(same)?;
        self.negate_into(quotient);
        self.jump(Mnemonic::Jump, done)?;

        self.define(opposite)?;
        self.push(Mnemonic::Load, rest);
        self.jump(Mnemonic::JZero, done)?;
        self.push(Mnemonic::Set, -1);
        self.push(Mnemonic::Add, quotient);
        self.push(Mnemonic::Store, quotient);

        Ok(())
    }

    /// Turns `-(|a| % |b|)` into a remainder
    /// with the sign of `b`.
    fn fix_remainder(
        &mut self,
        a: i64,
        b: i64,
        rest: i64,
        done: Target<'a>,
    ) -> Result<(), TranslateError> {
        let a_negative = self.local_label();
        let b_negative = self.local_label();

        // a > 0, b > 0: -rest
        self.push(Mnemonic::Load, a);
        self.jump(Mnemonic::JNeg, a_negative)?;
        self.push(Mnemonic::Load, b);
        self.jump(Mnemonic::JNeg, b_negative)?;
        self.negate_into(rest);
        self.jump(Mnemonic::Jump, done)?;

        // a > 0, b < 0: b - rest
        self.define(b_negative)?;
        self.push(Mnemonic::Load, rest);
        self.jump(Mnemonic::JZero, done)?;
        self.push(Mnemonic::Load, b);
        self.push(Mnemonic::Sub, rest);
        self.push(Mnemonic::Store, rest);
        self.jump(Mnemonic::Jump, done)?;

        // a < 0, b > 0: rest + b
        // a < 0, b < 0: rest
        self.define(a_negative)?;
        self.push(Mnemonic::Load, b);
        self.jump(Mnemonic::JNeg, done)?;
        self.push(Mnemonic::Load, rest);
        self.jump(Mnemonic::JZero, done)?;
        self.push(Mnemonic::Add, b);
        self.push(Mnemonic::Store, rest);

        Ok(())
    }

    /// `cell = -cell`
    fn negate_into(&mut self, cell: i64) {
        self.push(Mnemonic::Set, 0);
        self.push(Mnemonic::Sub, cell);
        self.push(Mnemonic::Store, cell);
    }

    fn operand(&mut self, operand: &Operand<'a>) -> Result<Access, TranslateError> {
        match operand {
            Operand::Num(value) => Ok(Access::Immediate(*value)),
            Operand::Place(place) => self.place(place),
        }
    }

    /// Resolves where a place lives. Indexing
    /// by a variable or through an argument
    /// computes a pointer into a scratch cell,
    /// which clobbers the accumulator.
    fn place(&mut self, place: &Place<'a>) -> Result<Access, TranslateError> {
        match place {
            Place::Var(name) => {
                let symbol = self.symbol(name)?;

                match symbol.kind {
                    SymbolKind::Argument { array: false } => Ok(Access::Indirect(symbol.address)),
                    SymbolKind::Argument { array: true } | SymbolKind::Array(_) => {
                        Err(TranslateError::InvalidAccess(name.to_string()))
                    }
                    _ => Ok(Access::Direct(symbol.address)),
                }
            }
            Place::Indexed { array, index } => {
                let symbol = self.symbol(array)?;
                let (kind, address, zero_point) =
                    (symbol.kind, symbol.address, symbol.zero_point());

                let base = match (kind, index) {
                    (SymbolKind::Array(_), Index::Num(i)) => {
                        return Ok(Access::Direct(zero_point + i));
                    }
                    (SymbolKind::Array(_), Index::Var(_)) => Access::Immediate(zero_point),
                    (SymbolKind::Argument { array: true }, _) => Access::Direct(address),
                    _ => return Err(TranslateError::InvalidAccess(place.to_string())),
                };
                let offset = match index {
                    Index::Num(i) => Access::Immediate(*i),
                    Index::Var(name) => self.place(&Place::Var(name.clone()))?,
                };

                // A literal offset is loaded and the
                // reference added to it.
                let (first, second) = match offset {
                    Access::Immediate(_) => (offset, base),
                    _ => (base, offset),
                };

                let pointer = self.scratch();
                self.load(first);
                self.combine(true, second)?;
                self.push(Mnemonic::Store, pointer);

                Ok(Access::Indirect(pointer))
            }
        }
    }

    fn symbol(&self, name: &Name<'a>) -> Result<&'t Symbol<'a>, TranslateError> {
        self.symbols
            .lookup(name.scope, &name.ident)
            .map_err(|_| TranslateError::UnresolvedSymbol(name.to_string()))
    }

    /// Puts a constant into a fresh scratch cell
    /// so it can be used as an operand.
    fn materialize(&mut self, access: Access) -> Access {
        match access {
            Access::Immediate(value) => {
                let scratch = self.scratch();

                self.push(Mnemonic::Set, value);
                self.push(Mnemonic::Store, scratch);

                Access::Direct(scratch)
            }
            access => access,
        }
    }

    fn load(&mut self, access: Access) {
        match access {
            Access::Direct(address) => self.push(Mnemonic::Load, address),
            Access::Indirect(pointer) => self.push(Mnemonic::LoadI, pointer),
            Access::Immediate(value) => self.push(Mnemonic::Set, value),
        }
    }

    fn store(&mut self, access: Access) -> Result<(), TranslateError> {
        match access {
            Access::Direct(address) => self.push(Mnemonic::Store, address),
            Access::Indirect(pointer) => self.push(Mnemonic::StoreI, pointer),
            Access::Immediate(value) => {
                return Err(TranslateError::InvalidAccess(value.to_string()));
            }
        }

        Ok(())
    }

    /// Adds or subtracts a value in memory.
    /// Constants need to be materialized first.
    fn combine(&mut self, add: bool, access: Access) -> Result<(), TranslateError> {
        let (direct, indirect) = if add {
            (Mnemonic::Add, Mnemonic::AddI)
        } else {
            (Mnemonic::Sub, Mnemonic::SubI)
        };

        match access {
            Access::Direct(address) => self.push(direct, address),
            Access::Indirect(pointer) => self.push(indirect, pointer),
            Access::Immediate(value) => {
                return Err(TranslateError::InvalidAccess(value.to_string()));
            }
        }

        Ok(())
    }

    fn scratch(&mut self) -> i64 {
        let cell = self.next_scratch;
        self.next_scratch += 1;

        cell
    }

    fn local_label(&mut self) -> Target<'a> {
        self.local_counter += 1;
        Target::Local(self.local_counter)
    }

    /// Records a label at the current position.
    fn define(&mut self, target: Target<'a>) -> Result<(), TranslateError> {
        if self.emitting {
            debug_assert_eq!(self.positions.get(&target), Some(&self.position));
            return Ok(());
        }

        log::trace!("{target} is at {}", self.position);

        if self.positions.insert(target, self.position).is_some() {
            return Err(TranslateError::DuplicateLabel(target.to_string()));
        }

        Ok(())
    }

    fn jump(&mut self, mnemonic: Mnemonic, target: Target<'a>) -> Result<(), TranslateError> {
        let offset = if self.emitting {
            let position = self
                .positions
                .get(&target)
                .ok_or_else(|| TranslateError::UndefinedLabel(target.to_string()))?;

            position - self.position
        } else {
            0
        };

        self.push(mnemonic, offset);

        Ok(())
    }

    fn push(&mut self, mnemonic: Mnemonic, operand: i64) {
        self.emit(Instruction {
            mnemonic,
            operand: Some(operand),
        });
    }

    fn push_bare(&mut self, mnemonic: Mnemonic) {
        self.emit(Instruction {
            mnemonic,
            operand: None,
        });
    }

    fn emit(&mut self, instruction: Instruction) {
        if self.emitting {
            self.output.push(instruction);
        }

        self.position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::machine::Machine;
    use crate::parser::parse_source;
    use crate::tac::generate::generate;
    use std::path::Path;

    fn compile(source: &str) -> AsmProgram {
        let program = parse_source(Path::new("test.imp"), source).unwrap();
        let generated = generate(&program).unwrap();

        translate(&generated.program, &generated.symbols).unwrap()
    }

    fn run(source: &str, input: &[i64]) -> Vec<i64> {
        Machine::default()
            .run(&compile(source), input)
            .unwrap()
            .output
    }

    #[test]
    fn lowers_literal_assignment() {
        let program = compile("PROGRAM IS x BEGIN x := 5; END");

        assert_eq!(program.to_string(), "JUMP 1\nSET 5\nSTORE 1\nHALT\n");
    }

    #[test]
    fn jumps_are_relative() {
        let program = compile("PROGRAM IS x BEGIN REPEAT x := x + 1; UNTIL x = 3; END");

        for (position, instruction) in program.instructions.iter().enumerate() {
            if instruction.mnemonic.is_jump() {
                let target = position as i64 + instruction.arg();
                assert!((0..program.instructions.len() as i64).contains(&target));
            }
        }
    }

    #[test]
    fn comparisons_and_inverses_disagree() {
        let ops = ["=", "!=", "<", "<=", ">", ">="];

        for op in ops {
            let cmp = CmpOp::from_symbol(op).unwrap();
            let inverse = cmp.inverse().symbol();

            let source = format!(
                "PROGRAM IS a, b BEGIN
                    READ a; READ b;
                    IF a {op} b THEN WRITE 1; ELSE WRITE 0; ENDIF
                    IF a {inverse} b THEN WRITE 1; ELSE WRITE 0; ENDIF
                END"
            );
            let program = compile(&source);

            for a in -2..=2 {
                for b in [-1, 0, 1] {
                    let output = Machine::default().run(&program, &[a, b]).unwrap().output;
                    let expected = cmp.evaluate(a, b) as i64;

                    assert_eq!(output, vec![expected, 1 - expected], "{a} {op} {b}");
                }
            }
        }
    }

    #[test]
    fn multiplies_any_signs() {
        let cases: [(i64, i64); 10] = [
            (6, 7),
            (-6, 7),
            (6, -7),
            (-6, -7),
            (0, 5),
            (5, 0),
            (1, -1),
            (3037000499, 3037000499),
            (i64::MAX, -1),
            (-1, i64::MIN),
        ];

        for (a, b) in cases {
            let source = format!("PROGRAM IS x BEGIN x := {a} * {b}; WRITE x; END");
            assert_eq!(run(&source, &[]), vec![a.wrapping_mul(b)], "{a} * {b}");
        }
    }

    #[test]
    fn divides_with_floor_semantics() {
        let cases: [(i64, i64); 18] = [
            (10, 3),
            (-10, 3),
            (10, -3),
            (-10, -3),
            (9, -2),
            (10, -2),
            (548, -2901),
            (0, 4),
            (7, 7),
            (4611686018427387905, 1),
            (-4611686018427387905, 1),
            (i64::MAX, 7),
            (-i64::MAX, 7),
            (i64::MAX, -7),
            (i64::MIN, 3),
            (i64::MIN, 1),
            (i64::MAX, i64::MIN),
            (0, i64::MIN),
        ];

        for (a, b) in cases {
            let source = format!(
                "PROGRAM IS q, r BEGIN q := {a} / {b}; r := {a} % {b}; WRITE q; WRITE r; END"
            );
            let floor = a.div_euclid(b) - (b < 0 && a.rem_euclid(b) != 0) as i64;
            let output = run(&source, &[]);

            assert_eq!(output[0], floor, "{a} / {b}");
            assert_eq!(output[1], a.wrapping_sub(b.wrapping_mul(output[0])), "{a} % {b}");
            assert!(output[1] == 0 || (output[1] < 0) == (b < 0), "{a} % {b}");
        }

        assert_eq!(
            run("PROGRAM IS x BEGIN x := 7 / 0; WRITE x; x := 7 % 0; WRITE x; END", &[]),
            vec![0, 0]
        );
    }

    #[test]
    fn constants_are_never_combined_directly() {
        let symbols = SymbolTable::new();
        let mut translator = Translator::new(&symbols);

        assert_eq!(
            translator.combine(true, Access::Immediate(3)),
            Err(TranslateError::InvalidAccess("3".to_string()))
        );
    }

    #[test]
    fn reports_unresolved_symbols() {
        let program = TacProgram {
            instructions: vec![
                TacInstruction::Write(Operand::Place(Place::Var(Name::new(
                    ScopeId::Main,
                    "ghost",
                )))),
                TacInstruction::Halt,
            ],
        };

        assert_eq!(
            translate(&program, &SymbolTable::new()),
            Err(TranslateError::UnresolvedSymbol("ghost".to_string()))
        );
    }

    #[test]
    fn reports_undefined_labels() {
        let program = TacProgram {
            instructions: vec![TacInstruction::Goto(Label::Block(7)), TacInstruction::Halt],
        };

        assert_eq!(
            translate(&program, &SymbolTable::new()),
            Err(TranslateError::UndefinedLabel("L7".to_string()))
        );
    }

    #[test]
    fn scratch_never_aliases_symbols() {
        let source = "PROGRAM IS x, t[0:2] BEGIN x := 2; t[x] := x * 3; WRITE t[x]; END";
        let program = compile(source);

        // x is 1, t is 2..=4 and only reached through pointers.
        for instruction in &program.instructions {
            if instruction.mnemonic == Mnemonic::Store {
                assert!(!(2..=4).contains(&instruction.arg()), "{instruction}");
            }
        }
        assert_eq!(run(source, &[]), vec![6]);
    }
}
