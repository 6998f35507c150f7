mod display;
pub mod encode;
pub mod lower;
pub mod machine;

use crate::asm::encode::EncodeError;
use std::str::FromStr;
use thiserror::Error;

/// A compiled program, ready to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsmProgram {
    pub instructions: Vec<Instruction>,
}

/// An operation of the machine.
/// Cell 0 of memory is the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    /// Reads a number into `p[x]`.
    Get,

    /// Writes `p[x]`.
    Put,

    /// `acc = p[x]`
    Load,

    /// `p[x] = acc`
    Store,

    /// `acc = p[p[x]]`
    LoadI,

    /// `p[p[x]] = acc`
    StoreI,

    /// `acc += p[x]`
    Add,

    /// `acc -= p[x]`
    Sub,

    /// `acc += p[p[x]]`
    AddI,

    /// `acc -= p[p[x]]`
    SubI,

    /// `acc = x`
    Set,

    /// `acc = floor(acc / 2)`
    Half,

    /// Relative jump.
    Jump,

    /// Relative jump if `acc > 0`.
    JPos,

    /// Relative jump if `acc == 0`.
    JZero,

    /// Relative jump if `acc < 0`.
    JNeg,

    /// Jumps to the position in `p[x]`.
    Rtrn,

    Halt,
}

impl Mnemonic {
    /// Every mnemonic, ordered by opcode.
    pub const ALL: [Mnemonic; 18] = [
        Mnemonic::Get,
        Mnemonic::Put,
        Mnemonic::Load,
        Mnemonic::Store,
        Mnemonic::LoadI,
        Mnemonic::StoreI,
        Mnemonic::Add,
        Mnemonic::Sub,
        Mnemonic::AddI,
        Mnemonic::SubI,
        Mnemonic::Set,
        Mnemonic::Half,
        Mnemonic::Jump,
        Mnemonic::JPos,
        Mnemonic::JZero,
        Mnemonic::JNeg,
        Mnemonic::Rtrn,
        Mnemonic::Halt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Mnemonic::Get => "GET",
            Mnemonic::Put => "PUT",
            Mnemonic::Load => "LOAD",
            Mnemonic::Store => "STORE",
            Mnemonic::LoadI => "LOADI",
            Mnemonic::StoreI => "STOREI",
            Mnemonic::Add => "ADD",
            Mnemonic::Sub => "SUB",
            Mnemonic::AddI => "ADDI",
            Mnemonic::SubI => "SUBI",
            Mnemonic::Set => "SET",
            Mnemonic::Half => "HALF",
            Mnemonic::Jump => "JUMP",
            Mnemonic::JPos => "JPOS",
            Mnemonic::JZero => "JZERO",
            Mnemonic::JNeg => "JNEG",
            Mnemonic::Rtrn => "RTRN",
            Mnemonic::Halt => "HALT",
        }
    }

    /// The byte that encodes this mnemonic.
    pub fn opcode(&self) -> u8 {
        *self as u8
    }

    pub fn from_opcode(opcode: u8) -> Option<Mnemonic> {
        Self::ALL.get(opcode as usize).copied()
    }

    pub fn operand_count(&self) -> usize {
        match self {
            Mnemonic::Half | Mnemonic::Halt => 0,
            _ => 1,
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Mnemonic::Jump | Mnemonic::JPos | Mnemonic::JZero | Mnemonic::JNeg
        )
    }

    /// What the machine charges for
    /// running this instruction.
    pub fn cost(&self) -> u64 {
        match self {
            Mnemonic::Get | Mnemonic::Put => 100,
            Mnemonic::Load | Mnemonic::Store | Mnemonic::Add | Mnemonic::Sub | Mnemonic::Rtrn => {
                10
            }
            Mnemonic::LoadI | Mnemonic::StoreI | Mnemonic::AddI => 20,
            Mnemonic::SubI => 12,
            Mnemonic::Set => 50,
            Mnemonic::Half => 5,
            Mnemonic::Jump | Mnemonic::JPos | Mnemonic::JZero | Mnemonic::JNeg => 1,
            Mnemonic::Halt => 0,
        }
    }
}

impl FromStr for Mnemonic {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mnemonic| mnemonic.name() == s)
            .ok_or_else(|| EncodeError::UnknownMnemonic(s.to_string()))
    }
}

/// A single machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operand: Option<i64>,
}

impl Instruction {
    /// Builds an instruction, checking the
    /// operands against the mnemonic.
    pub fn new(mnemonic: Mnemonic, operands: &[i64]) -> Result<Instruction, EncodeError> {
        match (mnemonic.operand_count(), operands) {
            (0, []) => Ok(Instruction {
                mnemonic,
                operand: None,
            }),
            (1, [operand]) => Ok(Instruction {
                mnemonic,
                operand: Some(*operand),
            }),
            (1, []) => Err(EncodeError::MissingOperand(mnemonic)),
            _ => Err(EncodeError::TooManyOperands {
                mnemonic,
                found: operands.len(),
            }),
        }
    }

    /// The operand, or 0 for
    /// instructions without one.
    pub fn arg(&self) -> i64 {
        self.operand.unwrap_or(0)
    }
}

/// An error in a line of a text listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ListingError {
    pub line: usize,
    pub kind: EncodeError,
}

/// Parses a text listing, one instruction per
/// line. Anything after `#` is a comment.
pub fn parse_listing(text: &str) -> Result<AsmProgram, ListingError> {
    let mut instructions = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let error = |kind| ListingError {
            line: index + 1,
            kind,
        };

        let code = line.split('#').next().unwrap_or_default();
        let mut words = code.split_whitespace();

        let Some(mnemonic) = words.next() else {
            continue;
        };
        let mnemonic = mnemonic.parse::<Mnemonic>().map_err(error)?;

        let operands = words
            .map(|word| {
                word.parse::<i64>()
                    .map_err(|_| error(EncodeError::InvalidOperand(word.to_string())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        instructions.push(Instruction::new(mnemonic, &operands).map_err(error)?);
    }

    Ok(AsmProgram { instructions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_follow_the_table() {
        for (opcode, mnemonic) in Mnemonic::ALL.iter().enumerate() {
            assert_eq!(mnemonic.opcode() as usize, opcode);
            assert_eq!(Mnemonic::from_opcode(opcode as u8), Some(*mnemonic));
            assert_eq!(mnemonic.name().parse::<Mnemonic>(), Ok(*mnemonic));
        }
        assert_eq!(Mnemonic::from_opcode(18), None);
    }

    #[test]
    fn checks_operand_counts() {
        assert!(Instruction::new(Mnemonic::Load, &[3]).is_ok());
        assert!(Instruction::new(Mnemonic::Halt, &[]).is_ok());
        assert_eq!(
            Instruction::new(Mnemonic::Load, &[]),
            Err(EncodeError::MissingOperand(Mnemonic::Load))
        );
        assert_eq!(
            Instruction::new(Mnemonic::Half, &[1]),
            Err(EncodeError::TooManyOperands {
                mnemonic: Mnemonic::Half,
                found: 1
            })
        );
        assert!(Instruction::new(Mnemonic::Set, &[1, 2]).is_err());
    }

    #[test]
    fn parses_listings() {
        let program = parse_listing("SET -4 # negative\n\nPUT 0\nHALT\n").unwrap();

        assert_eq!(
            program.instructions,
            vec![
                Instruction::new(Mnemonic::Set, &[-4]).unwrap(),
                Instruction::new(Mnemonic::Put, &[0]).unwrap(),
                Instruction::new(Mnemonic::Halt, &[]).unwrap(),
            ]
        );

        let err = parse_listing("HALT\nJUMPS 1\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.kind, EncodeError::UnknownMnemonic("JUMPS".to_string()));
    }
}
