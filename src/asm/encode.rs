use crate::asm::{AsmProgram, Instruction, Mnemonic};
use thiserror::Error;

/// Operands are always 8 bytes,
/// big endian.
const OPERAND_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),

    #[error("`{0}` is not a valid operand")]
    InvalidOperand(String),

    #[error("missing operand for {0}")]
    MissingOperand(Mnemonic),

    #[error("{mnemonic} takes {} operands, but {found} were given", mnemonic.operand_count())]
    TooManyOperands { mnemonic: Mnemonic, found: usize },

    #[error("opcode {opcode} at byte {offset} is undefined")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("operand of {mnemonic} at byte {offset} is cut short")]
    Truncated { mnemonic: Mnemonic, offset: usize },
}

/// Encodes a program as one opcode byte per
/// instruction, each followed by its operand
/// if it takes one.
pub fn encode(program: &AsmProgram) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(program.instructions.len() * (1 + OPERAND_SIZE));

    for instruction in &program.instructions {
        encode_instruction(instruction, &mut bytes)?;
    }

    Ok(bytes)
}

fn encode_instruction(instruction: &Instruction, bytes: &mut Vec<u8>) -> Result<(), EncodeError> {
    let mnemonic = instruction.mnemonic;

    match (mnemonic.operand_count(), instruction.operand) {
        (0, None) => bytes.push(mnemonic.opcode()),
        (1, Some(operand)) => {
            bytes.push(mnemonic.opcode());
            bytes.extend_from_slice(&operand.to_be_bytes());
        }
        (_, None) => return Err(EncodeError::MissingOperand(mnemonic)),
        (_, Some(_)) => {
            return Err(EncodeError::TooManyOperands {
                mnemonic,
                found: 1,
            });
        }
    }

    Ok(())
}

/// Decodes bytes produced by `encode`.
/// Unknown opcodes and cut-off operands
/// are errors.
pub fn decode(bytes: &[u8]) -> Result<AsmProgram, EncodeError> {
    let mut instructions = Vec::new();
    let mut offset = 0;

    while let Some(&opcode) = bytes.get(offset) {
        let mnemonic =
            Mnemonic::from_opcode(opcode).ok_or(EncodeError::UnknownOpcode { opcode, offset })?;

        let operand = if mnemonic.operand_count() == 1 {
            let data = bytes
                .get(offset + 1..offset + 1 + OPERAND_SIZE)
                .ok_or(EncodeError::Truncated { mnemonic, offset })?;

            let mut operand = [0; OPERAND_SIZE];
            operand.copy_from_slice(data);

            Some(i64::from_be_bytes(operand))
        } else {
            None
        };

        offset += 1 + operand.map_or(0, |_| OPERAND_SIZE);
        instructions.push(Instruction { mnemonic, operand });
    }

    Ok(AsmProgram { instructions })
}
