use crate::asm::{AsmProgram, Instruction, Mnemonic};
use std::fmt::{Display, Formatter};

impl Display for AsmProgram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for instruction in &self.instructions {
            write!(f, "{instruction}\n")?;
        }

        Ok(())
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.operand {
            Some(operand) => write!(f, "{} {operand}", self.mnemonic),
            None => write!(f, "{}", self.mnemonic),
        }
    }
}

impl Display for Mnemonic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
