use crate::asm::{AsmProgram, Mnemonic};
use std::collections::HashMap;
use thiserror::Error;

/// Stops runaway programs.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("there is no instruction at {0}")]
    ProgramCounterOutOfRange(i64),

    #[error("instruction {position} uses negative address {address}")]
    NegativeAddress { position: i64, address: i64 },

    #[error("instruction {position} reads past the end of the input")]
    InputExhausted { position: i64 },

    #[error("gave up after {0} steps")]
    StepLimit(u64),
}

/// The result of running a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Every value written, in order.
    pub output: Vec<i64>,

    /// The total cost of the run.
    pub cost: u64,
}

/// Runs programs the way the target
/// machine does. Memory is sparse, starts
/// zeroed, and cell 0 is the accumulator.
#[derive(Debug, Clone)]
pub struct Machine {
    memory: HashMap<i64, i64>,
    step_limit: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Machine::with_step_limit(DEFAULT_STEP_LIMIT)
    }
}

impl Machine {
    pub fn with_step_limit(step_limit: u64) -> Machine {
        Machine {
            memory: HashMap::new(),
            step_limit,
        }
    }

    /// Runs a program until it halts,
    /// reading from `input` for every `GET`.
    pub fn run(&mut self, program: &AsmProgram, input: &[i64]) -> Result<Execution, MachineError> {
        let mut input = input.iter().copied();
        let mut execution = Execution::default();
        let mut counter: i64 = 0;
        let mut steps = 0;

        self.memory.clear();

        loop {
            let instruction = usize::try_from(counter)
                .ok()
                .and_then(|index| program.instructions.get(index))
                .ok_or(MachineError::ProgramCounterOutOfRange(counter))?;

            steps += 1;
            if steps > self.step_limit {
                return Err(MachineError::StepLimit(self.step_limit));
            }

            let mnemonic = instruction.mnemonic;
            let arg = instruction.arg();

            if mnemonic == Mnemonic::Halt {
                break;
            }

            if arg < 0 && mnemonic != Mnemonic::Set && !mnemonic.is_jump() {
                return Err(MachineError::NegativeAddress {
                    position: counter,
                    address: arg,
                });
            }

            execution.cost += mnemonic.cost();
            let acc = self.read(0);
            let mut next = counter + 1;

            match mnemonic {
                Mnemonic::Get => {
                    let value = input
                        .next()
                        .ok_or(MachineError::InputExhausted { position: counter })?;
                    self.memory.insert(arg, value);
                }
                Mnemonic::Put => execution.output.push(self.read(arg)),
                Mnemonic::Load => self.set_acc(self.read(arg)),
                Mnemonic::Store => {
                    self.memory.insert(arg, acc);
                }
                Mnemonic::LoadI => {
                    let value = self.read(self.pointer(arg, counter)?);
                    self.set_acc(value);
                }
                Mnemonic::StoreI => {
                    let address = self.pointer(arg, counter)?;
                    self.memory.insert(address, acc);
                }
                Mnemonic::Add => self.set_acc(acc.wrapping_add(self.read(arg))),
                Mnemonic::Sub => self.set_acc(acc.wrapping_sub(self.read(arg))),
                Mnemonic::AddI => {
                    let value = self.read(self.pointer(arg, counter)?);
                    self.set_acc(acc.wrapping_add(value));
                }
                Mnemonic::SubI => {
                    let value = self.read(self.pointer(arg, counter)?);
                    self.set_acc(acc.wrapping_sub(value));
                }
                Mnemonic::Set => self.set_acc(arg),
                // Arithmetic shift, so this rounds down.
                Mnemonic::Half => self.set_acc(acc >> 1),
                Mnemonic::Jump => next = counter + arg,
                Mnemonic::JPos if acc > 0 => next = counter + arg,
                Mnemonic::JZero if acc == 0 => next = counter + arg,
                Mnemonic::JNeg if acc < 0 => next = counter + arg,
                Mnemonic::JPos | Mnemonic::JZero | Mnemonic::JNeg => {}
                Mnemonic::Rtrn => next = self.read(arg),
                Mnemonic::Halt => unreachable!(),
            }

            counter = next;
        }

        log::debug!(
            "Halted after {steps} steps with cost {}",
            execution.cost
        );

        Ok(execution)
    }

    fn read(&self, address: i64) -> i64 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    fn set_acc(&mut self, value: i64) {
        self.memory.insert(0, value);
    }

    /// Reads an address stored in memory.
    fn pointer(&self, cell: i64, position: i64) -> Result<i64, MachineError> {
        let address = self.read(cell);

        if address < 0 {
            return Err(MachineError::NegativeAddress { position, address });
        }

        Ok(address)
    }
}
