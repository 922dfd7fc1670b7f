use std::ops::Range;

use alloy_primitives::{keccak256, U256};
use anyhow::{bail, Result};

use crate::svm::{instruction::bool_word, Instruction};

use super::{InterpreterLimits, InterpreterState, Termination};

const WORD: usize = 32;

pub(super) fn hash_word(data: &[u8]) -> U256 {
    U256::from_be_bytes(keccak256(data).0)
}

/// Value of an environment query, fixed for a given instruction and
/// arguments.
fn environment(instruction: Instruction, arguments: &[U256]) -> U256 {
    let mut seed = instruction.mnemonic().as_bytes().to_vec();
    for argument in arguments {
        seed.extend_from_slice(&argument.to_be_bytes::<WORD>());
    }
    hash_word(&seed)
}

fn to_usize(value: U256, limits: InterpreterLimits) -> Result<usize> {
    match usize::try_from(value) {
        Ok(value) if value <= limits.max_memory => Ok(value),
        _ => bail!("Memory access at 0x{value:x} out of range"),
    }
}

impl InterpreterState {
    /// Runs one instruction with `arguments` in source order and returns
    /// its result, if it has one.
    pub(super) fn execute(
        &mut self,
        instruction: Instruction,
        arguments: &[U256],
        limits: InterpreterLimits,
    ) -> Result<Option<U256>> {
        if arguments.len() != instruction.args() {
            bail!(
                "{instruction} expects {} argument(s), got {}",
                instruction.args(),
                arguments.len()
            );
        }
        if let Some(value) = instruction.evaluate(arguments) {
            return Ok(Some(value));
        }
        let arg = |i: usize| arguments[i];

        let value = match instruction {
            Instruction::Keccak256 => {
                let range = self.memory_range(arg(0), arg(1), limits)?;
                Some(hash_word(&self.memory[range]))
            }
            Instruction::CallDataLoad => {
                let mut word = [0u8; WORD];
                if let Ok(offset) = usize::try_from(arg(0)) {
                    for (i, byte) in word.iter_mut().enumerate() {
                        *byte = offset
                            .checked_add(i)
                            .and_then(|at| self.calldata.get(at))
                            .copied()
                            .unwrap_or(0);
                    }
                }
                Some(U256::from_be_bytes(word))
            }
            Instruction::CallDataSize => Some(U256::from(self.calldata.len())),
            Instruction::CallDataCopy => {
                let range = self.memory_range(arg(0), arg(2), limits)?;
                let offset = usize::try_from(arg(1)).unwrap_or(usize::MAX);
                for (i, at) in range.enumerate() {
                    self.memory[at] = offset
                        .checked_add(i)
                        .and_then(|source| self.calldata.get(source))
                        .copied()
                        .unwrap_or(0);
                }
                None
            }
            Instruction::CodeCopy | Instruction::ReturnDataCopy => {
                self.log(instruction, arguments);
                let range = self.memory_range(arg(0), arg(2), limits)?;
                self.memory[range].fill(0);
                None
            }
            Instruction::ExtCodeCopy => {
                self.log(instruction, arguments);
                let range = self.memory_range(arg(1), arg(3), limits)?;
                self.memory[range].fill(0);
                None
            }
            Instruction::MLoad => {
                let range = self.memory_range(arg(0), U256::from(WORD), limits)?;
                Some(U256::from_be_slice(&self.memory[range]))
            }
            Instruction::MStore => {
                let range = self.memory_range(arg(0), U256::from(WORD), limits)?;
                self.memory[range].copy_from_slice(&arg(1).to_be_bytes::<WORD>());
                None
            }
            Instruction::MStore8 => {
                let range = self.memory_range(arg(0), U256::from(1), limits)?;
                self.memory[range.start] = arg(1).byte(0);
                None
            }
            Instruction::MSize => Some(U256::from(self.memory.len())),
            Instruction::SLoad => Some(self.storage.get(&arg(0)).copied().unwrap_or_default()),
            Instruction::SStore => {
                if arg(1).is_zero() {
                    self.storage.remove(&arg(0));
                } else {
                    self.storage.insert(arg(0), arg(1));
                }
                None
            }
            Instruction::Pop => None,
            Instruction::Log0
            | Instruction::Log1
            | Instruction::Log2
            | Instruction::Log3
            | Instruction::Log4 => {
                self.memory_range(arg(0), arg(1), limits)?;
                self.log(instruction, arguments);
                None
            }
            Instruction::Create | Instruction::Create2 => {
                self.memory_range(arg(1), arg(2), limits)?;
                self.log(instruction, arguments);
                Some(environment(instruction, arguments))
            }
            Instruction::Call | Instruction::CallCode => {
                self.memory_range(arg(3), arg(4), limits)?;
                self.memory_range(arg(5), arg(6), limits)?;
                self.log(instruction, arguments);
                Some(bool_word(true))
            }
            Instruction::DelegateCall | Instruction::StaticCall => {
                self.memory_range(arg(2), arg(3), limits)?;
                self.memory_range(arg(4), arg(5), limits)?;
                self.log(instruction, arguments);
                Some(bool_word(true))
            }
            Instruction::Return | Instruction::Revert => {
                let range = self.memory_range(arg(0), arg(1), limits)?;
                self.return_data = self.memory[range].to_vec();
                self.log(instruction, arguments);
                bail!(if instruction == Instruction::Return {
                    Termination::Return
                } else {
                    Termination::Revert
                });
            }
            Instruction::Stop => {
                self.log(instruction, arguments);
                bail!(Termination::Stop);
            }
            Instruction::Invalid => {
                self.log(instruction, arguments);
                bail!(Termination::Invalid);
            }
            Instruction::SelfDestruct => {
                self.log(instruction, arguments);
                bail!(Termination::SelfDestruct);
            }
            _ if instruction.is_stack_manipulation() || instruction == Instruction::Pc => {
                bail!("{instruction} cannot be interpreted")
            }
            _ => Some(environment(instruction, arguments)),
        };
        Ok(value)
    }

    /// Checks a memory access and grows memory to cover it. Empty accesses
    /// touch nothing.
    fn memory_range(
        &mut self,
        offset: U256,
        size: U256,
        limits: InterpreterLimits,
    ) -> Result<Range<usize>> {
        if size.is_zero() {
            return Ok(0..0);
        }
        let start = to_usize(offset, limits)?;
        let size = to_usize(size, limits)?;
        let end = to_usize(U256::from(start) + U256::from(size), limits)?;
        let words = end.div_ceil(WORD);
        if self.memory.len() < words * WORD {
            self.memory.resize(words * WORD, 0);
        }
        Ok(start..end)
    }

    fn log(&mut self, instruction: Instruction, arguments: &[U256]) {
        let arguments: Vec<String> = arguments.iter().map(|a| format!("0x{a:x}")).collect();
        self.trace.push(format!(
            "{}({})",
            instruction.mnemonic().to_uppercase(),
            arguments.join(", ")
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execute(state: &mut InterpreterState, instruction: Instruction, arguments: &[u64]) -> Result<Option<U256>> {
        let arguments: Vec<U256> = arguments.iter().map(|a| U256::from(*a)).collect();
        state.execute(instruction, &arguments, InterpreterLimits::default())
    }

    #[test]
    fn memory_grows_in_words() {
        let mut state = InterpreterState::default();
        execute(&mut state, Instruction::MStore8, &[40, 0xff]).unwrap();
        assert_eq!(state.memory.len(), 64);
        assert_eq!(
            execute(&mut state, Instruction::MSize, &[]).unwrap(),
            Some(U256::from(64))
        );
        let loaded = execute(&mut state, Instruction::MLoad, &[9]).unwrap().unwrap();
        assert_eq!(loaded, U256::from(0xff));
    }

    #[test]
    fn calldata_reads_are_zero_padded() {
        let mut state = InterpreterState {
            calldata: vec![0x12, 0x34],
            ..Default::default()
        };
        let word = execute(&mut state, Instruction::CallDataLoad, &[1]).unwrap().unwrap();
        assert_eq!(word, U256::from(0x34) << 248);
        execute(&mut state, Instruction::CallDataCopy, &[0, 0, 3]).unwrap();
        assert_eq!(&state.memory[..3], &[0x12, 0x34, 0x00]);
    }

    #[test]
    fn zero_stores_clear_slots() {
        let mut state = InterpreterState::default();
        execute(&mut state, Instruction::SStore, &[1, 2]).unwrap();
        assert_eq!(state.storage.len(), 1);
        execute(&mut state, Instruction::SStore, &[1, 0]).unwrap();
        assert!(state.storage.is_empty());
    }

    #[test]
    fn terminations_are_errors() {
        let mut state = InterpreterState::default();
        let error = execute(&mut state, Instruction::Revert, &[0, 0]).unwrap_err();
        assert_eq!(error.downcast::<Termination>().unwrap(), Termination::Revert);
        assert_eq!(state.trace, vec!["REVERT(0x0, 0x0)"]);
    }

    #[test]
    fn jumps_are_rejected() {
        let mut state = InterpreterState::default();
        assert!(execute(&mut state, Instruction::Jump, &[0]).is_err());
    }
}
