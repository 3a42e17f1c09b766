use alloy::primitives::U256;

use super::opcodes::{opcode_name, push_size, JUMPDEST};

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Offset of the opcode byte within the code.
    pub pc: usize,
    /// The opcode byte.
    pub opcode: u8,
    /// Immediate bytes of a PUSH. Shorter than the push size when the code is truncated.
    pub argument: Vec<u8>,
}

impl Instruction {
    /// The mnemonic of this instruction.
    pub fn name(&self) -> &'static str {
        opcode_name(self.opcode)
    }

    /// The immediate as a word, if this is a PUSH.
    pub fn push_value(&self) -> Option<U256> {
        (push_size(self.opcode) > 0).then(|| U256::from_be_slice(&self.argument))
    }

    /// Offset of the instruction that follows this one.
    pub fn next_pc(&self) -> usize {
        self.pc + 1 + push_size(self.opcode)
    }
}

/// Iterator over the instructions of a bytecode slice.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> Instructions<'a> {
    /// Decode `code` from offset 0.
    pub fn new(code: &'a [u8]) -> Self {
        Self { code, pc: 0 }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Self::Item> {
        let opcode = *self.code.get(self.pc)?;
        let start = self.pc + 1;
        let end = (start + push_size(opcode)).min(self.code.len());

        let argument = self.code[start..end].to_vec();
        let instruction = Instruction { pc: self.pc, opcode, argument };
        self.pc = start + push_size(opcode);
        Some(instruction)
    }
}

/// Bytecode together with its valid jump destinations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Code {
    bytes: Vec<u8>,
    jumpdests: Vec<bool>,
}

impl Code {
    /// Analyze `bytes`, marking every JUMPDEST that is not inside PUSH data.
    ///
    /// ```
    /// use argus_vm::core::code::Code;
    ///
    /// // PUSH1 0x5b, JUMPDEST
    /// let code = Code::new(vec![0x60, 0x5b, 0x5b]);
    /// assert!(!code.is_jumpdest(1));
    /// assert!(code.is_jumpdest(2));
    /// ```
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut jumpdests = vec![false; bytes.len()];
        for instruction in Instructions::new(&bytes) {
            if instruction.opcode == JUMPDEST {
                jumpdests[instruction.pc] = true;
            }
        }
        Self { bytes, jumpdests }
    }

    /// The raw bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Code length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether there is no code.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `pc` is a valid jump target.
    pub fn is_jumpdest(&self, pc: usize) -> bool {
        self.jumpdests.get(pc).copied().unwrap_or(false)
    }

    /// Opcode at `pc`; reading past the end yields STOP.
    pub fn opcode_at(&self, pc: usize) -> u8 {
        self.bytes.get(pc).copied().unwrap_or(0x00)
    }

    /// Decode the instruction at `pc`.
    pub fn instruction_at(&self, pc: usize) -> Instruction {
        let opcode = self.opcode_at(pc);
        let start = (pc + 1).min(self.bytes.len());
        let end = (pc + 1 + push_size(opcode)).min(self.bytes.len());
        Instruction { pc, opcode, argument: self.bytes[start..end].to_vec() }
    }

    /// Iterate over all instructions.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::opcodes::{PUSH1, PUSH2, STOP};

    #[test]
    fn test_instructions_skip_push_data() {
        // PUSH2 0x5b5b, STOP
        let decoded = Instructions::new(&[0x61, 0x5b, 0x5b, 0x00]).collect::<Vec<_>>();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].opcode, PUSH2);
        assert_eq!(decoded[0].argument, vec![0x5b, 0x5b]);
        assert_eq!(decoded[1].pc, 3);
        assert_eq!(decoded[1].opcode, STOP);
    }

    #[test]
    fn test_truncated_push() {
        let decoded = Instructions::new(&[0x60]).collect::<Vec<_>>();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].opcode, PUSH1);
        assert!(decoded[0].argument.is_empty());
        assert_eq!(decoded[0].push_value(), Some(U256::ZERO));
    }

    #[test]
    fn test_instruction_at_end_of_code() {
        let code = Code::new(vec![0x60, 0x01]);
        assert_eq!(code.instruction_at(5).opcode, STOP);
        assert_eq!(code.instruction_at(0).push_value(), Some(U256::from(1)));
    }
}
