use std::collections::BTreeMap;

use crate::core::{
    code::{Code, Instruction},
    opcodes::{ends_block, JUMPDEST},
};

/// Split `code` into basic blocks, keyed by start offset.
///
/// A block starts at offset 0, at every JUMPDEST, and after every instruction
/// that ends a block (jumps and halting opcodes).
pub(super) fn basic_blocks(code: &Code) -> BTreeMap<usize, Vec<Instruction>> {
    let mut blocks: BTreeMap<usize, Vec<Instruction>> = BTreeMap::new();
    let mut current = 0;
    let mut previous_ended = false;

    for instruction in code.instructions() {
        if instruction.pc != 0 && (previous_ended || instruction.opcode == JUMPDEST) {
            current = instruction.pc;
        }
        previous_ended = ends_block(instruction.opcode);
        blocks.entry(current).or_default().push(instruction);
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_blocks() {
        // 0: PUSH1 0x06, 2: JUMPI, 3: PUSH0, 4: PUSH0, 5: REVERT, 6: JUMPDEST, 7: STOP
        let code = Code::new(vec![0x60, 0x06, 0x57, 0x5f, 0x5f, 0xfd, 0x5b, 0x00]);
        let blocks = basic_blocks(&code);

        assert_eq!(blocks.keys().copied().collect::<Vec<_>>(), vec![0, 3, 6]);
        assert_eq!(blocks[&0].len(), 2);
        assert_eq!(blocks[&3].len(), 3);
        assert_eq!(blocks[&6].len(), 2);
    }

    #[test]
    fn test_empty_code() {
        assert!(basic_blocks(&Code::new(vec![])).is_empty());
    }
}
