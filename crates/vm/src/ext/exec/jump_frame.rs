use alloy::primitives::Address;

/// Identifies one side of a conditional jump within a function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(super) struct JumpFrame {
    pub address: Address,
    pub pc: usize,
    pub function: Option<[u8; 4]>,
    pub jump_taken: bool,
}

impl JumpFrame {
    pub(super) fn new(
        address: Address,
        pc: usize,
        function: Option<[u8; 4]>,
        jump_taken: bool,
    ) -> Self {
        Self { address, pc, function, jump_taken }
    }
}
