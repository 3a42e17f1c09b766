use std::time::Instant;

use alloy::primitives::Address;
use argus_common::{
    ether::signatures::SignatureCatalog,
    utils::strings::encode_hex,
};
use argus_vm::core::{
    code::{Instruction, Instructions},
    opcodes::{PUSH20, PUSH4},
};
use tracing::debug;

/// Render a single instruction as `PC MNEMONIC [0xARG]`, with the program counter
/// as six hex digits. PUSH4 operands that are known selectors get their
/// signature appended as a comment.
///
/// ```
/// use argus_disassembler::render_instruction;
/// use argus_vm::core::code::Instructions;
///
/// let instruction = Instructions::new(&[0x60, 0x80]).next().expect("one instruction");
/// assert_eq!(render_instruction(&instruction, None), "000000 PUSH1 0x80");
/// ```
pub fn render_instruction(instruction: &Instruction, catalog: Option<&SignatureCatalog>) -> String {
    let mut line = format!("{:06x} {}", instruction.pc, instruction.name());

    if instruction.push_value().is_some() && !instruction.argument.is_empty() {
        line.push_str(&format!(" 0x{}", encode_hex(&instruction.argument)));
    }

    if instruction.opcode == PUSH4 {
        if let Some(signature) = catalog.and_then(|c| c.get_bytes(&instruction.argument)) {
            line.push_str(&format!("  ; {signature}"));
        }
    }

    line
}

/// Disassembles EVM bytecode into readable assembly, one instruction per line.
///
/// A PUSH truncated by the end of the code is rendered with the bytes that remain.
pub fn disassemble(bytecode: &[u8], catalog: Option<&SignatureCatalog>) -> String {
    let start_time = Instant::now();

    let lines = Instructions::new(bytecode)
        .map(|instruction| render_instruction(&instruction, catalog))
        .collect::<Vec<_>>();

    debug!(
        "disassembled {} bytes into {} instructions in {:?}",
        bytecode.len(),
        lines.len(),
        start_time.elapsed()
    );
    lines.join("\n")
}

/// Addresses pushed by PUSH20 instructions, in first-seen order without
/// duplicates. The all-ones mask used to truncate words to 160 bits is not an
/// address. The zero address is kept: it is the placeholder address of the
/// first compiled contract.
pub fn xrefs(bytecode: &[u8]) -> Vec<Address> {
    let mut found: Vec<Address> = Vec::new();

    for instruction in Instructions::new(bytecode) {
        if instruction.opcode != PUSH20 || instruction.argument.len() != 20 {
            continue;
        }

        let address = Address::from_slice(&instruction.argument);
        if address == Address::repeat_byte(0xff) {
            continue;
        }
        if !found.contains(&address) {
            found.push(address);
        }
    }

    debug!("found {} cross references", found.len());
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_common::utils::strings::decode_hex;

    #[test]
    fn test_disassemble() {
        let bytecode = decode_hex("0x6080604052348015600e575f80fd5b00").expect("valid hex");
        let asm = disassemble(&bytecode, None);
        let lines = asm.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "000000 PUSH1 0x80");
        assert_eq!(lines[1], "000002 PUSH1 0x40");
        assert_eq!(lines[2], "000004 MSTORE");
        assert_eq!(lines[3], "000005 CALLVALUE");
        assert_eq!(lines[8], "00000b PUSH0");
        assert_eq!(lines.last(), Some(&"00000f STOP"));
    }

    #[test]
    fn test_disassemble_labels_known_selectors() {
        let mut catalog = SignatureCatalog::new();
        catalog.merge_from_source("function transfer(address to, uint256 amount) external {}");

        // PUSH4 0xa9059cbb, EQ
        let asm = disassemble(&[0x63, 0xa9, 0x05, 0x9c, 0xbb, 0x14], Some(&catalog));
        assert_eq!(asm, "000000 PUSH4 0xa9059cbb  ; transfer(address,uint256)\n000005 EQ");

        // unknown selectors are left alone
        let asm = disassemble(&[0x63, 0x12, 0x34, 0x56, 0x78], Some(&catalog));
        assert_eq!(asm, "000000 PUSH4 0x12345678");
    }

    #[test]
    fn test_truncated_push() {
        assert_eq!(disassemble(&[0x00, 0x61, 0xff], None), "000000 STOP\n000001 PUSH2 0xff");
        assert_eq!(disassemble(&[0x60], None), "000000 PUSH1");
    }

    #[test]
    fn test_xrefs() {
        let a = "1111111111111111111111111111111111111111";
        let b = "2222222222222222222222222222222222222222";
        let ones = "ffffffffffffffffffffffffffffffffffffffff";
        let zero = "0000000000000000000000000000000000000000";
        let hex = format!("0x73{a}73{ones}73{b}73{zero}73{a}00");

        let found = xrefs(&decode_hex(&hex).expect("valid hex"));
        assert_eq!(
            found,
            vec![Address::repeat_byte(0x11), Address::repeat_byte(0x22), Address::ZERO]
        );
    }

    #[test]
    fn test_xrefs_ignores_other_pushes() {
        // PUSH32 of an address-shaped word is not a reference
        let hex = format!("0x7f{}{}", "00".repeat(12), "33".repeat(20));
        assert!(xrefs(&decode_hex(&hex).expect("valid hex")).is_empty());
    }
}
