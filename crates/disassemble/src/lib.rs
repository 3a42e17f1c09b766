//! The Disassembler module converts EVM bytecode into human-readable assembly
//! and extracts the addresses a contract references.

mod core;

// re-export the public interface
pub use core::{disassemble, render_instruction, xrefs};
