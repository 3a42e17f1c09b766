/// Decoded bytecode and jump destination analysis
pub mod code;

/// Constants used throughout the VM implementation
pub mod constants;

/// Memory implementation for VM memory management
pub mod memory;

/// Opcode definitions and metadata
pub mod opcodes;

/// Stack implementation for the VM
pub mod stack;

/// Storage implementation for contract storage
pub mod storage;

/// Provenance tracking for values
pub mod taint;

/// Core virtual machine implementation
pub mod vm;
