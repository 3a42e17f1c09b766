//! Argus EVM Virtual Machine implementation
//!
//! A concrete EVM that tracks the provenance of every value it computes, plus the
//! analyses built on top of it: instruction tracing and state-space exploration.

/// Core VM implementation, including code analysis, memory, stack, storage, and opcodes
pub mod core;

/// Extensions to the core VM: tracing and state-space exploration
pub mod ext;
