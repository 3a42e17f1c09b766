//! Common utilities, constants, and resources used across the argus codebase.
//!
//! This crate provides the error type shared by every argus crate, the signature
//! catalog, the node connector and compiler interfaces, and general utilities.

/// Constants used throughout the argus codebase.
pub mod constants;

/// The shared error type.
pub mod error;

/// Utilities for interacting with Ethereum: node connectors, the compiler
/// interface and the signature catalog.
pub mod ether;

/// General utility functions and types for common tasks.
pub mod utils;

pub use error::Error;
