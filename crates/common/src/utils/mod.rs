/// Environment variable utilities.
pub mod env;

/// Input/output utilities for file manipulation.
pub mod io;

/// String and hex manipulation utilities.
pub mod strings;
