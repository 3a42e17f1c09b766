pub mod compiler;
pub mod provider;
pub mod signatures;
