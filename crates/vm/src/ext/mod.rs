/// State-space exploration over one or more contracts
pub mod exec;

/// Step-by-step execution traces
pub mod trace;
