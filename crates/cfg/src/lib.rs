//! The CFG module renders the state space found by exploration as a control-flow
//! graph, either as an interactive HTML page or in graphviz `dot` format.

mod core;

// re-export the public interface
pub use core::{graph::as_dot, render_html};
