use std::fmt::{self, Display};

use alloy::primitives::Address;
use argus_vm::ext::exec::Event;

/// How bad an [`Issue`] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Funds or the contract itself can be lost.
    High,
    /// Exploitable under some conditions.
    Medium,
    /// Bad practice.
    Low,
}

impl Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "High"),
            Severity::Medium => write!(f, "Medium"),
            Severity::Low => write!(f, "Low"),
        }
    }
}

/// A potential vulnerability at a specific instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    /// Short title, e.g. `Unprotected Selfdestruct`.
    pub title: &'static str,
    /// Smart Contract Weakness Classification id, without the `SWC-` prefix.
    pub swc_id: &'static str,
    /// How bad it is.
    pub severity: Severity,
    /// Name of the affected contract.
    pub contract: String,
    /// Address of the affected contract.
    pub address: Address,
    /// Offset of the offending instruction.
    pub pc: usize,
    /// Selector of the function the instruction was reached through.
    pub function: Option<[u8; 4]>,
    /// What was found.
    pub description: String,
}

impl Issue {
    /// An issue located at the instruction that produced `event`.
    pub fn at(
        event: &Event,
        title: &'static str,
        swc_id: &'static str,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            title,
            swc_id,
            severity,
            contract: event.contract.clone(),
            address: event.address,
            pc: event.pc,
            function: event.function,
            description: description.into(),
        }
    }
}
