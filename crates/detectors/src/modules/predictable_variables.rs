use argus_vm::{
    core::taint::Taint,
    ext::exec::{EventKind, StateSpace},
};

use crate::{
    issue::{Issue, Severity},
    Detector,
};

/// Control flow decided by block values a miner can predict or influence:
/// timestamp and number (SWC-116), or coinbase, prevrandao and block hashes
/// used as randomness (SWC-120).
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictableVariables;

impl Detector for PredictableVariables {
    fn name(&self) -> &'static str {
        "predictable-variables"
    }

    fn detect(&self, space: &StateSpace) -> Vec<Issue> {
        let mut issues = Vec::new();

        for event in &space.events {
            let EventKind::Branch { condition } = event.kind else { continue };

            if condition.intersects(Taint::TIMESTAMP | Taint::NUMBER) {
                let variable = if condition.contains(Taint::TIMESTAMP) {
                    "block.timestamp"
                } else {
                    "block.number"
                };
                issues.push(Issue::at(
                    event,
                    "Dependence on predictable environment variable",
                    "116",
                    Severity::Low,
                    format!(
                        "A control flow decision is made based on {variable}. Block producers \
                         can influence this value within limits, so it should not be used for \
                         critical decisions."
                    ),
                ));
            }

            if condition.contains(Taint::BLOCK) {
                issues.push(Issue::at(
                    event,
                    "Weak source of randomness",
                    "120",
                    Severity::Medium,
                    "A control flow decision is made based on block metadata such as coinbase, \
                     prevrandao or a block hash. These values are known to block producers and \
                     must not be used as a source of randomness.",
                ));
            }
        }

        issues
    }
}
