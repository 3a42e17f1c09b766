use argus_vm::{
    core::{
        opcodes::{CALLCODE, DELEGATECALL},
        taint::Taint,
    },
    ext::exec::{EventKind, StateSpace},
};

use crate::{
    issue::{Issue, Severity},
    Detector,
};

/// DELEGATECALL or CALLCODE to an address taken from call data (SWC-112).
#[derive(Debug, Clone, Copy, Default)]
pub struct DelegateCallToUntrusted;

impl Detector for DelegateCallToUntrusted {
    fn name(&self) -> &'static str {
        "delegatecall-to-untrusted"
    }

    fn detect(&self, space: &StateSpace) -> Vec<Issue> {
        space
            .events
            .iter()
            .filter(|event| {
                matches!(
                    &event.kind,
                    EventKind::Call { opcode: DELEGATECALL | CALLCODE, target, .. }
                        if target.taint.contains(Taint::CALLDATA)
                )
            })
            .map(|event| {
                Issue::at(
                    event,
                    "Delegatecall to user-supplied address",
                    "112",
                    Severity::High,
                    "The contract delegates execution to a contract address taken from call \
                     data. The callee runs with this contract's storage and balance, so any \
                     sender can take over the contract.",
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::explore;

    #[tokio::test]
    async fn test_calldata_target() {
        // PUSH0 x4, PUSH0 CALLDATALOAD, GAS, DELEGATECALL, STOP
        let issues = DelegateCallToUntrusted.detect(&explore("0x5f5f5f5f5f355af400").await);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].pc, 7);
        assert_eq!(issues[0].swc_id, "112");
    }

    #[tokio::test]
    async fn test_constant_target() {
        // PUSH0 x4, PUSH20 0x11..11, GAS, DELEGATECALL, STOP
        let hex = format!("0x5f5f5f5f73{}5af400", "11".repeat(20));
        assert!(DelegateCallToUntrusted.detect(&explore(&hex).await).is_empty());
    }
}
