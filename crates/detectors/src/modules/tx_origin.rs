use argus_vm::{
    core::taint::Taint,
    ext::exec::{EventKind, StateSpace},
};

use crate::{
    issue::{Issue, Severity},
    Detector,
};

/// Control flow decided by `tx.origin` (SWC-115).
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOriginAuthorization;

impl Detector for TxOriginAuthorization {
    fn name(&self) -> &'static str {
        "tx-origin"
    }

    fn detect(&self, space: &StateSpace) -> Vec<Issue> {
        space
            .events
            .iter()
            .filter(|event| match event.kind {
                EventKind::Branch { condition } => condition.contains(Taint::ORIGIN),
                _ => false,
            })
            .map(|event| {
                Issue::at(
                    event,
                    "Dependence on tx.origin",
                    "115",
                    Severity::Low,
                    "The tx.origin environment variable has been found to influence a control \
                     flow decision. Use of tx.origin as a security control might cause \
                     authorization bypass; use msg.sender instead.",
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
    async fn test_origin_check() {
        // 00 ORIGIN CALLER EQ PUSH1 0x07 JUMPI
        // 06 STOP
        // 07 JUMPDEST STOP
        let issues = TxOriginAuthorization.detect(&explore("0x323314600757 00 5b00").await);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].pc, 5);
        assert_eq!(issues[0].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_sender_check() {
        // 00 PUSH0 SLOAD CALLER EQ PUSH1 0x08 JUMPI, 07 STOP, 08 JUMPDEST STOP
        let issues = TxOriginAuthorization.detect(&explore("0x5f543314600857 00 5b00").await);
        assert!(issues.is_empty());
    }
}
