use argus_vm::{
    core::{
        opcodes::{CALL, CALLCODE},
        taint::Taint,
    },
    ext::exec::{EventKind, StateSpace},
};

use crate::{
    issue::{Issue, Severity},
    modules::AUTHORIZATION,
    Detector,
};

/// Ether sent to a caller-chosen recipient on a path that never checks who the
/// caller is (SWC-105).
#[derive(Debug, Clone, Copy, Default)]
pub struct EtherThief;

impl Detector for EtherThief {
    fn name(&self) -> &'static str {
        "ether-thief"
    }

    fn detect(&self, space: &StateSpace) -> Vec<Issue> {
        space
            .events
            .iter()
            .filter(|event| {
                let EventKind::Call { opcode: CALL | CALLCODE, target, value: Some(value) } =
                    &event.kind
                else {
                    return false;
                };

                let sends_ether = !value.value.is_zero() || !value.taint.is_empty();
                // refunding msg.value is not a withdrawal
                let refund = value.taint.contains(Taint::CALLVALUE);
                let attacker_recipient = target.taint.intersects(Taint::CALLDATA | Taint::CALLER);

                let guarded = event.guards.intersects(AUTHORIZATION);

                sends_ether && !refund && attacker_recipient && !guarded
            })
            .map(|event| {
                Issue::at(
                    event,
                    "Unprotected Ether Withdrawal",
                    "105",
                    Severity::High,
                    "Any sender can withdraw Ether from the contract account. The transfer \
                     recipient is controlled by the sender and no check on the sender is made \
                     on this path.",
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
    async fn test_withdraw_to_caller() {
        // PUSH0 x4, PUSH1 0x01 (value), CALLER, GAS, CALL, STOP
        let issues = EtherThief.detect(&explore("0x5f5f5f5f6001335af100").await);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].pc, 8);
    }

    #[tokio::test]
    async fn test_zero_value_call() {
        // PUSH0 x5, CALLER, GAS, CALL, STOP
        assert!(EtherThief.detect(&explore("0x5f5f5f5f5f335af100").await).is_empty());
    }

    #[tokio::test]
    async fn test_refund() {
        // PUSH0 x4, CALLVALUE, CALLER, GAS, CALL, STOP
        assert!(EtherThief.detect(&explore("0x5f5f5f5f34335af100").await).is_empty());
    }

    #[tokio::test]
    async fn test_owner_check() {
        // 00 CALLER PUSH1 0x01 SLOAD EQ PUSH1 0x0b JUMPI
        // 08 PUSH0 DUP1 REVERT
        // 0b JUMPDEST PUSH0 x4, PUSH1 0x01, CALLER, GAS, CALL, STOP
        let space = explore("0x3360015414600b57 5f80fd 5b5f5f5f5f6001335af100").await;
        assert!(EtherThief.detect(&space).is_empty());
    }
}
