use argus_vm::{
    core::taint::Taint,
    ext::exec::{EventKind, StateSpace},
};

use crate::{
    issue::{Issue, Severity},
    modules::AUTHORIZATION,
    Detector,
};

/// SELFDESTRUCT reachable without any check on the caller (SWC-106).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnprotectedSelfdestruct;

impl Detector for UnprotectedSelfdestruct {
    fn name(&self) -> &'static str {
        "unprotected-selfdestruct"
    }

    fn detect(&self, space: &StateSpace) -> Vec<Issue> {
        space
            .events
            .iter()
            .filter_map(|event| {
                let EventKind::SelfDestruct { beneficiary } = &event.kind else { return None };
                if event.guards.intersects(AUTHORIZATION) {
                    return None;
                }

                let description = if beneficiary.taint.contains(Taint::CALLDATA) {
                    "Any sender can trigger execution of the SELFDESTRUCT instruction to destroy \
                     this contract account and withdraw its balance to an arbitrary address."
                } else {
                    "Any sender can trigger execution of the SELFDESTRUCT instruction to destroy \
                     this contract account."
                };
                let title = "Unprotected Selfdestruct";
                Some(Issue::at(event, title, "106", Severity::High, description))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::explore;

    #[tokio::test]
    async fn test_unprotected() {
        // CALLER SELFDESTRUCT
        let issues = UnprotectedSelfdestruct.detect(&explore("0x33ff").await);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].pc, 1);
        assert!(!issues[0].description.contains("arbitrary address"));
    }

    #[tokio::test]
    async fn test_arbitrary_beneficiary() {
        // PUSH0 CALLDATALOAD SELFDESTRUCT
        let issues = UnprotectedSelfdestruct.detect(&explore("0x5f35ff").await);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].description.contains("arbitrary address"));
    }

    #[tokio::test]
    async fn test_owner_check() {
        // 00 CALLER PUSH1 0x01 SLOAD EQ PUSH1 0x0a JUMPI
        // 08 PUSH0 SELFDESTRUCT
        // 0a JUMPDEST ORIGIN SELFDESTRUCT
        let space = explore("0x3360015414600a57 5fff 5b32ff").await;
        assert!(UnprotectedSelfdestruct.detect(&space).is_empty());
    }
}
