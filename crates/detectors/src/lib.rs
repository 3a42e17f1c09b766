//! Vulnerability detection ("firing lasers") over a [`StateSpace`].
//!
//! Each [`Detector`] inspects the events recorded during exploration and reports
//! [`Issue`]s. [`fire_lasers`] runs every shipped detector and collects a
//! [`Report`].

mod issue;
mod modules;
mod report;

use std::{fmt::Debug, time::Instant};

use argus_vm::ext::exec::StateSpace;
use tracing::debug;

pub use issue::{Issue, Severity};
pub use modules::{
    DelegateCallToUntrusted, EtherThief, PredictableVariables, TxOriginAuthorization,
    UnprotectedSelfdestruct,
};
pub use report::Report;

/// A single vulnerability check.
pub trait Detector: Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Issues found in `space`.
    fn detect(&self, space: &StateSpace) -> Vec<Issue>;
}

/// Every shipped detector.
pub fn all_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(UnprotectedSelfdestruct),
        Box::new(DelegateCallToUntrusted),
        Box::new(EtherThief),
        Box::new(TxOriginAuthorization),
        Box::new(PredictableVariables),
    ]
}

/// Run `detectors` over `space`. The same weakness found at the same
/// instruction through several paths is reported once.
pub fn fire_lasers(space: &StateSpace, detectors: &[Box<dyn Detector>]) -> Report {
    let mut issues: Vec<Issue> = Vec::new();

    for detector in detectors {
        let start_time = Instant::now();
        let found = detector.detect(space);
        debug!(
            "detector '{}' found {} issues in {:?}",
            detector.name(),
            found.len(),
            start_time.elapsed()
        );

        for issue in found {
            let duplicate = issues.iter().any(|existing| {
                existing.address == issue.address &&
                    existing.pc == issue.pc &&
                    existing.swc_id == issue.swc_id
            });
            if !duplicate {
                issues.push(issue);
            }
        }
    }

    Report::new(issues)
}
