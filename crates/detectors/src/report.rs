use std::fmt::{self, Display};

use argus_common::{ether::signatures::SignatureCatalog, utils::strings::encode_hex};

use crate::issue::Issue;

/// The issues found by a run of the detectors, sorted by contract and pc.
#[derive(Clone, Debug, Default)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    /// A report over `issues`.
    pub fn new(mut issues: Vec<Issue>) -> Self {
        issues.sort_by(|a, b| (&a.contract, a.pc, a.swc_id).cmp(&(&b.contract, b.pc, b.swc_id)));
        Self { issues }
    }

    /// The issues, sorted.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Whether nothing was found.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Render the report, naming functions through `catalog` where possible.
    pub fn render(&self, catalog: Option<&SignatureCatalog>) -> String {
        if self.issues.is_empty() {
            return "The analysis was completed successfully. No issues were detected.\n"
                .to_string();
        }

        let mut output = String::new();
        for issue in &self.issues {
            let function = match issue.function {
                Some(selector) => catalog
                    .and_then(|c| c.get_bytes(&selector))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("_function_0x{}", encode_hex(&selector))),
                None => "fallback".to_string(),
            };

            output.push_str(&format!("==== {} ====\n", issue.title));
            output.push_str(&format!("SWC ID: {}\n", issue.swc_id));
            output.push_str(&format!("Severity: {}\n", issue.severity));
            output.push_str(&format!("Contract: {}\n", issue.contract));
            output.push_str(&format!("Function name: {function}\n"));
            output.push_str(&format!("PC address: {}\n", issue.pc));
            output.push_str(&format!("{}\n", issue.description));
            output.push_str("--------------------\n\n");
        }
        output
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}
