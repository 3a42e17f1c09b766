use fancy_regex::Regex;
use lazy_static::lazy_static;

/// Upper bound on the number of contracts that can be assigned an indexed address.
pub const MAX_INDEXED_CONTRACTS: usize = 16;

/// The endpoint used when neither flags nor configuration name a node.
pub const DEFAULT_LOCAL_RPC: &str = "http://localhost:8545";

lazy_static! {
    /// Matches a well-formed address: `0x` followed by exactly 40 hex characters.
    pub static ref ADDRESS_REGEX: Regex =
        Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("failed to compile regex");

    /// Matches a canonical 4-byte selector key as stored in the signature catalog.
    pub static ref SELECTOR_REGEX: Regex =
        Regex::new(r"^0x[0-9a-f]{8}$").expect("failed to compile regex");

    /// Matches a solidity function header: name, parameter list and everything up to the
    /// body or terminating semicolon (visibility, mutability, modifiers, returns).
    pub static ref FUNCTION_HEADER_REGEX: Regex =
        Regex::new(r"(?s)\bfunction\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^)]*)\)([^{;]*)")
            .expect("failed to compile regex");

    /// Matches a contract, interface or enum declaration: kind and name.
    pub static ref TYPE_DECLARATION_REGEX: Regex =
        Regex::new(r"\b(contract|interface|enum)\s+([A-Za-z_$][A-Za-z0-9_$]*)")
            .expect("failed to compile regex");

    /// Matches a user defined value type: name and underlying elementary type.
    pub static ref VALUE_TYPE_REGEX: Regex =
        Regex::new(r"\btype\s+([A-Za-z_$][A-Za-z0-9_$]*)\s+is\s+([A-Za-z0-9_]+)\s*;")
            .expect("failed to compile regex");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_regex() {
        assert!(ADDRESS_REGEX
            .is_match("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984")
            .unwrap_or(false));
        assert!(!ADDRESS_REGEX
            .is_match("1f9840a85d5af5bf1d1762f925bdaddc4201f984")
            .unwrap_or(false));
        assert!(!ADDRESS_REGEX
            .is_match("0x1f9840a85d5af5bf1d1762f925bdaddc4201f98")
            .unwrap_or(false));
        assert!(!ADDRESS_REGEX
            .is_match("0x1f9840a85d5af5bf1d1762f925bdaddc4201f984aa")
            .unwrap_or(false));
        assert!(!ADDRESS_REGEX
            .is_match("0xzz9840a85d5af5bf1d1762f925bdaddc4201f984")
            .unwrap_or(false));
    }
}
