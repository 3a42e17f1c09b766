//! The persistent signature catalog: a mapping from 4-byte function selectors to
//! human readable signatures, accumulated from every source file argus has seen.

use std::{collections::BTreeMap, path::Path};

use alloy::primitives::keccak256;
use tracing::{debug, warn};

use crate::{
    constants::{
        FUNCTION_HEADER_REGEX, SELECTOR_REGEX, TYPE_DECLARATION_REGEX, VALUE_TYPE_REGEX,
    },
    error::Error,
    utils::{
        io::file::{read_file, write_file_atomic},
        strings::encode_hex,
    },
};

/// Compute the selector of a canonical function signature, e.g.
/// `transfer(address,uint256)` -> `0xa9059cbb`.
///
/// ```
/// use argus_common::ether::signatures::selector;
///
/// assert_eq!(selector("transfer(address,uint256)"), "0xa9059cbb");
/// ```
pub fn selector(signature: &str) -> String {
    format!("0x{}", encode_hex(&keccak256(signature.as_bytes())[..4]))
}

/// Two different signatures that hash to the same selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The shared selector.
    pub selector: String,
    /// The signature already in the catalog, which is kept.
    pub existing: String,
    /// The signature that was rejected.
    pub incoming: String,
}

/// The outcome of merging one unit of source text into the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// `(selector, signature)` pairs that were not in the catalog before.
    pub added: Vec<(String, String)>,
    /// Selectors already mapped to a different signature.
    pub collisions: Vec<Collision>,
}

/// A mapping of selector -> signature which only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureCatalog {
    entries: BTreeMap<String, String>,
}

impl SignatureCatalog {
    /// An empty catalog, not backed by any file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the catalog at `path`. A missing file is created holding an empty
    /// object; a file that is not a JSON object of selector strings is an
    /// [`Error::CorruptCatalog`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("no signature catalog at '{}', creating one", path.display());
            write_file_atomic(path, b"{}")?;
            return Ok(Self::default());
        }

        let contents = read_file(path).map_err(|e| Error::CorruptCatalog {
            path: path.display().to_string(),
            diagnostic: e.to_string(),
        })?;
        let catalog = Self::parse(&contents).map_err(|diagnostic| Error::CorruptCatalog {
            path: path.display().to_string(),
            diagnostic,
        })?;

        debug!("loaded {} signatures from '{}'", catalog.len(), path.display());
        Ok(catalog)
    }

    fn parse(contents: &str) -> Result<Self, String> {
        let raw: BTreeMap<String, String> =
            serde_json::from_str(contents).map_err(|e| e.to_string())?;

        let mut entries = BTreeMap::new();
        for (key, signature) in raw {
            let key = key.to_lowercase();
            if !SELECTOR_REGEX.is_match(&key).unwrap_or(false) {
                return Err(format!("'{key}' is not a 4-byte selector"));
            }
            entries.insert(key, signature);
        }

        Ok(Self { entries })
    }

    /// Extract every externally callable function declared in `source` and add
    /// it to the catalog. A selector that is already present keeps its current
    /// signature; differing signatures are reported as collisions.
    pub fn merge_from_source(&mut self, source: &str) -> MergeReport {
        let mut report = MergeReport::default();

        for signature in extract_signatures(source) {
            let hash = selector(&signature);
            match self.entries.get(&hash) {
                Some(existing) if *existing != signature => {
                    warn!(
                        "selector collision on {}: keeping '{}', ignoring '{}'",
                        hash, existing, signature
                    );
                    report.collisions.push(Collision {
                        selector: hash,
                        existing: existing.clone(),
                        incoming: signature,
                    });
                }
                Some(_) => {}
                None => {
                    self.entries.insert(hash.clone(), signature.clone());
                    report.added.push((hash, signature));
                }
            }
        }

        report
    }

    /// Persist the catalog to `path`, replacing the file as a whole. Entries
    /// written by another run since this catalog was loaded are folded in first,
    /// so concurrent runs do not drop each other's additions.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let mut merged = self.entries.clone();

        if let Ok(contents) = read_file(path) {
            match Self::parse(&contents) {
                Ok(on_disk) => {
                    for (key, signature) in on_disk.entries {
                        merged.entry(key).or_insert(signature);
                    }
                }
                Err(e) => warn!("overwriting unreadable catalog '{}': {}", path.display(), e),
            }
        }

        let serialized = serde_json::to_string_pretty(&merged)?;
        write_file_atomic(path, serialized.as_bytes()).map_err(|e| Error::Output {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!("saved {} signatures to '{}'", merged.len(), path.display());
        Ok(())
    }

    /// Look up the signature for a selector such as `0xa9059cbb`.
    pub fn get(&self, selector: &str) -> Option<&str> {
        self.entries.get(&selector.to_lowercase()).map(String::as_str)
    }

    /// Look up the signature for raw selector bytes.
    pub fn get_bytes(&self, selector: &[u8]) -> Option<&str> {
        self.get(&format!("0x{}", encode_hex(selector)))
    }

    /// Number of known selectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(selector, signature)` pairs in selector order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Extract the canonical signatures of all functions in `source` that can be
/// called from outside the contract. `internal` and `private` functions are
/// skipped, parameter names and data locations are dropped, and integer
/// aliases are widened to their canonical form.
///
/// Comments and string literals are ignored. Contracts and interfaces declared
/// in `source` encode as `address`, enums as `uint8` and value types as their
/// underlying type. A function taking any other user defined type (a struct, or
/// a type imported from elsewhere) is skipped, since its selector depends on
/// definitions only the compiler sees.
///
/// ```
/// use argus_common::ether::signatures::extract_signatures;
///
/// let source = "function transfer(address to, uint amount) external returns (bool) {}";
/// assert_eq!(extract_signatures(source), vec!["transfer(address,uint256)"]);
/// ```
pub fn extract_signatures(source: &str) -> Vec<String> {
    let source = strip_comments(source);
    let aliases = type_aliases(&source);
    let mut signatures = Vec::new();

    for captures in FUNCTION_HEADER_REGEX.captures_iter(&source).filter_map(|c| c.ok()) {
        let (Some(name), Some(params)) = (captures.get(1), captures.get(2)) else {
            continue;
        };

        let qualifiers = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
        if qualifiers
            .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .any(|word| word == "internal" || word == "private")
        {
            continue;
        }

        let Some(types) = params
            .as_str()
            .split(',')
            .filter_map(|param| param.split_whitespace().next())
            .map(|ty| canonical_type(ty, &aliases))
            .collect::<Option<Vec<_>>>()
        else {
            debug!("skipping '{}': parameter types need the compiler", name.as_str());
            continue;
        };

        let signature = format!("{}({})", name.as_str(), types.join(","));
        if !signatures.contains(&signature) {
            signatures.push(signature);
        }
    }

    signatures
}

/// Blank out comments and string literals, keeping line breaks, so nothing
/// inside them is mistaken for a declaration.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                if chars.any(|next| next == '\n') {
                    out.push('\n');
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                out.push(' ');
            }
            '"' | '\'' => {
                let mut escaped = false;
                for next in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == c || next == '\n' {
                        break;
                    }
                }
                out.push_str("\"\"");
            }
            _ => out.push(c),
        }
    }

    out
}

/// ABI types of the user defined types declared in `source`.
fn type_aliases(source: &str) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();

    for captures in TYPE_DECLARATION_REGEX.captures_iter(source).filter_map(|c| c.ok()) {
        let (Some(kind), Some(name)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let abi_type = if kind.as_str() == "enum" { "uint8" } else { "address" };
        aliases.insert(name.as_str().to_string(), abi_type.to_string());
    }

    for captures in VALUE_TYPE_REGEX.captures_iter(source).filter_map(|c| c.ok()) {
        let (Some(name), Some(underlying)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let underlying = widen(underlying.as_str());
        if is_elementary(underlying) {
            aliases.insert(name.as_str().to_string(), underlying.to_string());
        }
    }

    aliases
}

/// The ABI form of a parameter type, keeping any array suffix. `None` for
/// types that are neither elementary nor in `aliases`.
fn canonical_type(ty: &str, aliases: &BTreeMap<String, String>) -> Option<String> {
    let (base, suffix) = match ty.find('[') {
        Some(i) => ty.split_at(i),
        None => (ty, ""),
    };

    let base = widen(base);
    let base = if is_elementary(base) { base } else { aliases.get(base)?.as_str() };

    Some(format!("{base}{}", suffix.replace(char::is_whitespace, "")))
}

/// Widen solidity type aliases.
fn widen(ty: &str) -> &str {
    match ty {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        "fixed" => "fixed128x18",
        "ufixed" => "ufixed128x18",
        other => other,
    }
}

/// Whether `ty` is an elementary ABI type.
fn is_elementary(ty: &str) -> bool {
    let sized = |digits: &str, valid: fn(usize) -> bool| digits.parse::<usize>().is_ok_and(valid);
    let integer_bits = |n: usize| n % 8 == 0 && (8..=256).contains(&n);

    if matches!(ty, "address" | "bool" | "string" | "bytes" | "function") {
        return true;
    }
    if let Some(n) = ty.strip_prefix("bytes") {
        return sized(n, |n| (1..=32).contains(&n));
    }
    if let Some(n) = ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int")) {
        return sized(n, integer_bits);
    }
    if let Some(mn) = ty.strip_prefix("ufixed").or_else(|| ty.strip_prefix("fixed")) {
        return mn
            .split_once('x')
            .is_some_and(|(m, n)| sized(m, integer_bits) && sized(n, |n| n <= 80));
    }
    false
}
