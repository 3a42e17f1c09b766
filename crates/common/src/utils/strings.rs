use alloy::primitives::U256;
use eyre::{bail, eyre, Result};
use std::fmt::Write;

/// Decodes a hex string into a vector of bytes. A leading `0x` and surrounding
/// whitespace are ignored.
///
/// ```
/// use argus_common::utils::strings::decode_hex;
///
/// let result = decode_hex("0x6080").expect("should decode hex");
/// assert_eq!(result, vec![0x60, 0x80]);
///
/// assert!(decode_hex("0x608").is_err());
/// ```
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    // normalize
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);

    if s.is_empty() {
        return Ok(vec![]);
    }
    if s.len() % 2 != 0 {
        bail!("invalid hex string: odd number of digits ({})", s.len());
    }

    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .ok_or_else(|| eyre!("invalid hex string: non-ascii input"))
                .and_then(|pair| {
                    u8::from_str_radix(pair, 16)
                        .map_err(|_| eyre!("invalid hex string: unexpected '{}'", pair))
                })
        })
        .collect()
}

/// Encodes a slice of bytes into a hex string, without prefix
///
/// ```
/// use argus_common::utils::strings::encode_hex;
///
/// assert_eq!(encode_hex(&[0x60, 0x80, 0x60, 0x40]), "60806040");
/// ```
pub fn encode_hex(s: &[u8]) -> String {
    s.iter().fold(String::with_capacity(s.len() * 2), |mut acc, b| {
        write!(acc, "{b:02x}").expect("unable to write");
        acc
    })
}

/// Parses an integer given either as decimal digits or as `0x`-prefixed hex.
///
/// ```
/// use argus_common::utils::strings::parse_u256;
/// use alloy::primitives::U256;
///
/// assert_eq!(parse_u256("10"), Some(U256::from(10)));
/// assert_eq!(parse_u256("0x10"), Some(U256::from(16)));
/// assert_eq!(parse_u256("abc"), None);
/// ```
pub fn parse_u256(s: &str) -> Option<U256> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    match s.strip_prefix("0x") {
        Some(hex) if !hex.is_empty() => U256::from_str_radix(hex, 16).ok(),
        Some(_) => None,
        None => {
            if !s.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            U256::from_str_radix(s, 10).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex_whitespace_and_prefix() {
        assert_eq!(decode_hex("  0x00ff\n").expect("valid"), vec![0x00, 0xff]);
        assert_eq!(decode_hex("00FF").expect("valid"), vec![0x00, 0xff]);
        assert!(decode_hex("0x").expect("valid").is_empty());
    }

    #[test]
    fn test_decode_hex_rejects_garbage() {
        assert!(decode_hex("0xzz").is_err());
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("0xé0").is_err());
    }

    #[test]
    fn test_parse_u256_overflow() {
        let too_big = format!("0x1{}", "0".repeat(64));
        assert_eq!(parse_u256(&too_big), None);
        assert_eq!(parse_u256("-1"), None);
        assert_eq!(parse_u256("0x"), None);
    }
}
