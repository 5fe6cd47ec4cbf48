//! Human-readable function signatures
//!
//! A [`Signature`] is `name(type,...)`. Its canonical rendering is what the
//! delay contract hashes into a selector, so aliases like `uint` are expanded
//! and whitespace is dropped.

use crate::error::EncodingError;
use crate::types::AbiType;
use alloy_primitives::keccak256;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Parsed function signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    inputs: Vec<AbiType>,
}

impl Signature {
    /// Function name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types declared by the signature
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> &[AbiType] {
        &self.inputs
    }

    /// Canonical signature string
    #[inline]
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// First four bytes of the keccak-256 hash of the canonical signature
    #[must_use]
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.canonical().as_bytes());
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&hash[..4]);
        selector
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl FromStr for Signature {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| EncodingError::InvalidSignature {
            signature: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let open = trimmed.find('(').ok_or_else(|| invalid("missing '('"))?;
        let body = trimmed[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| invalid("must end with ')'"))?;

        let name = trimmed[..open].trim();
        if !is_identifier(name) {
            return Err(invalid("function name is not an identifier"));
        }

        let inputs = AbiType::parse_list(body).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            inputs,
        })
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let inputs: Vec<String> = self.inputs.iter().map(ToString::to_string).collect();
        write!(f, "{}({})", self.name, inputs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_aliases_and_whitespace() {
        let sig: Signature = " setFee( uint , address ) ".parse().unwrap();
        assert_eq!(sig.name(), "setFee");
        assert_eq!(sig.canonical(), "setFee(uint256,address)");
        assert_eq!(sig.inputs().len(), 2);
    }

    #[test]
    fn known_selectors() {
        let transfer: Signature = "transfer(address,uint256)".parse().unwrap();
        assert_eq!(hex::encode(transfer.selector()), "a9059cbb");

        let baz: Signature = "baz(uint32,bool)".parse().unwrap();
        assert_eq!(hex::encode(baz.selector()), "cdcd77c0");
    }

    #[test]
    fn no_argument_signature() {
        let sig: Signature = "pause()".parse().unwrap();
        assert!(sig.inputs().is_empty());
        assert_eq!(sig.canonical(), "pause()");
    }

    #[test]
    fn malformed_signatures_rejected() {
        for bad in ["setFee", "setFee(uint256", "(uint256)", "1fee(uint256)", "f(uint7)", "f(uint256))"] {
            assert!(
                matches!(bad.parse::<Signature>(), Err(EncodingError::InvalidSignature { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
