//! ABI type tags
//!
//! [`AbiType`] wraps the resolved [`DynSolType`] of a Solidity type tag such
//! as `uint256`, `bytes32[]` or `(address,uint96)[2]`. Resolution expands the
//! `uint`/`int` aliases, so [`Display`] always yields the canonical name used
//! for selectors. Function pointers are outside the supported grammar.

use crate::error::EncodingError;
use alloy_dyn_abi::DynSolType;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A parsed ABI type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbiType(DynSolType);

impl AbiType {
    /// `uint{bits}`
    #[must_use]
    pub fn uint(bits: usize) -> Self {
        Self(DynSolType::Uint(bits))
    }

    /// `address`
    #[must_use]
    pub fn address() -> Self {
        Self(DynSolType::Address)
    }

    /// Resolved type
    #[inline]
    #[must_use]
    pub fn as_dyn(&self) -> &DynSolType {
        &self.0
    }

    /// Whether the encoding of this type lives in the tail section
    #[inline]
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.0.is_dynamic()
    }

    /// Parse a comma separated type list, respecting nested tuples
    ///
    /// An empty (or all-whitespace) input yields an empty list.
    ///
    /// # Errors
    /// Returns [`EncodingError::InvalidType`] when the list does not resolve
    pub fn parse_list(list: &str) -> Result<Vec<Self>, EncodingError> {
        let compact = compact(list);
        if compact.is_empty() {
            return Ok(Vec::new());
        }
        match resolve(&format!("({compact})"))? {
            DynSolType::Tuple(items) => Ok(items.into_iter().map(Self).collect()),
            _ => Err(EncodingError::InvalidType(list.to_string())),
        }
    }
}

/// Type tags never contain whitespace once normalized
fn compact(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn resolve(s: &str) -> Result<DynSolType, EncodingError> {
    let ty = DynSolType::parse(s).map_err(|_| EncodingError::InvalidType(s.to_string()))?;
    if supported(&ty) {
        Ok(ty)
    } else {
        Err(EncodingError::InvalidType(s.to_string()))
    }
}

fn supported(ty: &DynSolType) -> bool {
    match ty {
        DynSolType::Bool
        | DynSolType::Int(_)
        | DynSolType::Uint(_)
        | DynSolType::FixedBytes(_)
        | DynSolType::Address
        | DynSolType::Bytes
        | DynSolType::String => true,
        DynSolType::Array(inner) | DynSolType::FixedArray(inner, _) => supported(inner),
        DynSolType::Tuple(items) => items.iter().all(supported),
        _ => false,
    }
}

impl FromStr for AbiType {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact = compact(s);
        if compact.is_empty() {
            return Err(EncodingError::InvalidType(s.to_string()));
        }
        resolve(&compact).map(Self)
    }
}

impl Display for AbiType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.sol_type_name())
    }
}

impl From<AbiType> for DynSolType {
    fn from(ty: AbiType) -> Self {
        ty.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> AbiType {
        s.parse().unwrap()
    }

    #[test]
    fn elementary_types_parse() {
        assert_eq!(parse("uint256"), AbiType::uint(256));
        assert_eq!(parse("uint"), AbiType::uint(256));
        assert_eq!(parse("int8").as_dyn(), &DynSolType::Int(8));
        assert_eq!(parse("address"), AbiType::address());
        assert_eq!(parse("bytes32").as_dyn(), &DynSolType::FixedBytes(32));
        assert_eq!(parse("bytes").as_dyn(), &DynSolType::Bytes);
    }

    #[test]
    fn invalid_widths_rejected() {
        for bad in ["uint7", "uint264", "uint0", "bytes33", "bytes0", "float", "function", ""] {
            assert!(bad.parse::<AbiType>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn nested_types_display_canonically() {
        let ty = parse("(uint, address[2], (bool,string))[]");
        assert_eq!(ty.to_string(), "(uint256,address[2],(bool,string))[]");
        assert!(ty.is_dynamic());
        assert!(!parse("(uint8,bytes4)[2]").is_dynamic());
        assert!(parse("string[2]").is_dynamic());
    }

    #[test]
    fn lists_split_at_top_level_only() {
        let list = AbiType::parse_list("uint256, (address,bool)[], bytes").unwrap();
        let names: Vec<_> = list.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["uint256", "(address,bool)[]", "bytes"]);
        assert!(AbiType::parse_list("  ").unwrap().is_empty());
    }

    #[test]
    fn unbalanced_lists_rejected() {
        assert!(AbiType::parse_list("(uint256,bool").is_err());
        assert!(AbiType::parse_list("uint256)").is_err());
        assert!(AbiType::parse_list("uint256,,bool").is_err());
    }
}
