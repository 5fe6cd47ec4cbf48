//! Typed parameter values
//!
//! [`AbiValue`] is a tagged union with one variant per ABI category. Values are
//! checked against their declared [`AbiType`] when a [`crate::Call`] is built,
//! so range and shape errors surface before anything is submitted.
//!
//! JSON is the interchange form used by operation plans and the ledger:
//! - integers as JSON numbers or decimal strings (`0x` hex for unsigned)
//! - addresses as `0x` strings, EIP-55 checksummed when mixed case
//! - bytes as `0x` hex strings
//! - arrays and tuples as JSON arrays

use crate::error::EncodingError;
use crate::types::AbiType;
use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};
use serde_json::Value;
use std::str::FromStr;

/// Largest integer a JavaScript number represents exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// A typed ABI value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiValue {
    /// Unsigned integer (any `uintN`)
    Uint(U256),
    /// Signed integer (any `intN`)
    Int(I256),
    /// Account address
    Address(Address),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// Dynamic `bytes`
    Bytes(Vec<u8>),
    /// Fixed `bytesN`
    FixedBytes(Vec<u8>),
    /// Dynamic or fixed array
    Array(Vec<AbiValue>),
    /// Tuple
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    /// Unsigned integer from a `u64`
    #[inline]
    #[must_use]
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    /// Short name of the value category, used in error messages
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "unsigned integer",
            Self::Int(_) => "signed integer",
            Self::Address(_) => "address",
            Self::Bool(_) => "boolean",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::FixedBytes(_) => "fixed bytes",
            Self::Array(_) => "array",
            Self::Tuple(_) => "tuple",
        }
    }

    /// Check that this value is representable as `ty`
    ///
    /// # Errors
    /// Returns [`EncodingError::IncompatibleValue`] on a category, range or
    /// length mismatch
    pub fn type_check(&self, ty: &AbiType) -> Result<(), EncodingError> {
        check(self, ty.as_dyn())
    }

    /// Coerce a loosely typed JSON value into a typed value of `ty`
    ///
    /// # Errors
    /// Returns [`EncodingError::IncompatibleValue`] when the JSON cannot be
    /// represented as `ty`
    pub fn from_json(ty: &AbiType, json: &Value) -> Result<Self, EncodingError> {
        let value = coerce(ty.as_dyn(), json)?;
        value.type_check(ty)?;
        Ok(value)
    }

    /// Token for the ABI encoder, checked against `ty`
    ///
    /// # Errors
    /// Returns [`EncodingError::IncompatibleValue`] when the value does not fit
    /// `ty`
    pub fn to_dyn(&self, ty: &AbiType) -> Result<DynSolValue, EncodingError> {
        self.type_check(ty)?;
        tokenize(self, ty.as_dyn())
    }

    /// Canonical JSON form
    ///
    /// Integers within JavaScript's safe range become JSON numbers, larger
    /// ones decimal strings, so the output can be read back losslessly by
    /// [`AbiValue::from_json`].
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Uint(v) => match u64::try_from(*v) {
                Ok(n) if n <= MAX_SAFE_INTEGER => Value::from(n),
                _ => Value::String(v.to_string()),
            },
            Self::Int(v) => {
                let text = v.to_string();
                match text.parse::<i64>() {
                    Ok(n) if n.unsigned_abs() <= MAX_SAFE_INTEGER => Value::from(n),
                    _ => Value::String(text),
                }
            }
            Self::Address(a) => Value::String(a.to_checksum(None)),
            Self::Bool(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Bytes(b) | Self::FixedBytes(b) => Value::String(format!("0x{}", hex::encode(b))),
            Self::Array(items) | Self::Tuple(items) => {
                Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }
}

impl From<u64> for AbiValue {
    fn from(value: u64) -> Self {
        Self::uint(value)
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AbiValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

fn mismatch(ty: &DynSolType, value: &AbiValue) -> EncodingError {
    EncodingError::incompatible(
        ty.sol_type_name(),
        value.kind(),
        "category does not match declared type",
    )
}

fn check(value: &AbiValue, ty: &DynSolType) -> Result<(), EncodingError> {
    let name = ty.sol_type_name();
    match (value, ty) {
        (AbiValue::Uint(v), DynSolType::Uint(bits)) => {
            if v.bit_len() > *bits {
                return Err(EncodingError::incompatible(name, v.to_string(), "out of range"));
            }
            Ok(())
        }
        (AbiValue::Int(v), DynSolType::Int(bits)) => {
            if *bits < 256 {
                let limit = U256::from(1u8) << (bits - 1);
                let magnitude = v.unsigned_abs();
                let fits = if v.is_negative() {
                    magnitude <= limit
                } else {
                    magnitude < limit
                };
                if !fits {
                    return Err(EncodingError::incompatible(name, v.to_string(), "out of range"));
                }
            }
            Ok(())
        }
        (AbiValue::Address(_), DynSolType::Address)
        | (AbiValue::Bool(_), DynSolType::Bool)
        | (AbiValue::String(_), DynSolType::String)
        | (AbiValue::Bytes(_), DynSolType::Bytes) => Ok(()),
        (AbiValue::FixedBytes(bytes), DynSolType::FixedBytes(size)) => {
            if bytes.len() != *size {
                return Err(EncodingError::incompatible(
                    name,
                    format!("0x{}", hex::encode(bytes)),
                    format!("expected {size} bytes, got {}", bytes.len()),
                ));
            }
            Ok(())
        }
        (AbiValue::Array(items), DynSolType::Array(inner)) => {
            items.iter().try_for_each(|item| check(item, inner))
        }
        (AbiValue::Array(items), DynSolType::FixedArray(inner, len)) => {
            if items.len() != *len {
                return Err(EncodingError::incompatible(
                    name,
                    format!("array of {}", items.len()),
                    format!("expected {len} elements"),
                ));
            }
            items.iter().try_for_each(|item| check(item, inner))
        }
        (AbiValue::Tuple(items), DynSolType::Tuple(types)) => {
            if items.len() != types.len() {
                return Err(EncodingError::incompatible(
                    name,
                    format!("tuple of {}", items.len()),
                    format!("expected {} components", types.len()),
                ));
            }
            items
                .iter()
                .zip(types)
                .try_for_each(|(item, ty)| check(item, ty))
        }
        (value, ty) => Err(mismatch(ty, value)),
    }
}

fn coerce(ty: &DynSolType, json: &Value) -> Result<AbiValue, EncodingError> {
    let reject =
        |reason: &str| EncodingError::incompatible(ty.sol_type_name(), describe(json), reason);

    let value = match ty {
        DynSolType::Uint(_) => match json {
            Value::Number(n) => n
                .as_u64()
                .map(AbiValue::uint)
                .ok_or_else(|| reject("not a non-negative integer"))?,
            Value::String(s) => {
                AbiValue::Uint(parse_uint(s).ok_or_else(|| reject("not an unsigned integer"))?)
            }
            _ => return Err(reject("expected a number or numeric string")),
        },
        DynSolType::Int(_) => {
            let text = match json {
                Value::Number(n) => n
                    .as_i64()
                    .map(|n| n.to_string())
                    .ok_or_else(|| reject("not an integer"))?,
                Value::String(s) => s.trim().to_string(),
                _ => return Err(reject("expected a number or numeric string")),
            };
            AbiValue::Int(I256::from_dec_str(&text).map_err(|_| reject("not a signed integer"))?)
        }
        DynSolType::Address => match json {
            Value::String(s) => AbiValue::Address(parse_address(s)?),
            _ => return Err(reject("expected an address string")),
        },
        DynSolType::Bool => match json {
            Value::Bool(b) => AbiValue::Bool(*b),
            _ => return Err(reject("expected true or false")),
        },
        DynSolType::String => match json {
            Value::String(s) => AbiValue::String(s.clone()),
            _ => return Err(reject("expected a string")),
        },
        DynSolType::Bytes => match json {
            Value::String(s) => {
                AbiValue::Bytes(parse_hex(s).ok_or_else(|| reject("not 0x-prefixed hex"))?)
            }
            _ => return Err(reject("expected a hex string")),
        },
        DynSolType::FixedBytes(_) => match json {
            Value::String(s) => {
                AbiValue::FixedBytes(parse_hex(s).ok_or_else(|| reject("not 0x-prefixed hex"))?)
            }
            _ => return Err(reject("expected a hex string")),
        },
        DynSolType::Array(inner) | DynSolType::FixedArray(inner, _) => match json {
            Value::Array(items) => AbiValue::Array(
                items
                    .iter()
                    .map(|item| coerce(inner, item))
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err(reject("expected an array")),
        },
        DynSolType::Tuple(types) => match json {
            Value::Array(items) if items.len() == types.len() => AbiValue::Tuple(
                items
                    .iter()
                    .zip(types)
                    .map(|(item, ty)| coerce(ty, item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Array(items) => {
                return Err(reject(&format!(
                    "expected {} components, got {}",
                    types.len(),
                    items.len()
                )))
            }
            _ => return Err(reject("expected an array of tuple components")),
        },
        _ => return Err(reject("unsupported type")),
    };
    Ok(value)
}

/// Assumes `value` already passed [`check`] against `ty`
fn tokenize(value: &AbiValue, ty: &DynSolType) -> Result<DynSolValue, EncodingError> {
    let token = match (value, ty) {
        (AbiValue::Uint(v), DynSolType::Uint(bits)) => DynSolValue::Uint(*v, *bits),
        (AbiValue::Int(v), DynSolType::Int(bits)) => DynSolValue::Int(*v, *bits),
        (AbiValue::Address(a), DynSolType::Address) => DynSolValue::Address(*a),
        (AbiValue::Bool(b), DynSolType::Bool) => DynSolValue::Bool(*b),
        (AbiValue::String(s), DynSolType::String) => DynSolValue::String(s.clone()),
        (AbiValue::Bytes(b), DynSolType::Bytes) => DynSolValue::Bytes(b.clone()),
        (AbiValue::FixedBytes(b), DynSolType::FixedBytes(size)) => {
            DynSolValue::FixedBytes(B256::right_padding_from(b), *size)
        }
        (AbiValue::Array(items), DynSolType::Array(inner)) => DynSolValue::Array(
            items
                .iter()
                .map(|item| tokenize(item, inner))
                .collect::<Result<_, _>>()?,
        ),
        (AbiValue::Array(items), DynSolType::FixedArray(inner, _)) => DynSolValue::FixedArray(
            items
                .iter()
                .map(|item| tokenize(item, inner))
                .collect::<Result<_, _>>()?,
        ),
        (AbiValue::Tuple(items), DynSolType::Tuple(types)) => DynSolValue::Tuple(
            items
                .iter()
                .zip(types)
                .map(|(item, ty)| tokenize(item, ty))
                .collect::<Result<_, _>>()?,
        ),
        (value, ty) => return Err(mismatch(ty, value)),
    };
    Ok(token)
}

/// Parse a `0x`-prefixed 20-byte address
///
/// All-lowercase and all-uppercase hex is accepted as is; mixed case must carry
/// a valid EIP-55 checksum.
///
/// # Errors
/// Returns [`EncodingError::IncompatibleValue`] for a wrong prefix, length or
/// checksum
pub fn parse_address(s: &str) -> Result<Address, EncodingError> {
    let reject = |reason: &str| EncodingError::incompatible(AbiType::address(), s, reason);
    let s = s.trim();
    let body = s.strip_prefix("0x").ok_or_else(|| reject("missing 0x prefix"))?;
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(reject("expected 40 hex characters"));
    }

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(s, None).map_err(|_| reject("invalid EIP-55 checksum"))
    } else {
        Address::from_str(s).map_err(|_| reject("invalid address"))
    }
}

fn parse_uint(s: &str) -> Option<U256> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        if hex.is_empty() {
            return None;
        }
        return U256::from_str_radix(hex, 16).ok();
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    hex::decode(s.trim().strip_prefix("0x")?).ok()
}

fn describe(json: &Value) -> String {
    let text = json.to_string();
    if text.chars().count() > 48 {
        let short: String = text.chars().take(45).collect();
        return format!("{short}...");
    }
    text
}
