//! Canonical ABI encoding
//!
//! Values are checked against their declared types here, then handed to the
//! `alloy-dyn-abi` encoder as one parameter tuple. The output depends only on
//! the types and values, so re-encoding a recorded call reproduces the queued
//! bytes exactly.

use crate::error::EncodingError;
use crate::types::AbiType;
use crate::value::AbiValue;
use alloy_dyn_abi::DynSolValue;

/// Encode a parameter list as the body of a call (no selector)
///
/// # Errors
/// Returns [`EncodingError::ArityMismatch`] when the lists differ in length and
/// [`EncodingError::Parameter`] when a value does not fit its type
pub fn encode_params(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, EncodingError> {
    if types.len() != values.len() {
        return Err(EncodingError::ArityMismatch {
            expected: types.len(),
            actual: values.len(),
        });
    }
    let tokens = types
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (ty, value))| value.to_dyn(ty).map_err(|e| e.at_parameter(index)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DynSolValue::Tuple(tokens).abi_encode_params())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn types(list: &str) -> Vec<AbiType> {
        AbiType::parse_list(list).unwrap()
    }

    fn words(hex_words: &[&str]) -> String {
        hex_words.concat()
    }

    #[test]
    fn static_params() {
        let encoded = encode_params(
            &types("uint32,bool"),
            &[AbiValue::uint(69), AbiValue::Bool(true)],
        )
        .unwrap();
        assert_eq!(
            hex::encode(encoded),
            words(&[
                "0000000000000000000000000000000000000000000000000000000000000045",
                "0000000000000000000000000000000000000000000000000000000000000001",
            ])
        );
    }

    #[test]
    fn dynamic_bytes_and_array() {
        let encoded = encode_params(
            &types("bytes,bool,uint256[]"),
            &[
                AbiValue::Bytes(b"dave".to_vec()),
                AbiValue::Bool(true),
                AbiValue::Array(vec![AbiValue::uint(1), AbiValue::uint(2), AbiValue::uint(3)]),
            ],
        )
        .unwrap();
        assert_eq!(
            hex::encode(encoded),
            words(&[
                "0000000000000000000000000000000000000000000000000000000000000060",
                "0000000000000000000000000000000000000000000000000000000000000001",
                "00000000000000000000000000000000000000000000000000000000000000a0",
                "0000000000000000000000000000000000000000000000000000000000000004",
                "6461766500000000000000000000000000000000000000000000000000000000",
                "0000000000000000000000000000000000000000000000000000000000000003",
                "0000000000000000000000000000000000000000000000000000000000000001",
                "0000000000000000000000000000000000000000000000000000000000000002",
                "0000000000000000000000000000000000000000000000000000000000000003",
            ])
        );
    }

    #[test]
    fn mixed_static_and_dynamic() {
        let encoded = encode_params(
            &types("uint256,uint32[],bytes10,bytes"),
            &[
                AbiValue::uint(0x123),
                AbiValue::Array(vec![AbiValue::uint(0x456), AbiValue::uint(0x789)]),
                AbiValue::FixedBytes(b"1234567890".to_vec()),
                AbiValue::Bytes(b"Hello, world!".to_vec()),
            ],
        )
        .unwrap();
        assert_eq!(
            hex::encode(encoded),
            words(&[
                "0000000000000000000000000000000000000000000000000000000000000123",
                "0000000000000000000000000000000000000000000000000000000000000080",
                "3132333435363738393000000000000000000000000000000000000000000000",
                "00000000000000000000000000000000000000000000000000000000000000e0",
                "0000000000000000000000000000000000000000000000000000000000000002",
                "0000000000000000000000000000000000000000000000000000000000000456",
                "0000000000000000000000000000000000000000000000000000000000000789",
                "000000000000000000000000000000000000000000000000000000000000000d",
                "48656c6c6f2c20776f726c642100000000000000000000000000000000000000",
            ])
        );
    }

    #[test]
    fn negative_int_is_sign_extended() {
        let value = AbiValue::Int(alloy_primitives::I256::from_dec_str("-1").unwrap());
        let encoded = encode_params(&types("int8"), &[value]).unwrap();
        assert_eq!(encoded, vec![0xff; 32]);
    }

    #[test]
    fn empty_string_is_a_single_length_word() {
        let encoded = encode_params(&types("string"), &[AbiValue::String(String::new())]).unwrap();
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 0x20);
        assert!(encoded[32..].iter().all(|b| *b == 0));
    }

    #[test]
    fn arity_mismatch() {
        let err = encode_params(&types("uint256,bool"), &[AbiValue::uint(1)]).unwrap_err();
        assert_eq!(err, EncodingError::ArityMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn type_errors_carry_parameter_index() {
        let err = encode_params(&types("uint256,bool"), &[AbiValue::uint(1), AbiValue::uint(2)])
            .unwrap_err();
        assert!(matches!(err, EncodingError::Parameter { index: 1, .. }));
    }
}
