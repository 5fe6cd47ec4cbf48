//! Validated contract calls
//!
//! A [`Call`] can only be built when the signature, the explicit type list and
//! the values all agree, so holding one is proof that it encodes.

use crate::encode::encode_params;
use crate::error::EncodingError;
use crate::signature::Signature;
use crate::types::AbiType;
use crate::value::AbiValue;
use serde_json::Value;

/// A function call ready for encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    signature: Signature,
    params: Vec<AbiValue>,
}

impl Call {
    /// Build a call from typed values
    ///
    /// # Errors
    /// - [`EncodingError::InvalidSignature`] / [`EncodingError::InvalidType`] on
    ///   malformed input
    /// - [`EncodingError::EncodingMismatch`] when `param_types` disagrees with
    ///   the types in `signature`
    /// - [`EncodingError::ArityMismatch`] or [`EncodingError::Parameter`] when the
    ///   values do not fit
    pub fn new<S: AsRef<str>>(
        signature: &str,
        param_types: &[S],
        params: Vec<AbiValue>,
    ) -> Result<Self, EncodingError> {
        let signature = checked_signature(signature, param_types)?;
        if params.len() != signature.inputs().len() {
            return Err(EncodingError::ArityMismatch {
                expected: signature.inputs().len(),
                actual: params.len(),
            });
        }
        for (index, (value, ty)) in params.iter().zip(signature.inputs()).enumerate() {
            value.type_check(ty).map_err(|e| e.at_parameter(index))?;
        }
        Ok(Self { signature, params })
    }

    /// Build a call from loosely typed JSON parameters
    ///
    /// # Errors
    /// Same as [`Call::new`]; JSON values that cannot be coerced to their
    /// declared type are reported with their parameter index
    pub fn from_json<S: AsRef<str>>(
        signature: &str,
        param_types: &[S],
        params: &[Value],
    ) -> Result<Self, EncodingError> {
        let parsed = checked_signature(signature, param_types)?;
        if params.len() != parsed.inputs().len() {
            return Err(EncodingError::ArityMismatch {
                expected: parsed.inputs().len(),
                actual: params.len(),
            });
        }
        let params = params
            .iter()
            .zip(parsed.inputs())
            .enumerate()
            .map(|(index, (json, ty))| {
                AbiValue::from_json(ty, json).map_err(|e| e.at_parameter(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            signature: parsed,
            params,
        })
    }

    /// Parsed signature
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declared parameter types
    #[inline]
    #[must_use]
    pub fn param_types(&self) -> &[AbiType] {
        self.signature.inputs()
    }

    /// Canonical type tags, in order
    #[must_use]
    pub fn param_type_names(&self) -> Vec<String> {
        self.param_types().iter().map(ToString::to_string).collect()
    }

    /// Typed parameter values
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[AbiValue] {
        &self.params
    }

    /// Parameters in canonical JSON form
    #[must_use]
    pub fn params_json(&self) -> Vec<Value> {
        self.params.iter().map(AbiValue::to_json).collect()
    }

    /// Encoded parameters, as passed in the delay contract's `data` field
    ///
    /// # Errors
    /// Only fails if the call was mutated into an inconsistent state, which the
    /// constructors prevent
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        encode_params(self.signature.inputs(), &self.params)
    }

    /// Selector followed by the encoded parameters
    ///
    /// # Errors
    /// See [`Call::encode`]
    pub fn calldata(&self) -> Result<Vec<u8>, EncodingError> {
        let mut out = self.signature.selector().to_vec();
        out.extend(self.encode()?);
        Ok(out)
    }
}

/// Parse `signature` and verify it against the explicit type list
fn checked_signature<S: AsRef<str>>(
    signature: &str,
    param_types: &[S],
) -> Result<Signature, EncodingError> {
    let parsed: Signature = signature.parse()?;
    let provided = param_types
        .iter()
        .map(|t| t.as_ref().parse::<AbiType>())
        .collect::<Result<Vec<_>, _>>()?;

    if provided.as_slice() != parsed.inputs() {
        let join = |types: &[AbiType]| {
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        return Err(EncodingError::EncodingMismatch {
            signature: parsed.canonical(),
            declared: join(parsed.inputs()),
            provided: join(&provided),
        });
    }
    Ok(parsed)
}

/// Encode `params` for `signature`, checking `param_types` against it
///
/// Stateless convenience over [`Call::new`] followed by [`Call::encode`].
///
/// # Errors
/// See [`Call::new`]
pub fn encode(
    signature: &str,
    param_types: &[&str],
    params: Vec<AbiValue>,
) -> Result<Vec<u8>, EncodingError> {
    Call::new(signature, param_types, params)?.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn explicit_types_must_match_signature() {
        let err = Call::new("setFee(uint256)", &["address"], vec![AbiValue::uint(1)]).unwrap_err();
        assert!(err.is_mismatch());
        assert!(err.to_string().contains("setFee(uint256)"));
    }

    #[test]
    fn aliases_count_as_matching() {
        let call = Call::new("setFee(uint)", &["uint256"], vec![AbiValue::uint(150)]).unwrap();
        assert_eq!(call.signature().canonical(), "setFee(uint256)");
    }

    #[test]
    fn json_params_coerced_and_indexed() {
        let call = Call::from_json(
            "setRoute(address,uint16[])",
            &["address", "uint16[]"],
            &[json!("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"), json!([1, "2"])],
        )
        .unwrap();
        assert_eq!(call.params().len(), 2);

        let err = Call::from_json("setFee(uint8)", &["uint8"], &[json!(1000)]).unwrap_err();
        assert!(matches!(err, EncodingError::Parameter { index: 0, .. }));
    }

    #[test]
    fn calldata_prefixes_selector() {
        let call = Call::new("baz(uint32,bool)", &["uint32", "bool"], vec![AbiValue::uint(69), true.into()])
            .unwrap();
        let calldata = call.calldata().unwrap();
        assert_eq!(hex::encode(&calldata[..4]), "cdcd77c0");
        assert_eq!(&calldata[4..], call.encode().unwrap().as_slice());
    }

    #[test]
    fn free_function_matches_call() {
        let direct = encode("setFee(uint256)", &["uint256"], vec![AbiValue::uint(150)]).unwrap();
        assert_eq!(direct.len(), 32);
        assert_eq!(direct[31], 150);
    }
}
