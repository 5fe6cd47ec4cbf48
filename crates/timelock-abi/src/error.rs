//! Error types for call encoding
//!
//! Every failure raised while turning a signature and parameter list into
//! calldata is an [`EncodingError`]. None of them are retryable: the caller has
//! to fix the operation definition.

/// Errors raised while parsing types or encoding parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// Type tag is not part of the supported ABI grammar
    #[error("invalid ABI type '{0}'")]
    InvalidType(String),

    /// Function signature could not be parsed
    #[error("invalid signature '{signature}': {reason}")]
    InvalidSignature {
        /// The signature as supplied
        signature: String,
        /// Why it was rejected
        reason: String,
    },

    /// The types embedded in the signature disagree with the explicit type list
    #[error("signature {signature} declares ({declared}) but paramTypes are ({provided})")]
    EncodingMismatch {
        /// Canonical signature
        signature: String,
        /// Canonical types parsed from the signature
        declared: String,
        /// Canonical types from the explicit list
        provided: String,
    },

    /// Parameter count differs from type count
    #[error("expected {expected} parameters, got {actual}")]
    ArityMismatch {
        /// Number of declared types
        expected: usize,
        /// Number of supplied values
        actual: usize,
    },

    /// A value cannot be represented as its declared type
    #[error("value {value} is not a valid {ty}: {reason}")]
    IncompatibleValue {
        /// Canonical type name
        ty: String,
        /// Short rendering of the offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Wraps an error with the position of the parameter that caused it
    #[error("parameter {index}: {source}")]
    Parameter {
        /// Zero-based parameter index
        index: usize,
        /// Underlying failure
        #[source]
        source: Box<EncodingError>,
    },
}

impl EncodingError {
    /// Create an incompatible-value error
    pub fn incompatible(
        ty: impl std::fmt::Display,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::IncompatibleValue {
            ty: ty.to_string(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Attach a parameter index
    #[must_use]
    pub fn at_parameter(self, index: usize) -> Self {
        Self::Parameter {
            index,
            source: Box::new(self),
        }
    }

    /// True when the failure is the signature/type-list disagreement
    #[inline]
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        match self {
            Self::EncodingMismatch { .. } => true,
            Self::Parameter { source, .. } => source.is_mismatch(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_context_is_rendered() {
        let err = EncodingError::incompatible("uint8", "300", "out of range").at_parameter(2);
        assert_eq!(
            err.to_string(),
            "parameter 2: value 300 is not a valid uint8: out of range"
        );
        assert!(!err.is_mismatch());
    }

    #[test]
    fn mismatch_is_detected_through_wrapping() {
        let err = EncodingError::EncodingMismatch {
            signature: "f(uint256)".to_string(),
            declared: "uint256".to_string(),
            provided: "address".to_string(),
        };
        assert!(err.clone().at_parameter(0).is_mismatch());
        assert!(err.is_mismatch());
    }
}
