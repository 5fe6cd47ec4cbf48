//! Timelock ABI - contract-call encoding
//!
//! Turns a human-readable function signature and a typed parameter list into
//! the byte payload a delay contract forwards to its target:
//! - [`AbiType`]: parsed type tags (`uint256`, `(address,bytes)[]`, ...)
//! - [`Signature`]: `name(types)` with canonical form and selector
//! - [`AbiValue`]: tagged-union parameter values with JSON coercion
//! - [`Call`]: a validated `(signature, types, values)` triple
//!
//! # Example
//!
//! ```rust
//! use timelock_abi::{AbiValue, Call};
//!
//! let call = Call::new("setFee(uint256)", &["uint256"], vec![AbiValue::uint(150)]).unwrap();
//! let data = call.encode().unwrap();
//! assert_eq!(data.len(), 32);
//! assert_eq!(data[31], 150);
//! ```

#![warn(unreachable_pub)]

pub mod call;
pub mod encode;
pub mod error;
pub mod signature;
pub mod types;
pub mod value;

pub use call::{encode, Call};
pub use encode::encode_params;
pub use error::EncodingError;
pub use signature::Signature;
pub use types::AbiType;
pub use value::{parse_address, AbiValue, MAX_SAFE_INTEGER};

pub use alloy_primitives::{Address, I256, U256};
