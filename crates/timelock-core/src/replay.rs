//! Replay command rendering
//!
//! Produces one ethers.js statement that performs the same execute call the
//! execute phase would perform, for manual execution or audit:
//!
//! ```text
//! await timelock.executeTransaction('0x5aAe…', '0', 'setFee(uint256)', ethers.utils.defaultAbiCoder.encode(['uint256'], [150]), 1700086400);
//! ```
//!
//! Quoting rules for parameters:
//! - strings, addresses and byte strings are single-quoted
//! - integers are bare inside JavaScript's safe integer range, quoted beyond it
//! - arrays and tuples are bracketed lists
//!
//! Rendering is a pure function of its inputs.

use std::fmt::Write;
use timelock_abi::{AbiValue, Address, Call, MAX_SAFE_INTEGER, U256};

/// Name of the contract handle in the rendered statement
pub const CONTRACT_HANDLE: &str = "timelock";

/// Render the execute call for `(target, value, call, maturity_time)`
#[must_use]
pub fn render(target: Address, value: U256, call: &Call, maturity_time: u64) -> String {
    let types = call
        .param_type_names()
        .iter()
        .map(|t| quote(t))
        .collect::<Vec<_>>()
        .join(", ");
    let params = call
        .params()
        .iter()
        .map(literal)
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = format!(
        "await {CONTRACT_HANDLE}.executeTransaction({}, {}, {}, ethers.utils.defaultAbiCoder.encode([{types}], [{params}]), {maturity_time}",
        quote(&target.to_checksum(None)),
        quote(&value.to_string()),
        quote(&call.signature().canonical()),
    );
    if value > U256::ZERO {
        let _ = write!(out, ", {{ value: {} }}", quote(&value.to_string()));
    }
    out.push_str(");");
    out
}

/// JavaScript literal for one parameter value
fn literal(value: &AbiValue) -> String {
    match value {
        AbiValue::Uint(v) => integer(*v > U256::from(MAX_SAFE_INTEGER), v.to_string()),
        AbiValue::Int(v) => integer(v.unsigned_abs() > U256::from(MAX_SAFE_INTEGER), v.to_string()),
        AbiValue::Address(a) => quote(&a.to_checksum(None)),
        AbiValue::Bool(b) => b.to_string(),
        AbiValue::String(s) => quote(s),
        AbiValue::Bytes(b) | AbiValue::FixedBytes(b) => quote(&format!("0x{}", hex::encode(b))),
        AbiValue::Array(items) | AbiValue::Tuple(items) => {
            format!("[{}]", items.iter().map(literal).collect::<Vec<_>>().join(", "))
        }
    }
}

fn integer(quoted: bool, digits: String) -> String {
    if quoted {
        quote(&digits)
    } else {
        digits
    }
}

/// Single-quoted JavaScript string literal
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use timelock_abi::{parse_address, I256};

    const FEE_CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn target() -> Address {
        parse_address(FEE_CONTRACT).unwrap()
    }

    #[test]
    fn renders_set_fee() {
        let call = Call::new("setFee(uint256)", &["uint256"], vec![AbiValue::uint(150)]).unwrap();
        assert_eq!(
            render(target(), U256::ZERO, &call, 1_700_086_400),
            "await timelock.executeTransaction('0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed', '0', \
             'setFee(uint256)', ethers.utils.defaultAbiCoder.encode(['uint256'], [150]), 1700086400);"
        );
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        let call = Call::new("setName(string)", &["string"], vec!["it's a \\ test\n".into()]).unwrap();
        let out = render(target(), U256::ZERO, &call, 1);
        assert!(out.contains(r"['it\'s a \\ test\n']"), "{out}");
    }

    #[test]
    fn quotes_large_integers_and_bytes() {
        let big = U256::from(MAX_SAFE_INTEGER) + U256::from(1u64);
        let call = Call::new(
            "f(uint256,int64,bytes,bool)",
            &["uint256", "int64", "bytes", "bool"],
            vec![
                AbiValue::Uint(big),
                AbiValue::Int(I256::from_dec_str("-5").unwrap()),
                AbiValue::Bytes(vec![0xde, 0xad]),
                true.into(),
            ],
        )
        .unwrap();
        let out = render(target(), U256::ZERO, &call, 1);
        assert!(out.contains("['9007199254740992', -5, '0xdead', true]"), "{out}");
    }

    #[test]
    fn brackets_arrays_and_tuples() {
        let call = Call::new(
            "route((address,uint16)[])",
            &["(address,uint16)[]"],
            vec![AbiValue::Array(vec![AbiValue::Tuple(vec![target().into(), AbiValue::uint(3)])])],
        )
        .unwrap();
        let out = render(target(), U256::ZERO, &call, 1);
        assert!(out.contains(&format!("[[['{FEE_CONTRACT}', 3]]]")), "{out}");
        assert!(out.contains("['(address,uint16)[]']"), "{out}");
    }

    #[test]
    fn attaches_value_override() {
        let call = Call::new("deposit()", &[] as &[&str], vec![]).unwrap();
        let out = render(target(), U256::from(10u64), &call, 1);
        assert!(out.ends_with("encode([], []), 1, { value: '10' });"), "{out}");
    }

    proptest! {
        #[test]
        fn rendering_is_idempotent(s in ".*", n in any::<u64>(), eta in any::<u64>()) {
            let call = Call::new(
                "f(string,uint64)",
                &["string", "uint64"],
                vec![AbiValue::String(s), AbiValue::uint(n)],
            )
            .unwrap();
            let first = render(target(), U256::ZERO, &call, eta);
            let second = render(target(), U256::ZERO, &call, eta);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn quoted_strings_never_end_early(s in ".*") {
            let quoted = quote(&s);
            let inner = &quoted[1..quoted.len() - 1];
            let mut escaped = false;
            for c in inner.chars() {
                prop_assert!(escaped || c != '\'');
                escaped = !escaped && c == '\\';
            }
            prop_assert!(!escaped);
        }
    }
}
