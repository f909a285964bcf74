// src/utils/amounts.rs

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::schemas::Balance;

// tolerant hex parser, with or without 0x
pub fn parse_hex_u128(s: &str) -> Option<u128> {
    let x = s.trim();
    let x = x.strip_prefix("0x").unwrap_or(x);
    if x.is_empty() {
        return None;
    }
    u128::from_str_radix(x, 16).ok()
}

/// Lowercase hex without prefix, padded to an even number of digits.
pub fn to_even_hex(v: u128) -> String {
    let s = format!("{v:x}");
    if s.len() % 2 == 1 { format!("0{s}") } else { s }
}

/// Accepts a JSON number, a decimal string or a `0x` hex string.
pub fn balance_from_json(v: &Value) -> Result<Balance> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .map(|x| x as u128)
            .ok_or_else(|| anyhow!("amount {n} is not an unsigned integer")),
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with("0x") {
                parse_hex_u128(s).ok_or_else(|| anyhow!("invalid hex amount '{s}'"))
            } else {
                s.parse::<u128>().map_err(|e| anyhow!("invalid decimal amount '{s}': {e}"))
            }
        }
        other => Err(anyhow!("unexpected amount value {other}")),
    }
}

/// `a - b` as a signed amount; fails when the difference does not fit `i128`.
pub fn signed_diff(a: Balance, b: Balance) -> Result<i128> {
    let out = if a >= b {
        i128::try_from(a - b).ok()
    } else {
        i128::try_from(b - a).ok().map(|d| -d)
    };
    out.ok_or_else(|| anyhow!("difference of {a} and {b} does not fit a signed amount"))
}

/// Render base units with the token's decimals, trimming trailing zeros.
pub fn format_token(amount: Balance, decimals: u32, symbol: &str) -> String {
    let unit = 10u128.pow(decimals);
    let whole = amount / unit;
    let frac = amount % unit;
    if frac == 0 {
        return format!("{whole} {symbol}");
    }
    let frac_str = format!("{frac:0width$}", width = decimals as usize);
    format!("{whole}.{} {symbol}", frac_str.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hex_parsing_is_tolerant() {
        assert_eq!(parse_hex_u128("0x10"), Some(16));
        assert_eq!(parse_hex_u128("e8d4a51000"), Some(1_000_000_000_000));
        assert_eq!(parse_hex_u128(""), None);
        assert_eq!(parse_hex_u128("zz"), None);
    }

    #[test]
    fn even_hex_pads() {
        assert_eq!(to_even_hex(0), "00");
        assert_eq!(to_even_hex(10), "0a");
        assert_eq!(to_even_hex(255), "ff");
        assert_eq!(to_even_hex(256), "0100");
    }

    #[test]
    fn signed_diff_refuses_to_wrap() {
        assert_eq!(signed_diff(0, 5).expect("diff"), -5);
        assert_eq!(signed_diff(9, 4).expect("diff"), 5);
        assert_eq!(signed_diff(i128::MAX as u128 + 1, 1).expect("diff"), i128::MAX);
        assert!(signed_diff(u128::MAX, 0).is_err());
        assert!(signed_diff(0, u128::MAX).is_err());
    }

    #[test]
    fn json_amounts() {
        assert_eq!(balance_from_json(&json!(42)).unwrap(), 42);
        assert_eq!(balance_from_json(&json!("1000000000000")).unwrap(), 1_000_000_000_000);
        assert_eq!(balance_from_json(&json!("0xff")).unwrap(), 255);
        assert!(balance_from_json(&json!(-1)).is_err());
        assert!(balance_from_json(&json!(null)).is_err());
    }

    #[test]
    fn token_formatting() {
        assert_eq!(format_token(1_000_000_000_000, 10, "DOT"), "100 DOT");
        assert_eq!(format_token(15_000_000_000, 10, "DOT"), "1.5 DOT");
        assert_eq!(format_token(1, 12, "KSM"), "0.000000000001 KSM");
        assert_eq!(format_token(0, 12, "KSM"), "0 KSM");
    }
}
