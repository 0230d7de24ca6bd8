//! Instrument symbol conventions
//!
//! Broker symbols are hyphen-delimited, e.g. `MERV - XMEV - GFGC6263OC - 24hs`:
//! market, segment, contract code, settlement. Option side and strike are read
//! from the contract code (third part).

use serde::{Serialize, Serializer};
use std::fmt;

/// Contract code prefix for listed calls on the underlying
pub const CALL_PREFIX: &str = "GFGC";
/// Contract code prefix for listed puts on the underlying
pub const PUT_PREFIX: &str = "GFGV";

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

/// Strike price held as integer tenths so equal strikes compare exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Strike(u64);

impl Strike {
    #[inline(always)]
    pub const fn from_tenths(tenths: u64) -> Self {
        Self(tenths)
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

impl fmt::Display for Strike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

impl Serialize for Strike {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// Contract code of a symbol
///
/// The third hyphen part when the symbol is in spaced form (`X - Y - CODE - T`);
/// otherwise the whole symbol, so `MERV-XMEV-GFGC1000X-24hs` is one code.
pub fn contract_code(symbol: &str) -> &str {
    if !symbol.contains(" - ") {
        return symbol.trim();
    }
    match symbol.split('-').nth(2) {
        Some(part) => part.trim(),
        None => symbol.trim(),
    }
}

/// Call codes contain a `C` and no `V`
pub fn is_call_code(symbol: &str) -> bool {
    let code = contract_code(symbol).to_ascii_uppercase();
    code.contains('C') && !code.contains('V')
}

/// Put codes contain a `V`
pub fn is_put_code(symbol: &str) -> bool {
    contract_code(symbol).to_ascii_uppercase().contains('V')
}

/// Strike embedded in the contract code: its digits divided by 10
///
/// Returns `None` when the symbol has no third part or the part has no digits.
pub fn parse_strike(symbol: &str) -> Option<Strike> {
    let middle = symbol.split('-').nth(2)?;
    let digits: String = middle.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().map(Strike::from_tenths)
}

/// True for listed options on the underlying (`X - X - GFGC… - X` / `GFGV…`)
pub fn is_underlying_option(symbol: &str) -> bool {
    if !symbol.contains(" - ") {
        return false;
    }
    match symbol.split(" - ").nth(2) {
        Some(code) => {
            let code = code.trim().to_ascii_uppercase();
            code.starts_with(CALL_PREFIX) || code.starts_with(PUT_PREFIX)
        }
        None => false,
    }
}

/// Drop the `MERV - XMEV` market prefix for display: `X - T`
pub fn clean_symbol(symbol: &str) -> String {
    let parts: Vec<&str> = symbol.split('-').map(str::trim).collect();
    if parts.len() >= 4 && parts[0] == "MERV" && parts[1] == "XMEV" {
        return format!("{} - {}", parts[2], parts[3]);
    }
    symbol.to_string()
}

/// Split free text into tickers: one per line and/or comma separated
pub fn parse_input_tickers(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALL: &str = "MERV - XMEV - GFGC6263OC - 24hs";
    const PUT: &str = "MERV - XMEV - GFGV6263OC - 24hs";

    #[test]
    fn test_side_classification() {
        assert!(is_call_code(CALL));
        assert!(!is_put_code(CALL));
        assert!(is_put_code(PUT));
        assert!(!is_call_code(PUT));

        let note = "MERV - XMEV - S15G5 - 24hs";
        assert!(!is_call_code(note));
        assert!(!is_put_code(note));
    }

    #[test]
    fn test_contract_code_needs_spaced_separator() {
        assert_eq!(contract_code("GFGC1000X"), "GFGC1000X");
        assert!(is_call_code("GFGC1000X"));
        assert_eq!(contract_code(CALL), "GFGC6263OC");

        // unspaced symbols are classified as a whole: the V in XMEV makes a put
        let unspaced = "MERV-XMEV-GFGC1000X-24hs";
        assert_eq!(contract_code(unspaced), unspaced);
        assert!(is_put_code(unspaced));
        assert!(!is_call_code(unspaced));
    }

    #[test]
    fn test_parse_strike() {
        assert_eq!(parse_strike(CALL), Some(Strike::from_tenths(6263)));
        assert!((parse_strike(CALL).unwrap().as_f64() - 626.3).abs() < 1e-9);
        assert_eq!(parse_strike("MERV - XMEV - GFGC1000X - 24hs").unwrap().as_f64(), 100.0);
    }

    #[test]
    fn test_parse_strike_unknown() {
        assert_eq!(parse_strike("MERV - XMEV - GFGCABC - 24hs"), None);
        assert_eq!(parse_strike("GFGC1000"), None);
        assert_eq!(parse_strike(""), None);
    }

    #[test]
    fn test_strike_ordering_and_display() {
        let a = Strike::from_tenths(9995);
        let b = Strike::from_tenths(10000);
        assert!(a < b);
        assert_eq!(b.to_string(), "1000.00");
    }

    #[test]
    fn test_is_underlying_option() {
        assert!(is_underlying_option(CALL));
        assert!(is_underlying_option(PUT));
        assert!(!is_underlying_option("MERV - XMEV - GGAL - 24hs"));
        assert!(!is_underlying_option("GFGC6263OC"));
    }

    #[test]
    fn test_clean_symbol() {
        assert_eq!(clean_symbol("MERV - XMEV - S15G5 - 24hs"), "S15G5 - 24hs");
        assert_eq!(clean_symbol("S15G5 - 24hs"), "S15G5 - 24hs");
        assert_eq!(clean_symbol("ROFX - DLR - X - Y"), "ROFX - DLR - X - Y");
    }

    #[test]
    fn test_parse_input_tickers() {
        let text = "A, B\n\n C ,,D\n";
        assert_eq!(parse_input_tickers(text), vec!["A", "B", "C", "D"]);
        assert!(parse_input_tickers("").is_empty());
    }
}
