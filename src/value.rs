//! Value types and typed literal parsing.
//!
//! The extractor hands back raw literal text; this module turns it into a
//! [`TweakValue`] of the entry's declared [`TweakType`]. Numeric parsing
//! accepts the longest valid prefix, so trailing suffixes such as `1.5f` or
//! `10u` still yield a number.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a tweak variable. Fixed for the lifetime of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TweakType {
    Int,
    Float,
    String,
}

impl TweakType {
    /// Value an entry holds before any literal was successfully read.
    pub fn zero(self) -> TweakValue {
        match self {
            TweakType::Int => TweakValue::Int(0),
            TweakType::Float => TweakValue::Float(0.0),
            TweakType::String => TweakValue::String(String::new()),
        }
    }
}

impl fmt::Display for TweakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TweakType::Int => "int",
            TweakType::Float => "float",
            TweakType::String => "string",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TweakType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "i64" | "integer" => Ok(TweakType::Int),
            "float" | "f64" | "double" => Ok(TweakType::Float),
            "string" | "str" | "char_ptr" => Ok(TweakType::String),
            other => Err(format!("unknown tweak type '{other}' (expected int, float or string)")),
        }
    }
}

/// Current value of a tweak. The variant always matches the entry's [`TweakType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum TweakValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl TweakValue {
    pub fn kind(&self) -> TweakType {
        match self {
            TweakValue::Int(_) => TweakType::Int,
            TweakValue::Float(_) => TweakType::Float,
            TweakValue::String(_) => TweakType::String,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            TweakValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            TweakValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TweakValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Equality that treats two identical NaN payloads as the same value.
    pub fn same_as(&self, other: &TweakValue) -> bool {
        match (self, other) {
            (TweakValue::Float(a), TweakValue::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for TweakValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TweakValue::Int(v) => write!(f, "{v}"),
            TweakValue::Float(v) => write!(f, "{v}"),
            TweakValue::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// Parse literal text as a value of type `ty`.
///
/// Returns `None` when nothing usable could be parsed; callers keep the
/// previous value in that case.
pub fn parse_literal(ty: TweakType, literal: &str) -> Option<TweakValue> {
    match ty {
        TweakType::Int => parse_int_prefix(literal).map(TweakValue::Int),
        TweakType::Float => parse_float_prefix(literal).map(TweakValue::Float),
        TweakType::String => unquote(literal).map(|s| TweakValue::String(s.to_string())),
    }
}

/// Integer with base detection: `0x`/`0X` is hex, a leading `0` is octal,
/// anything else decimal. An optional sign is allowed. Digits are consumed
/// until the first character that is not valid in the detected base.
///
/// Out-of-range literals saturate to `i64::MIN` / `i64::MAX`.
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let (radix, digits) = if let Some(hex) = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
        .filter(|h| h.starts_with(|c: char| c.is_ascii_hexdigit()))
    {
        (16, hex)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());

    // A lone "0" followed by a non-octal digit still reads as zero.
    if end == 0 && radix != 8 {
        return None;
    }

    let magnitude = digits[..end]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(u64::from(radix))
                .saturating_add(u64::from(d))
        });

    let signed = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    Some(signed.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
}

/// Floating point literal, longest-prefix.
///
/// Handles an optional sign, digits with an optional fraction, and an
/// optional exponent, plus `inf`/`infinity`/`nan` in any case. C-style
/// suffixes like `f` are ignored because they end the prefix. Hexadecimal
/// floats (`0x1p3`) are not recognized; they read as `0`.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    if let Some(special) = parse_special_float(&text[end..]) {
        return Some(if bytes.first() == Some(&b'-') {
            -special
        } else {
            special
        });
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return None;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse().ok()
}

fn parse_special_float(text: &str) -> Option<f64> {
    let starts_with = |word: &str| {
        text.get(..word.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(word))
    };
    if starts_with("inf") {
        Some(f64::INFINITY)
    } else if starts_with("nan") {
        Some(f64::NAN)
    } else {
        None
    }
}

/// Text between the first and the last double quote.
///
/// Requires two distinct quote characters; anything else is rejected rather
/// than sliced.
pub fn unquote(literal: &str) -> Option<&str> {
    let start = literal.find('"')?;
    let end = literal.rfind('"')?;
    if end <= start {
        return None;
    }
    Some(&literal[start + 1..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bases() {
        assert_eq!(parse_int_prefix("42"), Some(42));
        assert_eq!(parse_int_prefix("  -17"), Some(-17));
        assert_eq!(parse_int_prefix("+5"), Some(5));
        assert_eq!(parse_int_prefix("0x1F"), Some(31));
        assert_eq!(parse_int_prefix("0XfF"), Some(255));
        assert_eq!(parse_int_prefix("017"), Some(15));
        assert_eq!(parse_int_prefix("0"), Some(0));
    }

    #[test]
    fn test_int_prefix_and_failures() {
        assert_eq!(parse_int_prefix("10u"), Some(10));
        assert_eq!(parse_int_prefix("3 /* frames */"), Some(3));
        assert_eq!(parse_int_prefix("09"), Some(0));
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix("-"), None);
    }

    #[test]
    fn test_int_limits_saturate() {
        assert_eq!(parse_int_prefix("-9223372036854775808"), Some(i64::MIN));
        assert_eq!(parse_int_prefix("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_int_prefix("99999999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_int_prefix("-0xFFFFFFFFFFFFFFFFFF"), Some(i64::MIN));
    }

    #[test]
    fn test_float_specials() {
        assert_eq!(parse_float_prefix("inf"), Some(f64::INFINITY));
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
        assert!(parse_float_prefix("NaN").is_some_and(f64::is_nan));
        assert_eq!(parse_float_prefix("0x1p3"), Some(0.0));
        assert_eq!(parse_float_prefix("info"), Some(f64::INFINITY));
        assert_eq!(parse_float_prefix("in"), None);

        let nan = TweakValue::Float(f64::NAN);
        assert!(nan.same_as(&nan.clone()));
        assert!(!nan.same_as(&TweakValue::Float(1.0)));
    }

    #[test]
    fn test_float_prefix() {
        assert_eq!(parse_float_prefix("2500"), Some(2500.0));
        assert_eq!(parse_float_prefix("1.2f"), Some(1.2));
        assert_eq!(parse_float_prefix("-.5"), Some(-0.5));
        assert_eq!(parse_float_prefix("3."), Some(3.0));
        assert_eq!(parse_float_prefix("1e3"), Some(1000.0));
        assert_eq!(parse_float_prefix("2.5E-1"), Some(0.25));
        // Dangling exponent marker is not part of the number
        assert_eq!(parse_float_prefix("4e"), Some(4.0));
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("pi"), None);
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"world\""), Some("world"));
        assert_eq!(unquote("  \"a b\"  "), Some("a b"));
        assert_eq!(unquote("\"\""), Some(""));
        assert_eq!(unquote("\"unterminated"), None);
        assert_eq!(unquote("bare"), None);
    }

    #[test]
    fn test_parse_literal_matches_type() {
        assert_eq!(parse_literal(TweakType::Int, "7"), Some(TweakValue::Int(7)));
        assert_eq!(
            parse_literal(TweakType::Float, "0.5"),
            Some(TweakValue::Float(0.5))
        );
        assert_eq!(
            parse_literal(TweakType::String, "\"mars\""),
            Some(TweakValue::String("mars".to_string()))
        );
        assert_eq!(parse_literal(TweakType::Int, ""), None);
    }

    #[test]
    fn test_type_from_str() {
        assert_eq!("int".parse::<TweakType>().unwrap(), TweakType::Int);
        assert_eq!("char_ptr".parse::<TweakType>().unwrap(), TweakType::String);
        assert_eq!("Float".parse::<TweakType>().unwrap(), TweakType::Float);
        assert!("bool".parse::<TweakType>().is_err());
    }
}
