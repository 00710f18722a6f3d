//! Parsing recognized text into a decimal value.
//!
//! Currency amounts arrive in mixed locales: "€12,50", "1.234,56",
//! "1,234.56", "$500". The separator roles are inferred from position — a
//! trailing group of one or two digits after the last separator is the
//! decimal part, everything else is grouping.

use std::sync::LazyLock;

use regex::Regex;

use super::FieldKind;

/// First run of digits with optional interior separators.
static AMOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.,]*").expect("amount pattern is valid"));

/// Parses `raw` into a decimal value for the given field kind.
///
/// Returns `None` when no digit run is present or when the integer part
/// exceeds the field's digit budget — out-of-bounds values are rejected,
/// never clamped into range.
pub fn parse_value(raw: &str, kind: FieldKind) -> Option<f64> {
    let candidate = AMOUNT_PATTERN.find(raw)?.as_str();

    let (integer_digits, decimal_digits) = split_separators(candidate);
    if integer_digits.is_empty() || integer_digits.len() > kind.max_integer_digits() {
        return None;
    }

    let integer: u64 = integer_digits.parse().ok()?;
    let fraction = match decimal_digits {
        None => 0.0,
        Some(d) => {
            let numerator: u64 = d.parse().ok()?;
            numerator as f64 / 10f64.powi(d.len() as i32)
        }
    };
    Some(integer as f64 + fraction)
}

/// Splits a digit run with separators into (integer digits, decimal digits).
///
/// The group after the last separator is the decimal part only if it holds
/// one or two digits; three-digit groups are thousands grouping ("1,234" is
/// 1234, "12,50" is 12.50).
fn split_separators(candidate: &str) -> (String, Option<String>) {
    let groups: Vec<&str> = candidate.split(['.', ',']).collect();
    if groups.len() == 1 {
        return (groups[0].to_string(), None);
    }

    let last = groups[groups.len() - 1];
    if !last.is_empty() && last.len() <= 2 {
        let integer: String = groups[..groups.len() - 1].concat();
        (integer, Some(last.to_string()))
    } else {
        (groups.concat(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euro_comma_decimal() {
        assert_eq!(parse_value("€12,50", FieldKind::Bet), Some(12.50));
    }

    #[test]
    fn test_plain_integer() {
        assert_eq!(parse_value("500", FieldKind::Win), Some(500.0));
    }

    #[test]
    fn test_dollar_point_decimal() {
        assert_eq!(parse_value("$3.75", FieldKind::Bet), Some(3.75));
    }

    #[test]
    fn test_thousands_grouping_comma() {
        assert_eq!(parse_value("1,234", FieldKind::Balance), Some(1234.0));
    }

    #[test]
    fn test_mixed_locale_grouping_and_decimal() {
        assert_eq!(parse_value("1.234,56", FieldKind::Balance), Some(1234.56));
        assert_eq!(parse_value("1,234.56", FieldKind::Balance), Some(1234.56));
    }

    #[test]
    fn test_single_decimal_digit() {
        assert_eq!(parse_value("7,5", FieldKind::Bet), Some(7.5));
    }

    #[test]
    fn test_no_digits_is_absent() {
        assert_eq!(parse_value("abc", FieldKind::Bet), None);
        assert_eq!(parse_value("", FieldKind::Bet), None);
        assert_eq!(parse_value("€--", FieldKind::Bet), None);
    }

    #[test]
    fn test_bet_digit_budget_enforced() {
        // Five integer digits exceed the Bet/Win budget of four.
        assert_eq!(parse_value("12345", FieldKind::Bet), None);
        assert_eq!(parse_value("9999", FieldKind::Bet), Some(9999.0));
    }

    #[test]
    fn test_balance_digit_budget_enforced() {
        assert_eq!(parse_value("123456", FieldKind::Balance), Some(123456.0));
        assert_eq!(parse_value("1234567", FieldKind::Balance), None);
        // Grouping separators do not count against the budget.
        assert_eq!(parse_value("123.456", FieldKind::Balance), Some(123456.0));
    }

    #[test]
    fn test_rejected_not_clamped() {
        // Over-budget Bet value must not come back truncated to 4 digits.
        assert_ne!(parse_value("99999", FieldKind::Bet), Some(9999.0));
        assert_eq!(parse_value("99999", FieldKind::Bet), None);
    }

    #[test]
    fn test_leading_noise_skipped() {
        assert_eq!(parse_value("Balance: 1500", FieldKind::Balance), Some(1500.0));
    }

    #[test]
    fn test_trailing_separator_is_grouping() {
        // OCR sometimes drops the decimal digits; "12," has an empty last
        // group and is treated as the integer 12.
        assert_eq!(parse_value("12,", FieldKind::Bet), Some(12.0));
    }
}
