//! Locale-aware amount parsing.
//!
//! Invoices mix Argentine (`1.234,56`) and US (`1,234.56`) formatting, often in
//! the same batch, so the separator roles are decided per captured substring.

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

use crate::error::ExtractionError;

/// Largest amount accepted from a capture. Longer digit runs are OCR noise,
/// and bounding them keeps every later sum in range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x38D7E, 0, false, 0);

/// Parse a captured amount, resolving thousands/decimal separator ambiguity.
///
/// - Both `.` and `,` present: the later one is the decimal separator.
/// - Only `,`: decimal if it occurs more than once (the last one wins) or if at
///   most two digits follow it; a thousands separator otherwise.
/// - Only `.` or none: parsed as is.
pub fn parse_amount(field: &str, raw: &str) -> Result<Decimal, ExtractionError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let commas = cleaned.matches(',').count();
            if commas >= 2 || cleaned.len() - c <= 3 {
                let (int_part, frac_part) = cleaned.split_at(c);
                format!("{}.{}", int_part.replace(',', ""), &frac_part[1..])
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };

    let invalid = || ExtractionError::Parse {
        field: field.to_string(),
        value: raw.to_string(),
    };
    let amount = Decimal::from_str(&normalized).map_err(|_| invalid())?;
    if amount > MAX_AMOUNT {
        return Err(invalid());
    }
    Ok(amount)
}

/// Parse a captured amount, degrading to zero on failure.
pub fn amount_or_zero(field: &str, raw: &str) -> Decimal {
    match parse_amount(field, raw) {
        Ok(amount) => amount,
        Err(e) => {
            warn!("{}, using 0", e);
            Decimal::ZERO
        }
    }
}

/// Parse a numeric substring with no particular field attached.
pub fn parse_number(raw: &str) -> Decimal {
    amount_or_zero("amount", raw)
}

/// Format an amount with two decimals and Argentine separators (1.234,56).
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.round_dp(2));
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((&s, "00"));
    let (sign, digits) = match integer_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer_part),
    };

    let chars: Vec<char> = digits.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    format!("{}{},{}", sign, formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_mixed_separators() {
        assert_eq!(parse_number("1.234,56"), dec("1234.56"));
        assert_eq!(parse_number("1,234.56"), dec("1234.56"));
        assert_eq!(parse_number("12.345.678,90"), dec("12345678.90"));
        assert_eq!(parse_number("12,345,678.90"), dec("12345678.90"));
    }

    #[test]
    fn test_parse_comma_only() {
        assert_eq!(parse_number("1234,56"), dec("1234.56"));
        assert_eq!(parse_number("12,5"), dec("12.5"));
        // Thousands: three digits follow a single comma.
        assert_eq!(parse_number("1,234"), dec("1234"));
        // Repeated commas: the last one is the decimal separator.
        assert_eq!(parse_number("1,234,56"), dec("1234.56"));
    }

    #[test]
    fn test_parse_dot_only() {
        assert_eq!(parse_number("1234.56"), dec("1234.56"));
        assert_eq!(parse_number("1500"), dec("1500"));
        assert_eq!(parse_number("1.234"), dec("1.234"));
    }

    #[test]
    fn test_parse_noise_is_stripped() {
        assert_eq!(parse_number("$ 1.500,00"), dec("1500.00"));
        assert_eq!(parse_number("1 500,00"), dec("1500.00"));
    }

    #[test]
    fn test_oversized_amount_is_rejected() {
        assert_eq!(MAX_AMOUNT, dec("1000000000000000"));
        assert_eq!(parse_number("1.000.000.000.000.000,00"), dec("1000000000000000.00"));
        assert!(matches!(
            parse_amount("taxed", "50000000000000000000000000000"),
            Err(ExtractionError::Parse { .. })
        ));
        assert_eq!(parse_number("99999999999999999999999999999999"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_failure_yields_zero() {
        assert_eq!(parse_number("invalid"), Decimal::ZERO);
        assert_eq!(parse_number(""), Decimal::ZERO);
        assert_eq!(parse_number("1.2.3"), Decimal::ZERO);
        assert!(matches!(
            parse_amount("total", "abc"),
            Err(ExtractionError::Parse { .. })
        ));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("1234.56")), "1.234,56");
        assert_eq!(format_amount(dec("12345678.9")), "12.345.678,90");
        assert_eq!(format_amount(dec("0")), "0,00");
    }
}
