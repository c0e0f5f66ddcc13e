//! Formatting helpers shared by agent summaries.

/// Format a currency amount as `$1,234.56`.
///
/// Negative amounts render as `$-1,234.56`.
pub fn format_currency(value: f64) -> String {
    format!("${}", group_thousands(value, 2))
}

/// Format a percentage as `12.34%`.
pub fn format_pct(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Format a percentage with an explicit sign, as `+12.34%` / `-3.00%`.
pub fn format_signed_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

/// Format an integer count with thousands separators, as `12,480`.
pub fn format_count(value: i64) -> String {
    group_thousands(value as f64, 0)
}

/// Format a plain number with thousands separators, as `1,234.56`.
pub fn format_number(value: f64) -> String {
    group_thousands(value, 2)
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(0.5), "$0.50");
        assert_eq!(format_currency(-1234.5), "$-1,234.50");
        assert_eq!(format_currency(999.0), "$999.00");
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(12.345), "12.35%");
        assert_eq!(format_signed_pct(50.0), "+50.00%");
        assert_eq!(format_signed_pct(-20.0), "-20.00%");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(12480), "12,480");
        assert_eq!(format_count(999), "999");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234.5), "1,234.50");
    }
}
