use chrono::NaiveDate;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse a numeric cell: strip thousands separators and currency noise.
/// "1,234.56" → 1234.56 | "(1.5)" → -1.5 | "" / "N/A" / "-" → None
pub fn parse_num(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    // Accounting notation wraps negatives in parentheses.
    let (s, negate) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (inner, true),
        None => (s, false),
    };
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    Some(if negate { -value } else { value })
}

/// Parse dates as the exchange prints them: "2024/03/18" primary, with
/// ISO and day-first fallbacks for older announcement tables.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d/%m/%Y") {
        return Some(d);
    }

    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_num() {
        assert_eq!(parse_num("1,234.56"), Some(1234.56));
        assert_eq!(parse_num(" 610.00 "), Some(610.0));
        assert_eq!(parse_num("(1.5)"), Some(-1.5));
        assert_eq!(parse_num("N/A"), None);
        assert_eq!(parse_num(""), None);
        assert_eq!(parse_num("—"), None);
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 18).unwrap();
        assert_eq!(parse_date("2024/03/18"), Some(expected));
        assert_eq!(parse_date("2024-03-18"), Some(expected));
        assert_eq!(parse_date("18/03/2024"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
    }
}
