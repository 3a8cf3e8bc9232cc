// Number and text normalization shared by both extraction stages.

/// Parses a quoted number out of noisy element text.
///
/// Everything except digits, `,` and `.` is dropped first. A lone comma
/// separator is a decimal comma; when both separators appear the right-most
/// one is the decimal separator and the other is treated as grouping.
/// Returns `None` for anything that does not end up as a finite number.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (kept.rfind(','), kept.rfind('.')) {
        (Some(_), None) => kept.replace(',', "."),
        (Some(comma), Some(period)) if comma > period => kept.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => kept.replace(',', ""),
        _ => kept,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Normalizes page text for the regex stage: horizontal whitespace runs
/// (NBSP and tabs included) collapse to one space, lines are trimmed,
/// newlines are kept and a comma between two digits becomes a period.
pub fn normalize_text(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for (i, &c) in chars.iter().enumerate() {
        if c == '\n' {
            out.push('\n');
            pending_space = false;
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with('\n') {
            out.push(' ');
        }
        pending_space = false;

        let between_digits = i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if c == ',' && between_digits {
            out.push('.');
        } else {
            out.push(c);
        }
    }

    out
}

/// Validates a market line such as `9.5` or `9,5` and returns it with a
/// period separator.
pub fn normalize_market(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (int_part, frac_part) = match trimmed.find(['.', ',']) {
        Some(idx) => (&trimmed[..idx], Some(&trimmed[idx + 1..])),
        None => (trimmed, None),
    };

    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) {
        return None;
    }
    match frac_part {
        Some(frac) if all_digits(frac) => Some(format!("{}.{}", int_part, frac)),
        Some(_) => None,
        None => Some(int_part.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_and_period_separators_agree() {
        for (comma, period) in [("1,85", "1.85"), ("2,05", "2.05"), ("10,5", "10.5"), ("3", "3")] {
            assert_eq!(parse_decimal(comma), parse_decimal(period));
        }
        assert_eq!(parse_decimal("1,85"), Some(1.85));
    }

    #[test]
    fn noise_around_number_is_stripped() {
        assert_eq!(parse_decimal(" @ 1.72 "), Some(1.72));
        assert_eq!(parse_decimal("odd: 2,10x"), Some(2.10));
        assert_eq!(parse_decimal("1.234,50"), Some(1234.50));
        assert_eq!(parse_decimal("1,234.50"), Some(1234.50));
    }

    #[test]
    fn unparseable_values_are_not_found() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("SUSP"), None);
        assert_eq!(parse_decimal(".,"), None);
        assert_eq!(parse_decimal("1.2.3"), None);
        assert_eq!(parse_decimal("Over 9.5 1.72"), None);
    }

    #[test]
    fn text_normalization_keeps_lines() {
        let raw = "Mais de\u{a0}\u{a0}9,5\t 1,72 \n   Menos de 9,5   2,05";
        assert_eq!(normalize_text(raw), "Mais de 9.5 1.72\nMenos de 9.5 2.05");
    }

    #[test]
    fn comma_outside_numbers_is_untouched() {
        assert_eq!(normalize_text("Over, 9.5"), "Over, 9.5");
        assert_eq!(normalize_text("a,1"), "a,1");
    }

    #[test]
    fn market_lines() {
        assert_eq!(normalize_market("9.5").as_deref(), Some("9.5"));
        assert_eq!(normalize_market(" 9,5 ").as_deref(), Some("9.5"));
        assert_eq!(normalize_market("10").as_deref(), Some("10"));
        assert_eq!(normalize_market(""), None);
        assert_eq!(normalize_market("9."), None);
        assert_eq!(normalize_market("nine"), None);
        assert_eq!(normalize_market("9.5.1"), None);
    }
}
