//! Utility functions for poll services.

/// Parse a duration string like "5m", "1h", "30s", "7d" into seconds.
pub fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".into());
    }

    // A bare number is taken as seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }

    let Some((at, unit)) = s.char_indices().last() else {
        return Err("Empty duration string".into());
    };
    let num_str = &s[..at];
    let num: u64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;

    let scale: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 7 * 86400,
        _ => return Err(format!("Unknown unit: {unit}")),
    };
    num.checked_mul(scale)
        .ok_or_else(|| format!("Duration too large: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_secs() {
        assert_eq!(parse_duration_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_secs("1h").unwrap(), 3600);
        assert_eq!(parse_duration_secs("2d").unwrap(), 172800);
        assert_eq!(parse_duration_secs("1w").unwrap(), 604800);
        assert_eq!(parse_duration_secs("45").unwrap(), 45);
        assert!(parse_duration_secs("abc").is_err());
        assert!(parse_duration_secs("").is_err());
    }

    #[test]
    fn test_parse_duration_non_ascii_unit() {
        assert_eq!(parse_duration_secs("7ä").unwrap_err(), "Unknown unit: ä");
        assert!(parse_duration_secs("ä").is_err());
        assert!(parse_duration_secs("7dä").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(parse_duration_secs("999999999999999d")
            .unwrap_err()
            .starts_with("Duration too large"));
        assert!(parse_duration_secs("99999999999999999w").is_err());
        assert_eq!(parse_duration_secs(&format!("{}s", u64::MAX)).unwrap(), u64::MAX);
    }
}
