//! Small text parsers shared by the gateway plugins.

use std::time::Duration;

/// Escape text for Telegram HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Format a duration for humans ("2 hours 5 minutes").
pub fn format_duration(secs: u64) -> String {
    fn unit(n: u64, name: &str) -> String {
        if n == 1 {
            format!("{} {}", n, name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    if secs < 60 {
        unit(secs, "second")
    } else if secs < 3600 {
        unit(secs / 60, "minute")
    } else if secs < 86400 {
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{} {}", unit(secs / 3600, "hour"), unit(mins, "minute"))
        } else {
            unit(secs / 3600, "hour")
        }
    } else {
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{} {}", unit(secs / 86400, "day"), unit(hours, "hour"))
        } else {
            unit(secs / 86400, "day")
        }
    }
}

/// Parse a duration string such as `30m`, `4h`, `6d` or `5w`.
///
/// Returns `None` for unknown units, zero amounts and garbage.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let unit = input.chars().last()?;
    let digits = &input[..input.len() - unit.len_utf8()];
    let amount: u64 = digits.parse().ok()?;
    if amount == 0 {
        return None;
    }

    let multiplier = match unit.to_ascii_lowercase() {
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => return None,
    };

    amount.checked_mul(multiplier).map(Duration::from_secs)
}

/// Parse a yes/no style toggle argument.
pub fn parse_toggle(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "yes" | "on" | "true" | "enable" => Some(true),
        "no" | "off" | "false" | "disable" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("4m"), Some(Duration::from_secs(240)));
        assert_eq!(parse_duration("3h"), Some(Duration::from_secs(10_800)));
        assert_eq!(parse_duration("6d"), Some(Duration::from_secs(518_400)));
        assert_eq!(parse_duration("5W"), Some(Duration::from_secs(3_024_000)));
    }

    #[test]
    fn rejects_bad_durations() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("10x"), None);
        assert_eq!(parse_duration("0h"), None);
        assert_eq!(parse_duration("ééh"), None);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(3900), "1 hour 5 minutes");
        assert_eq!(format_duration(172_800), "2 days");
    }

    #[test]
    fn toggles() {
        assert_eq!(parse_toggle("YES"), Some(true));
        assert_eq!(parse_toggle("off"), Some(false));
        assert_eq!(parse_toggle("maybe"), None);
    }
}
