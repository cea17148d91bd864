//! Human-friendly duration labels such as `30s`, `10m` or `2h`.
//!
//! Configuration stores the notification timeout and the silence duration
//! as labels so the file stays readable.

use std::time::Duration;

use thiserror::Error;

/// Errors produced when parsing a duration label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("empty duration label")]
    Empty,

    #[error("invalid number in duration label: {0:?}")]
    InvalidNumber(String),

    #[error("unknown unit {unit:?} in duration label {label:?} (expected s, m or h)")]
    UnknownUnit { label: String, unit: String },

    #[error("duration label must be greater than zero: {0:?}")]
    Zero(String),
}

/// Parses a label like `45s`, `10m` or `4h`. A bare number means seconds.
pub fn parse_label(label: &str) -> Result<Duration, LabelError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(LabelError::Empty);
    }

    let split = label
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(label.len());
    let (digits, unit) = label.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| LabelError::InvalidNumber(label.to_string()))?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        other => {
            return Err(LabelError::UnknownUnit {
                label: label.to_string(),
                unit: other.to_string(),
            });
        }
    };

    if value == 0 {
        return Err(LabelError::Zero(label.to_string()));
    }

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| LabelError::InvalidNumber(label.to_string()))
}

/// Formats a duration as the largest whole unit below the next threshold.
pub fn format_label(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        return format!("{}s", secs);
    }
    let minutes = secs / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    format!("{}h", minutes / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!(parse_label("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_label("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_label("8h"), Ok(Duration::from_secs(8 * 3600)));
        assert_eq!(parse_label(" 30 "), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_label(""), Err(LabelError::Empty));
        assert!(matches!(parse_label("m"), Err(LabelError::InvalidNumber(_))));
        assert!(matches!(
            parse_label("5d"),
            Err(LabelError::UnknownUnit { .. })
        ));
        assert!(matches!(parse_label("0m"), Err(LabelError::Zero(_))));
    }

    #[test]
    fn format_thresholds() {
        assert_eq!(format_label(Duration::from_secs(30)), "30s");
        assert_eq!(format_label(Duration::from_secs(60)), "1m");
        assert_eq!(format_label(Duration::from_secs(90)), "1m");
        assert_eq!(format_label(Duration::from_secs(3600)), "1h");
        assert_eq!(format_label(Duration::from_secs(24 * 3600)), "24h");
    }
}
