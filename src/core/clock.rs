//! Wall-clock timestamp parsing into integer epoch seconds.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use thiserror::Error;

use crate::config::ClockConfig;

/// Errors that can occur while parsing timestamps.
#[derive(Error, Debug, PartialEq)]
pub enum ClockError {
    #[error("unrecognized date/time: '{0}'")]
    Unrecognized(String),

    #[error("invalid UTC offset: {0} seconds")]
    InvalidOffset(i32),
}

/// Result type for clock operations.
pub type Result<T> = std::result::Result<T, ClockError>;

/// Converts textual timestamps into seconds since the Unix epoch.
///
/// Text carrying an explicit offset (RFC 3339) is honored as-is; naive local
/// text is interpreted in the configured fixed offset.
#[derive(Debug, Clone)]
pub struct EpochClock {
    offset: FixedOffset,
    formats: Vec<String>,
}

impl Default for EpochClock {
    fn default() -> Self {
        Self::utc(ClockConfig::default().formats)
    }
}

impl EpochClock {
    fn utc(formats: Vec<String>) -> Self {
        Self {
            offset: Utc.fix(),
            formats,
        }
    }

    pub fn from_config(config: &ClockConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_secs)
            .ok_or(ClockError::InvalidOffset(config.utc_offset_secs))?;
        Ok(Self {
            offset,
            formats: config.formats.clone(),
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parse `text` into epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Unrecognized`] if no accepted representation matches.
    pub fn parse(&self, text: &str) -> Result<i64> {
        let text = text.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.timestamp());
        }

        for format in &self.formats {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                if let Some(local) = self.offset.from_local_datetime(&naive).single() {
                    return Ok(local.timestamp());
                }
            }
        }

        Err(ClockError::Unrecognized(text.to_string()))
    }

    /// Format epoch seconds in the local offset with a `chrono` pattern.
    pub fn format(&self, epoch: i64, pattern: &str) -> String {
        match self.offset.timestamp_opt(epoch, 0).single() {
            Some(dt) => dt.format(pattern).to_string(),
            None => epoch.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_format() {
        let clock = EpochClock::default();
        assert_eq!(clock.parse("1970-01-01 00:00:10").unwrap(), 10);
        assert_eq!(clock.parse("2020-03-01 12:00:00").unwrap(), 1_583_064_000);
    }

    #[test]
    fn test_parse_alternate_formats() {
        let clock = EpochClock::default();
        let expected = 1_583_064_000;
        assert_eq!(clock.parse("2020/03/01 12:00:00").unwrap(), expected);
        assert_eq!(clock.parse("01/03/2020 12:00:00").unwrap(), expected);
        assert_eq!(clock.parse(" 2020-03-01T12:00:00 ").unwrap(), expected);
        assert_eq!(clock.parse("2020-03-01 12:00:00.250").unwrap(), expected);
    }

    #[test]
    fn test_parse_rfc3339_ignores_local_offset() {
        let config = ClockConfig {
            utc_offset_secs: 8 * 3600,
            ..ClockConfig::default()
        };
        let clock = EpochClock::from_config(&config).unwrap();
        assert_eq!(clock.parse("2020-03-01T12:00:00Z").unwrap(), 1_583_064_000);
    }

    #[test]
    fn test_parse_applies_local_offset() {
        let config = ClockConfig {
            utc_offset_secs: 8 * 3600,
            ..ClockConfig::default()
        };
        let clock = EpochClock::from_config(&config).unwrap();
        assert_eq!(
            clock.parse("2020-03-01 20:00:00").unwrap(),
            1_583_064_000
        );
        assert_eq!(clock.format(1_583_064_000, "%y%m%d-%H%M%S"), "200301-200000");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let clock = EpochClock::default();
        assert_eq!(
            clock.parse("not a time"),
            Err(ClockError::Unrecognized("not a time".to_string()))
        );
    }

    #[test]
    fn test_invalid_offset() {
        let config = ClockConfig {
            utc_offset_secs: 90_000,
            ..ClockConfig::default()
        };
        assert!(matches!(
            EpochClock::from_config(&config),
            Err(ClockError::InvalidOffset(90_000))
        ));
    }
}
