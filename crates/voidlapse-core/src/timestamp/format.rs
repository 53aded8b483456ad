use std::fmt;

use chrono::{DateTime, Local, Utc};
use tracing::warn;

/// Which parts of the instant are drawn on each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// `YYYY-MM-DD HH:MM:SS`
    #[default]
    DateTime,
    /// `YYYY-MM-DD`
    Date,
    /// `HH:MM:SS`
    Time,
}

/// Time zone the instant is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Utc,
}

impl TimestampFormat {
    /// Map a selector name to a format. Unknown names fall back to `datetime`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "datetime" => Self::DateTime,
            "date" => Self::Date,
            "time" => Self::Time,
            other => {
                warn!(format = other, "unknown timestamp format, using datetime");
                Self::DateTime
            }
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            Self::DateTime => "%Y-%m-%d %H:%M:%S",
            Self::Date => "%Y-%m-%d",
            Self::Time => "%H:%M:%S",
        }
    }

    pub fn render(self, instant: DateTime<Utc>, zone: DisplayZone) -> String {
        match zone {
            DisplayZone::Utc => instant.format(self.pattern()).to_string(),
            DisplayZone::Local => instant
                .with_timezone(&Local)
                .format(self.pattern())
                .to_string(),
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTime => write!(f, "datetime"),
            Self::Date => write!(f, "date"),
            Self::Time => write!(f, "time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap()
    }

    #[test]
    fn renders_each_format_in_utc() {
        assert_eq!(
            TimestampFormat::DateTime.render(instant(), DisplayZone::Utc),
            "2024-03-09 07:05:03"
        );
        assert_eq!(TimestampFormat::Date.render(instant(), DisplayZone::Utc), "2024-03-09");
        assert_eq!(TimestampFormat::Time.render(instant(), DisplayZone::Utc), "07:05:03");
    }

    #[test]
    fn local_zone_keeps_the_shape() {
        let s = TimestampFormat::DateTime.render(instant(), DisplayZone::Local);
        assert_eq!(s.len(), "2024-03-09 07:05:03".len());
    }

    #[test]
    fn from_name_maps_selectors() {
        assert_eq!(TimestampFormat::from_name("date"), TimestampFormat::Date);
        assert_eq!(TimestampFormat::from_name("TIME"), TimestampFormat::Time);
        assert_eq!(TimestampFormat::from_name("datetime"), TimestampFormat::DateTime);
        assert_eq!(TimestampFormat::from_name("epoch"), TimestampFormat::DateTime);
    }
}
