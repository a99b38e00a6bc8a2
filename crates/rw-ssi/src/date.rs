//! strftime-style date formatting for `DATE_*` variables and `#flastmod`.

use chrono::format::{Fixed, Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};

/// Time zone a timestamp is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Greenwich Mean Time; `%Z` renders as `GMT`.
    Gmt,
    /// The host's local time zone.
    Local,
}

/// Formats epoch milliseconds with a strftime-like format string.
pub trait DateFormatter: Send + Sync {
    /// Format `millis` (milliseconds since the Unix epoch) using `format`.
    fn format(&self, millis: i64, format: &str, zone: Zone) -> String;
}

/// [`DateFormatter`] backed by chrono's strftime implementation.
///
/// Invalid format strings are returned verbatim and logged.
///
/// # Example
///
/// ```
/// use rw_ssi::{ChronoDateFormatter, DateFormatter, Zone};
///
/// let formatted = ChronoDateFormatter.format(0, "%A, %d-%b-%Y %T %Z", Zone::Gmt);
/// assert_eq!(formatted, "Thursday, 01-Jan-1970 00:00:00 GMT");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct ChronoDateFormatter;

impl DateFormatter for ChronoDateFormatter {
    fn format(&self, millis: i64, format: &str, zone: Zone) -> String {
        let mut items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            tracing::warn!(format, "Invalid time format");
            return format.to_owned();
        }

        let Some(utc) = DateTime::<Utc>::from_timestamp_millis(millis) else {
            tracing::warn!(millis, "Timestamp out of range");
            return String::new();
        };

        match zone {
            Zone::Gmt => {
                for item in &mut items {
                    if matches!(item, Item::Fixed(Fixed::TimezoneName)) {
                        *item = Item::Literal("GMT");
                    }
                }
                utc.format_with_items(items.iter()).to_string()
            }
            Zone::Local => utc
                .with_timezone(&Local)
                .format_with_items(items.iter())
                .to_string(),
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_format_gmt() {
        let formatted = ChronoDateFormatter.format(86_400_000, "%A, %d-%b-%Y %T %Z", Zone::Gmt);
        assert_eq!(formatted, "Friday, 02-Jan-1970 00:00:00 GMT");
    }

    #[test]
    fn test_plain_date() {
        let formatted = ChronoDateFormatter.format(1_000_000_000_000, "%Y-%m-%d", Zone::Gmt);
        assert_eq!(formatted, "2001-09-09");
    }

    #[test]
    fn test_invalid_format_returned_verbatim() {
        let formatted = ChronoDateFormatter.format(0, "%Q%", Zone::Gmt);
        assert_eq!(formatted, "%Q%");
    }

    #[test]
    fn test_local_zone_formats() {
        let formatted = ChronoDateFormatter.format(0, "%Y", Zone::Local);
        assert!(formatted == "1970" || formatted == "1969");
    }

    #[test]
    fn test_now_is_after_epoch() {
        assert!(now_millis() > 0);
    }
}
