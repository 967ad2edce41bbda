use crate::error::AppError;
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Utc};

// Service wall-clock time (Moscow, UTC+3); stored timestamps carry no offset.
pub const SERVICE_OFFSET: FixedOffset = FixedOffset::east_opt(3 * 3600).unwrap();

/// Format every new timestamp is written in.
pub const STORED_FORMAT: &str = "%d.%m.%Y %H:%M";
pub const ISO_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Current service-local wall-clock time.
pub fn now_local() -> NaiveDateTime {
    Utc::now().with_timezone(&SERVICE_OFFSET).naive_local()
}

pub fn to_stored_string(dt: &NaiveDateTime) -> String {
    dt.format(STORED_FORMAT).to_string()
}

/// Parses a stored timestamp.
///
/// Rows written over the lifetime of the bot use three different shapes, so the
/// formats are tried in a fixed order and the first one that parses wins:
/// `dd.mm.YYYY HH:MM`, `YYYY-mm-dd HH:MM:SS`, `YYYY-mm-dd` (midnight).
pub fn parse_stored(s: &str) -> crate::error::Result<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, STORED_FORMAT) {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, ISO_DATETIME_FORMAT) {
        return Ok(dt);
    }
    NaiveDate::parse_from_str(s, ISO_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AppError::TimeParse(format!("unrecognized timestamp: {s:?}")))
}

// tracing_subscriber timer printing service-local time, same clock as the database.
pub struct ServiceTimer;

impl tracing_subscriber::fmt::time::FormatTime for ServiceTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", now_local().format(ISO_DATETIME_FORMAT))
    }
}
