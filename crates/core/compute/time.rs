//! Fixed-size, canonically aligned time windows.
//!
//! Every instant belongs to exactly one window of a [`TimeFragmenter`]; the
//! window starts at `t - (t mod page_size)` counted from the Unix epoch. This
//! makes the identity of a page independent of which moment inside it a
//! client asked for.
//!
//! The current instant is always passed in explicitly, so window computation
//! is pure.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    #[inline]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Maps instants onto windows of a fixed size in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFragmenter {
    page_size: i64,
}

impl TimeFragmenter {
    pub const HOUR: i64 = 1000 * 60 * 60;
    pub const DAY: i64 = Self::HOUR * 24;
    pub const WEEK: i64 = Self::DAY * 7;
    /// Not calendar-aware: 365 days.
    pub const YEAR: i64 = Self::DAY * 365;

    /// # Panics
    ///
    /// Panics if `page_size` is not positive.
    pub fn new(page_size: i64) -> Self {
        assert!(page_size > 0, "Page size must be greater than zero");
        Self { page_size }
    }

    pub fn hourly() -> Self {
        Self::new(Self::HOUR)
    }

    pub fn daily() -> Self {
        Self::new(Self::DAY)
    }

    pub fn weekly() -> Self {
        Self::new(Self::WEEK)
    }

    /// Window size in milliseconds.
    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Start of the window a client asked for.
    ///
    /// The page token is parsed as an ISO-8601 instant; a missing or
    /// unparsable token selects the window containing `now`. This never
    /// fails.
    pub fn window_start(&self, page: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
        let requested = page.and_then(parse_instant).unwrap_or(now);
        self.window_start_at(requested)
    }

    /// Start of the window containing `instant`.
    pub fn window_start_at(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let millis = instant.timestamp_millis();
        let start = millis - millis.rem_euclid(self.page_size);
        from_millis(start)
    }

    pub fn previous_window(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start - Duration::milliseconds(self.page_size)
    }

    pub fn next_window(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + Duration::milliseconds(self.page_size)
    }

    /// Start of the window that is still filling up at `now`; everything
    /// before it is closed.
    pub fn last_closed_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start_at(now)
    }

    pub fn window_for(&self, instant: DateTime<Utc>) -> TimeWindow {
        let start = self.window_start_at(instant);
        TimeWindow {
            start,
            end: self.next_window(start),
        }
    }

    /// Consecutive window starts covering `[from, to)`.
    pub fn windows_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = TimeWindow> + '_ {
        let mut current = from;
        std::iter::from_fn(move || {
            if current >= to {
                return None;
            }
            let window = TimeWindow {
                start: current,
                end: self.next_window(current),
            };
            current = window.end;
            Some(window)
        })
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse a page token as an ISO-8601 instant.
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`, with offset or fraction), a
/// naive date-time read as UTC, or a bare date at UTC midnight. Percent
/// encoded tokens are decoded first.
pub fn parse_instant(token: &str) -> Option<DateTime<Utc>> {
    let decoded = urlencoding::decode(token).ok()?;
    let token = decoded.trim();
    if token.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format an instant the way fragment identifiers carry it:
/// millisecond precision with a `Z` suffix.
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
