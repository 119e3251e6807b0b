use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;

static EPOCH_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("epoch seconds pattern"));
static EPOCH_MILLIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}$").expect("epoch millis pattern"));
static YEAR_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>[0-9]{4})(?:-(?P<month>[0-9]{2}))?$").expect("year-month pattern")
});

/// Offsets without a colon (`+0000`, as the indexer stores them), or hours only,
/// plus the browser `Date.toString()` form.
const OFFSET_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%a %b %d %Y %H:%M:%S GMT%#z",
];
/// Offset-less forms are read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
];

/// Lower/upper instants for a timestamp filter. Built only through
/// [`build_range`], so at least one side is always set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBoundary {
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

pub fn is_valid(value: &str) -> bool {
    normalize(value).is_some()
}

/// Converts epoch seconds, epoch millis or a calendar string into an instant.
/// Anything unreadable yields `None`.
pub fn normalize(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if EPOCH_MILLIS.is_match(trimmed) {
        return DateTime::from_timestamp_millis(trimmed.parse().ok()?);
    }
    if EPOCH_SECONDS.is_match(trimmed) {
        let seconds: i64 = trimmed.parse().ok()?;
        return DateTime::from_timestamp_millis(seconds.checked_mul(1000)?);
    }
    parse_calendar(trimmed)
}

pub fn build_range(start: Option<&str>, end: Option<&str>) -> Option<TimeBoundary> {
    let side = |value: Option<&str>| value.filter(|raw| is_valid(raw)).and_then(normalize);
    let gte = side(start);
    let lte = side(end);
    if gte.is_none() && lte.is_none() {
        return None;
    }
    Some(TimeBoundary { gte, lte })
}

/// `2024-01-02T03:04:05.000Z`
pub fn canonical(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_calendar(value: &str) -> Option<DateTime<Utc>> {
    let value = without_zone_name(value);
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| year_month(value))?;
    date.and_hms_opt(0, 0, 0).map(|midnight| midnight.and_utc())
}

/// `2024` and `2024-03` mean the first day of that year or month.
fn year_month(value: &str) -> Option<NaiveDate> {
    let captures = YEAR_MONTH.captures(value)?;
    let year = captures.name("year")?.as_str().parse().ok()?;
    let month = match captures.name("month") {
        Some(month) => month.as_str().parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Drops the trailing `(Coordinated Universal Time)` that `Date.toString()`
/// appends.
fn without_zone_name(value: &str) -> &str {
    match (value.strip_suffix(')'), value.rfind(" (")) {
        (Some(_), Some(start)) => value[..start].trim_end(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_seconds_and_millis_differ_by_a_thousand() {
        for raw in ["1700000000", "0000000001", "9999999999"] {
            let seconds = normalize(raw).unwrap();
            let millis = normalize(&format!("{raw}000")).unwrap();
            assert_eq!(seconds, millis);

            let as_millis = normalize(&format!("{:013}", raw.parse::<i64>().unwrap())).unwrap();
            assert_eq!(seconds.timestamp_millis(), as_millis.timestamp_millis() * 1000);
        }
    }

    #[test]
    fn canonical_form_has_millis_and_zulu() {
        let instant = normalize("1700000000").unwrap();
        assert_eq!(canonical(instant), "2023-11-14T22:13:20.000Z");
        let instant = normalize("1700000000123").unwrap();
        assert_eq!(canonical(instant), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn calendar_strings_are_accepted() {
        assert_eq!(
            canonical(normalize("2024-03-01T10:00:00+02:00").unwrap()),
            "2024-03-01T08:00:00.000Z"
        );
        assert_eq!(
            canonical(normalize("2024-03-01T10:00:00.250+0000").unwrap()),
            "2024-03-01T10:00:00.250Z"
        );
        assert_eq!(
            canonical(normalize("2024-03-01 10:00:00").unwrap()),
            "2024-03-01T10:00:00.000Z"
        );
        assert_eq!(
            canonical(normalize("2024-03-01T10:30").unwrap()),
            "2024-03-01T10:30:00.000Z"
        );
        assert_eq!(
            canonical(normalize(" 2024-03-01 ").unwrap()),
            "2024-03-01T00:00:00.000Z"
        );
        assert_eq!(
            canonical(normalize("Fri, 01 Mar 2024 10:00:00 GMT").unwrap()),
            "2024-03-01T10:00:00.000Z"
        );
    }

    #[test]
    fn partial_and_browser_dates_are_accepted() {
        let cases = [
            ("2024", "2024-01-01T00:00:00.000Z"),
            ("2024-03", "2024-03-01T00:00:00.000Z"),
            ("March 1, 2024", "2024-03-01T00:00:00.000Z"),
            ("Mar 01 2024", "2024-03-01T00:00:00.000Z"),
            ("2024-03-01T10:00:00+02", "2024-03-01T08:00:00.000Z"),
            ("Fri Mar 01 2024 10:00:00 GMT+0000", "2024-03-01T10:00:00.000Z"),
            (
                "Fri Mar 01 2024 12:00:00 GMT+0200 (Eastern European Standard Time)",
                "2024-03-01T10:00:00.000Z",
            ),
        ];
        for (raw, expected) in cases {
            let instant = normalize(raw).unwrap_or_else(|| panic!("{raw:?} should parse"));
            assert_eq!(canonical(instant), expected, "{raw:?}");
        }
    }

    #[test]
    fn garbage_is_invalid() {
        for raw in ["", "   ", "yesterday", "12345", "2024-13-45", "2024-13", "17000000000"] {
            assert!(!is_valid(raw), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn range_keeps_only_valid_sides() {
        assert_eq!(build_range(None, None), None);
        assert_eq!(build_range(Some("nope"), Some("")), None);

        let boundary = build_range(Some("1700000000"), Some("garbage")).unwrap();
        assert!(boundary.gte.is_some());
        assert_eq!(boundary.lte, None);

        let boundary = build_range(None, Some("2024-01-01")).unwrap();
        assert_eq!(boundary.gte, None);
        assert!(boundary.lte.is_some());
    }
}
