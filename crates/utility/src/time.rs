use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

/// Local wall-clock hour below which an instant still belongs to the
/// previous operational day. A train departing 23:50 and arriving 00:20
/// is grouped with the civil day it started on.
pub const SERVICE_DATE_CUTOFF_HOUR: u32 = 4;

/// Canonical local timezone of the timetable.
pub const TIMETABLE_TIMEZONE: Tz = chrono_tz::Europe::Amsterdam;

/// Parses an RFC 3339 datetime, keeping the supplied offset.
/// Empty input yields `None`.
pub fn parse_iso_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value).ok()
}

/// Formats an instant the way `parse_iso_datetime` reads it back.
pub fn datetime_to_iso(value: Option<DateTime<FixedOffset>>) -> Option<String> {
    value.map(|datetime| datetime.to_rfc3339())
}

/// Parses an ISO 8601 duration (e.g. `PT2M`, `PT1M35S`) into whole minutes,
/// rounding seconds half-up. Empty or unparseable input yields 0.
pub fn parse_iso_delay(value: &str) -> i64 {
    let Some(duration) = parse_iso_duration(value) else {
        return 0;
    };

    let seconds = duration.num_seconds();
    let minutes = seconds / 60;
    if seconds % 60 >= 30 {
        minutes + 1
    } else {
        minutes
    }
}

/// Parses an ISO 8601 duration of the `PnDTnHnMnS` shape with any subset of
/// components present.
pub fn parse_iso_duration(value: &str) -> Option<Duration> {
    let rest = value.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut seconds: i64 = 0;

    for (number, designator) in iso_components(date_part) {
        match designator {
            'D' => seconds += number.checked_mul(86_400)?,
            _ => return None,
        }
    }

    if let Some(time_part) = time_part {
        for (number, designator) in iso_components(time_part) {
            match designator {
                'H' => seconds += number.checked_mul(3_600)?,
                'M' => seconds += number.checked_mul(60)?,
                'S' => seconds += number,
                _ => return None,
            }
        }
    }

    Some(Duration::seconds(seconds))
}

fn iso_components(part: &str) -> impl Iterator<Item = (i64, char)> + '_ {
    part.split_inclusive(|c: char| c.is_ascii_alphabetic())
        .filter_map(|component| {
            let designator = component.chars().last()?;
            let number = component[..component.len() - 1].parse().ok()?;
            Some((number, designator))
        })
}

/// Combines a calendar date with an offset since local midnight, localized
/// in `tz`. Offsets over 24 hours roll into the following day. When the
/// resulting civil time does not exist (DST spring-forward) the first valid
/// instant after it is returned instead.
pub fn combine_local(
    date: NaiveDate,
    offset_of_day: Duration,
    tz: Tz,
) -> Option<DateTime<FixedOffset>> {
    let mut naive = date.and_time(NaiveTime::MIN).checked_add_signed(offset_of_day)?;

    // DST gaps are at most a few hours; step forward until the civil time
    // exists again.
    for _ in 0..=240 {
        match tz.from_local_datetime(&naive) {
            chrono::LocalResult::Single(datetime) => return Some(datetime.fixed_offset()),
            chrono::LocalResult::Ambiguous(earliest, _) => {
                return Some(earliest.fixed_offset())
            }
            chrono::LocalResult::None => {
                naive = naive.checked_add_signed(Duration::minutes(1))?;
            }
        }
    }

    None
}

/// Operational-day rule: instants before the 04:00 cutoff (in their own
/// offset) belong to the previous calendar day.
pub fn get_service_date(instant: DateTime<FixedOffset>) -> NaiveDate {
    if instant.hour() < SERVICE_DATE_CUTOFF_HOUR {
        instant.date_naive() - Duration::days(1)
    } else {
        instant.date_naive()
    }
}

/// Lenient integer parsing for rehydrated hash fields: anything that is not
/// a number becomes 0.
pub fn parse_str_int(value: &str) -> i64 {
    value.trim().parse().unwrap_or(0)
}
