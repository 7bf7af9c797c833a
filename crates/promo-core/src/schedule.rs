//! Schedule window predicate
//!
//! Date bounds are inclusive; times compare as minutes since midnight in the
//! visitor's local clock. Only bounds that are present are enforced.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::types::Schedule;

/// Parse an `"HH:MM"` time to minutes since midnight.
/// Malformed values yield `None`, which drops that bound.
pub fn parse_hhmm(value: &str) -> Option<u32> {
    let (h, m) = value.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Is `now` inside the popup's activation window?
/// A `start_time > end_time` pair is a wrap-around window spanning midnight.
pub fn matches_schedule(schedule: Option<&Schedule>, now: NaiveDateTime) -> bool {
    let s = match schedule {
        Some(s) => s,
        None => return true,
    };

    let today = now.date();
    if let Some(start) = s.start_date {
        if today < start {
            return false;
        }
    }
    if let Some(end) = s.end_date {
        if today > end {
            return false;
        }
    }

    if let Some(days) = &s.days_of_week {
        if !days.is_empty() {
            let dow = today.weekday().num_days_from_sunday() as u8;
            if !days.contains(&dow) {
                return false;
            }
        }
    }

    let minute = now.hour() * 60 + now.minute();
    let start = s.start_time.as_deref().and_then(parse_hhmm);
    let end = s.end_time.as_deref().and_then(parse_hhmm);

    match (start, end) {
        (Some(st), Some(en)) if st > en => minute >= st || minute <= en,
        (st, en) => {
            st.map_or(true, |v| minute >= v) && en.map_or(true, |v| minute <= v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("09:30"), Some(570));
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("12:60"), None);
        assert_eq!(parse_hhmm("noon"), None);
    }

    #[test]
    fn test_date_bounds_inclusive() {
        let s = Schedule {
            start_date: NaiveDate::from_ymd_opt(2026, 8, 10),
            end_date: NaiveDate::from_ymd_opt(2026, 8, 20),
            ..Default::default()
        };
        assert!(!matches_schedule(Some(&s), at(2026, 8, 9, 12, 0)));
        assert!(matches_schedule(Some(&s), at(2026, 8, 10, 0, 0)));
        assert!(matches_schedule(Some(&s), at(2026, 8, 20, 23, 59)));
        assert!(!matches_schedule(Some(&s), at(2026, 8, 21, 0, 0)));
    }

    #[test]
    fn test_days_of_week() {
        // 2026-08-29 is a Saturday (6), 2026-08-30 a Sunday (0).
        let s = Schedule {
            days_of_week: Some(vec![0, 6]),
            ..Default::default()
        };
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 12, 0)));
        assert!(matches_schedule(Some(&s), at(2026, 8, 30, 12, 0)));
        assert!(!matches_schedule(Some(&s), at(2026, 8, 31, 12, 0)));
    }

    #[test]
    fn test_time_window() {
        let s = Schedule {
            start_time: Some("09:00".to_string()),
            end_time: Some("17:00".to_string()),
            ..Default::default()
        };
        assert!(!matches_schedule(Some(&s), at(2026, 8, 29, 8, 59)));
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 9, 0)));
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 17, 0)));
        assert!(!matches_schedule(Some(&s), at(2026, 8, 29, 17, 1)));
    }

    #[test]
    fn test_only_present_bounds_enforced() {
        let s = Schedule {
            start_time: Some("22:00".to_string()),
            ..Default::default()
        };
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 23, 0)));
        assert!(!matches_schedule(Some(&s), at(2026, 8, 29, 12, 0)));
    }

    #[test]
    fn test_overnight_window_wraps() {
        let s = Schedule {
            start_time: Some("22:00".to_string()),
            end_time: Some("02:00".to_string()),
            ..Default::default()
        };
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 23, 0)));
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 1, 0)));
        assert!(!matches_schedule(Some(&s), at(2026, 8, 29, 12, 0)));
    }

    #[test]
    fn test_malformed_time_drops_bound() {
        let s = Schedule {
            start_time: Some("late".to_string()),
            end_time: Some("17:00".to_string()),
            ..Default::default()
        };
        assert!(matches_schedule(Some(&s), at(2026, 8, 29, 3, 0)));
        assert!(!matches_schedule(Some(&s), at(2026, 8, 29, 18, 0)));
    }

    #[test]
    fn test_absent_schedule_always_matches() {
        assert!(matches_schedule(None, at(1999, 1, 1, 0, 0)));
    }
}
