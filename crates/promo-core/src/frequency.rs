//! Frequency gate
//!
//! Layered early-return checks over the popup's display history and session
//! counter. Absent history means fully eligible.

use chrono::{Duration, NaiveDateTime};

use crate::types::{DisplayState, Frequency};

/// May this popup be shown again right now?
pub fn is_frequency_eligible(
    freq: &Frequency,
    state: Option<&DisplayState>,
    session_count: u32,
    now: NaiveDateTime,
) -> bool {
    if session_count >= freq.max_displays_per_session {
        return false;
    }

    let state = match state {
        Some(state) => state,
        None => return true,
    };

    // Permanent until the store is cleared externally.
    if state.dismissed {
        return false;
    }

    if let Some(total) = freq.max_displays_total {
        if state.display_count >= total {
            return false;
        }
    }

    if let (Some(minutes), Some(last)) = (freq.cooldown_minutes, state.last_displayed) {
        if now < last + Duration::minutes(minutes as i64) {
            return false;
        }
    }

    if let Some(day) = &state.day_count {
        if day.date == now.date() && day.count >= freq.max_displays_per_day {
            return false;
        }
    }

    true
}
