//! Slot search: the pure part of auto-scheduling.
//!
//! Given the working day, the intervals other tasks already claim and the
//! current local time, find the earliest start for a task of a given length:
//!
//! 1. Pick a first candidate from the time of day: morning start if it is
//!    still early, tomorrow morning if the day is nearly over, otherwise
//!    `now + lead` rounded up to the slot granularity.
//! 2. Push the candidate past every interval it would overlap.
//! 3. If it lands in the lunch break, move it to the end of lunch and sweep
//!    again.
//!
//! No I/O happens here; [`crate::AutoScheduler`] feeds it from the task store.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use taskpulse_core::config::{SchedulerConfig, WorkWindow};
use taskpulse_core::task::MAX_ESTIMATE_MINUTES;

/// A time range another task has claimed. End-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupiedInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl OccupiedInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && end > self.start
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleRequest {
    /// Minutes the task needs. Zero or negative means "use the default".
    pub duration_minutes: i64,
    pub domain: Option<String>,
    pub occupied: Vec<OccupiedInterval>,
}

impl ScheduleRequest {
    pub fn new(duration_minutes: i64) -> Self {
        Self {
            duration_minutes,
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn occupied(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.occupied.push(OccupiedInterval::new(start, end));
        self
    }
}

/// A chosen slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Slot {
    pub fn new(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            start,
            end: start + Duration::minutes(duration_minutes),
        }
    }
}

/// Tunables for the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRules {
    /// Minimum distance between now and the proposed start.
    pub lead_minutes: i64,
    /// Starts are aligned to this many minutes past the hour.
    pub granularity_minutes: u32,
    pub default_duration_minutes: i64,
    /// Nothing new starts this close to the end of the working day.
    pub closing_minutes: i64,
}

impl Default for SlotRules {
    fn default() -> Self {
        Self {
            lead_minutes: 30,
            granularity_minutes: 15,
            default_duration_minutes: 30,
            closing_minutes: 30,
        }
    }
}

impl From<&SchedulerConfig> for SlotRules {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            lead_minutes: config.lead_minutes.clamp(0, MAX_ESTIMATE_MINUTES),
            granularity_minutes: config.granularity_minutes.max(1),
            default_duration_minutes: config.default_duration_minutes.clamp(1, MAX_ESTIMATE_MINUTES),
            ..Self::default()
        }
    }
}

/// Earliest start for `request` with the default rules.
pub fn compute_slot(request: &ScheduleRequest, window: &WorkWindow, now: NaiveDateTime) -> NaiveDateTime {
    compute_slot_with(request, window, &SlotRules::default(), now)
}

/// Earliest start for `request`.
pub fn compute_slot_with(
    request: &ScheduleRequest,
    window: &WorkWindow,
    rules: &SlotRules,
    now: NaiveDateTime,
) -> NaiveDateTime {
    let now = truncate_seconds(now);
    let today = now.date();
    let closing = i64::from(window.evening_end) * 60 - rules.closing_minutes;
    let tomorrow_morning = at_hour(today + Duration::days(1), window.morning_start);

    let mut candidate = if minute_of_day(now) < i64::from(window.morning_start) * 60 {
        at_hour(today, window.morning_start)
    } else if minute_of_day(now) >= closing {
        tomorrow_morning
    } else {
        let lead = rules.lead_minutes.clamp(0, MAX_ESTIMATE_MINUTES);
        let rounded = round_up(now + Duration::minutes(lead), rules.granularity_minutes);
        if rounded.date() > today || minute_of_day(rounded) >= closing {
            tomorrow_morning
        } else {
            rounded
        }
    };

    let duration = Duration::minutes(effective_duration(request.duration_minutes, rules));
    let mut occupied: Vec<OccupiedInterval> = request
        .occupied
        .iter()
        .filter(|iv| iv.end > iv.start)
        .copied()
        .collect();
    occupied.sort_by_key(|iv| iv.start);

    // Each interval pushes the candidate at most once and every lunch exit is
    // followed by a push or the end of the search.
    for _ in 0..2 * occupied.len() + 3 {
        let mut moved = false;
        for iv in &occupied {
            if iv.overlaps(candidate, candidate + duration) {
                candidate = iv.end;
                moved = true;
            }
        }
        if let Some(after_lunch) = lunch_exit(candidate, window) {
            candidate = after_lunch;
            continue;
        }
        if !moved {
            break;
        }
    }
    candidate
}

/// Start used when the task list cannot be read: now, rounded up.
pub fn fallback_slot(now: NaiveDateTime, rules: &SlotRules) -> NaiveDateTime {
    round_up(now, rules.granularity_minutes)
}

/// Duration actually planned for a request, capped at one day.
pub fn effective_duration(requested: i64, rules: &SlotRules) -> i64 {
    let minutes = if requested > 0 {
        requested
    } else {
        rules.default_duration_minutes
    };
    minutes.clamp(1, MAX_ESTIMATE_MINUTES)
}

/// Round up to the next multiple of `granularity` minutes past the hour.
/// Seconds are dropped first, so 14:00:40 stays 14:00.
pub fn round_up(at: NaiveDateTime, granularity: u32) -> NaiveDateTime {
    let at = truncate_seconds(at);
    let granularity = granularity.max(1);
    match at.minute() % granularity {
        0 => at,
        rem => at + Duration::minutes(i64::from(granularity - rem)),
    }
}

fn lunch_exit(candidate: NaiveDateTime, window: &WorkWindow) -> Option<NaiveDateTime> {
    // A break covering the whole day has no exit.
    if window.lunch_end.saturating_sub(window.lunch_start) >= 24 {
        return None;
    }
    let minute = minute_of_day(candidate);
    let in_lunch = minute >= i64::from(window.lunch_start) * 60 && minute < i64::from(window.lunch_end) * 60;
    in_lunch.then(|| at_hour(candidate.date(), window.lunch_end))
}

fn truncate_seconds(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_time(NaiveTime::MIN) + Duration::minutes(i64::from(at.hour()) * 60 + i64::from(at.minute()))
}

fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour))
}

fn minute_of_day(at: NaiveDateTime) -> i64 {
    i64::from(at.hour()) * 60 + i64::from(at.minute())
}
