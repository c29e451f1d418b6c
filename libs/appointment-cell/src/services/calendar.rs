use chrono::{Datelike, FixedOffset, NaiveDateTime, NaiveTime, Offset, Utc, Weekday};
use tracing::debug;

use crate::models::{AppointmentError, OpeningHours};

/// Weekly opening hours of the clinic. Pure lookup, no state.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicCalendar {
    // indexed by `Weekday::num_days_from_monday`
    hours: [Option<OpeningHours>; 7],
    utc_offset: FixedOffset,
}

impl Default for ClinicCalendar {
    fn default() -> Self {
        let weekday = hours(9, 0, 18, 0);
        Self {
            hours: [weekday, weekday, weekday, weekday, weekday, hours(10, 0, 14, 0), None],
            utc_offset: utc(),
        }
    }
}

fn hours(open_h: u32, open_m: u32, close_h: u32, close_m: u32) -> Option<OpeningHours> {
    Some(OpeningHours {
        open: NaiveTime::from_hms_opt(open_h, open_m, 0)?,
        close: NaiveTime::from_hms_opt(close_h, close_m, 0)?,
    })
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl ClinicCalendar {
    /// Calendar with every day closed; fill it with `with_hours`.
    pub fn closed() -> Self {
        Self { hours: [None; 7], utc_offset: utc() }
    }

    pub fn with_hours(mut self, weekday: Weekday, open: NaiveTime, close: NaiveTime) -> Result<Self, AppointmentError> {
        if open >= close {
            return Err(AppointmentError::InvalidRequest(format!(
                "opening time {} must be before closing time {} on {}",
                open, close, weekday
            )));
        }
        self.hours[weekday.num_days_from_monday() as usize] = Some(OpeningHours { open, close });
        Ok(self)
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Result<Self, AppointmentError> {
        self.utc_offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            AppointmentError::InvalidRequest(format!("invalid clinic UTC offset: {} minutes", minutes))
        })?;
        Ok(self)
    }

    /// Parse `mon=09:00-18:00;tue=09:00-18:00;sat=10:00-14:00`. Unlisted days are closed.
    pub fn parse(spec: &str) -> Result<Self, AppointmentError> {
        let invalid = |msg: String| AppointmentError::InvalidRequest(msg);
        let mut calendar = Self::closed();

        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (day, range) = entry
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected day=HH:MM-HH:MM, got {:?}", entry)))?;
            let weekday: Weekday = day
                .trim()
                .parse()
                .map_err(|_| invalid(format!("unknown weekday {:?}", day)))?;
            let (open, close) = range
                .split_once('-')
                .ok_or_else(|| invalid(format!("expected HH:MM-HH:MM, got {:?}", range)))?;
            let open = NaiveTime::parse_from_str(open.trim(), "%H:%M")
                .map_err(|e| invalid(format!("bad opening time {:?}: {}", open, e)))?;
            let close = NaiveTime::parse_from_str(close.trim(), "%H:%M")
                .map_err(|e| invalid(format!("bad closing time {:?}: {}", close, e)))?;

            calendar = calendar.with_hours(weekday, open, close)?;
        }

        debug!("Parsed clinic calendar from {:?}", spec);
        Ok(calendar)
    }

    pub fn hours_for(&self, weekday: Weekday) -> Option<OpeningHours> {
        self.hours[weekday.num_days_from_monday() as usize]
    }

    /// `open <= time < close` on the timestamp's weekday. Closing time is not bookable.
    pub fn is_within_hours(&self, timestamp: NaiveDateTime) -> bool {
        match self.hours_for(timestamp.weekday()) {
            Some(h) => h.open <= timestamp.time() && timestamp.time() < h.close,
            None => false,
        }
    }

    /// Start is bookable and the whole interval ends by closing time of the same day.
    pub fn interval_within_hours(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if start >= end || !self.is_within_hours(start) || end.date() != start.date() {
            return false;
        }
        self.hours_for(start.weekday())
            .map(|h| end.time() <= h.close)
            .unwrap_or(false)
    }

    /// Current clinic wall-clock time.
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }
}
