// src/core/timestamp.rs
use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

/// Name format of the per-day output directories, e.g. `20240110`.
pub const DATE_DIR_FORMAT: &str = "%Y%m%d";

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn date_dir_name(date: NaiveDate) -> String {
    date.format(DATE_DIR_FORMAT).to_string()
}

pub fn parse_date_dir(name: &str) -> Option<NaiveDate> {
    if name.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(name, DATE_DIR_FORMAT).ok()
}

/// Days whose directories must exist at `now`: today, plus tomorrow once
/// local midnight is less than `lead` away.
pub fn days_to_provision(now: NaiveDateTime, lead: TimeDelta) -> (NaiveDate, Option<NaiveDate>) {
    let today = now.date();
    let ahead = (now + lead).date();
    let tomorrow = (ahead != today).then_some(ahead);
    (today, tomorrow)
}
