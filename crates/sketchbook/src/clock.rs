use chrono::{Local, NaiveDate};
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

pub const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

pub fn unix_now_ms() -> u64 {
    system_time_ms(SystemTime::now())
}

pub(crate) fn system_time_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Birth time where the platform records one, otherwise modification time.
pub(crate) fn created_ms(meta: &Metadata) -> u64 {
    meta.created()
        .or_else(|_| meta.modified())
        .map(system_time_ms)
        .unwrap_or(0)
}

pub(crate) fn modified_ms(meta: &Metadata) -> u64 {
    meta.modified().map(system_time_ms).unwrap_or(0)
}

pub(crate) fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn local_time_label() -> String {
    Local::now().format("%H:%M").to_string()
}
