use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::conversation::state::MessageEntry;

#[derive(Debug, Clone, Copy)]
pub enum DisplayItem<'a> {
    DateHeader(NaiveDate),
    Message(&'a MessageEntry),
}

/// Lays entries out oldest to newest, with a date header whenever the
/// calendar day in `tz` changes (and before the first message).
pub fn display_items<'a, Tz: TimeZone>(entries: &'a [MessageEntry], tz: &Tz) -> Vec<DisplayItem<'a>> {
    let mut out = Vec::with_capacity(entries.len() + 1);
    let mut last_day: Option<NaiveDate> = None;
    for entry in entries.iter().rev() {
        let day = entry.message.created_at.with_timezone(tz).date_naive();
        if last_day != Some(day) {
            out.push(DisplayItem::DateHeader(day));
            last_day = Some(day);
        }
        out.push(DisplayItem::Message(entry));
    }
    out
}

pub fn date_label(day: NaiveDate) -> String {
    day.format("%b %-d, %Y").to_string()
}

pub fn time_label<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format("%H:%M").to_string()
}
