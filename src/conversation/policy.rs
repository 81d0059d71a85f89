use chrono::{DateTime, Duration, Utc};

use crate::api::models::{Message, ReportStatus};

/// How long after sending a message its author may still change it.
pub const EDIT_WINDOW_SECS: i64 = 60 * 60;

pub fn within_edit_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(created_at) <= Duration::seconds(EDIT_WINDOW_SECS)
}

pub fn can_modify(message: &Message, current_user_id: &str, now: DateTime<Utc>) -> bool {
    message.sender_id == current_user_id && within_edit_window(message.created_at, now)
}

pub fn can_delete(
    message: &Message,
    current_user_id: &str,
    status: ReportStatus,
    now: DateTime<Utc>,
) -> bool {
    status.is_open() && can_modify(message, current_user_id, now)
}
