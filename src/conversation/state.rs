//! View state of one report conversation.
//!
//! Every user action is split in two: a `prepare_*`/`begin_*` call that
//! validates against the current state and yields the request to issue (or
//! `None` for a no-op), and an `apply_*` call that folds the server's
//! confirmation back in. Failures leave the list untouched.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::api::models::{Message, MessagePage, Report, ReportStatus};
use crate::conversation::policy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    LoadingInitial,
    LoadingMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageMode {
    Viewing,
    Editing { draft: String },
}

#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub message: Message,
    pub mode: MessageMode,
}

impl MessageEntry {
    fn viewing(message: Message) -> Self {
        Self {
            message,
            mode: MessageMode::Viewing,
        }
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.mode {
            MessageMode::Editing { draft } => Some(draft.as_str()),
            MessageMode::Viewing => None,
        }
    }
}

/// What changed in the list, so the view knows whether to jump to the newest
/// message. Older history pulled in by "load more" keeps the scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListUpdate {
    Replaced,
    Appended,
    Prepended,
}

impl ListUpdate {
    pub fn scrolls_to_latest(&self) -> bool {
        !matches!(self, ListUpdate::Appended)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub report_id: String,
    pub conversation_id: String,
    pub page: u32,
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub report_id: String,
    pub conversation_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub report_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub report_id: String,
    pub conversation_id: String,
    pub message_id: String,
}

#[derive(Debug)]
pub struct ConversationState {
    report_id: String,
    conversation_id: Option<String>,
    status: ReportStatus,
    current_user_id: String,
    /// Newest first, as the server pages them.
    entries: Vec<MessageEntry>,
    fetch: FetchStatus,
    current_page: u32,
    total_pages: u32,
}

impl ConversationState {
    pub fn new(report: &Report, current_user_id: impl Into<String>) -> Self {
        Self {
            report_id: report.id.clone(),
            conversation_id: report.conversation_id.clone(),
            status: report.status,
            current_user_id: current_user_id.into(),
            entries: Vec::new(),
            fetch: FetchStatus::Idle,
            current_page: 0,
            total_pages: 0,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn status(&self) -> ReportStatus {
        self.status
    }

    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.fetch
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn composer_available(&self) -> bool {
        self.status.is_open() && self.conversation_id.is_some()
    }

    pub fn is_own(&self, message: &Message) -> bool {
        message.sender_id == self.current_user_id
    }

    pub fn can_modify(&self, message: &Message, now: DateTime<Utc>) -> bool {
        policy::can_modify(message, &self.current_user_id, now)
    }

    pub fn can_delete(&self, message: &Message, now: DateTime<Utc>) -> bool {
        policy::can_delete(message, &self.current_user_id, self.status, now)
    }

    pub fn editing_id(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| matches!(e.mode, MessageMode::Editing { .. }))
            .map(|e| e.message.id.as_str())
    }

    fn entry_mut(&mut self, message_id: &str) -> Option<&mut MessageEntry> {
        self.entries.iter_mut().find(|e| e.message.id == message_id)
    }

    fn page_request(&self, page: u32, append: bool) -> Option<PageRequest> {
        Some(PageRequest {
            report_id: self.report_id.clone(),
            conversation_id: self.conversation_id.clone()?,
            page,
            append,
        })
    }

    pub fn begin_initial_load(&mut self) -> Option<PageRequest> {
        if self.fetch != FetchStatus::Idle {
            return None;
        }
        let req = self.page_request(1, false)?;
        self.fetch = FetchStatus::LoadingInitial;
        Some(req)
    }

    /// Refused while any page is in flight, so older pages arrive in order.
    pub fn begin_load_more(&mut self) -> Option<PageRequest> {
        if self.fetch != FetchStatus::Idle || !self.has_more() {
            return None;
        }
        let req = self.page_request(self.current_page + 1, true)?;
        self.fetch = FetchStatus::LoadingMore;
        Some(req)
    }

    pub fn apply_page(&mut self, page: MessagePage, append: bool) -> ListUpdate {
        self.fetch = FetchStatus::Idle;
        self.current_page = page.meta.current_page;
        self.total_pages = page.meta.total_pages;

        let visible = page.items.into_iter().filter(Message::is_displayable);
        if append {
            let mut seen: HashSet<String> =
                self.entries.iter().map(|e| e.message.id.clone()).collect();
            for msg in visible {
                if seen.insert(msg.id.clone()) {
                    self.entries.push(MessageEntry::viewing(msg));
                }
            }
            ListUpdate::Appended
        } else {
            self.entries = visible.map(MessageEntry::viewing).collect();
            ListUpdate::Replaced
        }
    }

    pub fn load_failed(&mut self) {
        self.fetch = FetchStatus::Idle;
    }

    pub fn prepare_send(&self, text: &str) -> Option<SendRequest> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(SendRequest {
            report_id: self.report_id.clone(),
            conversation_id: self.conversation_id.clone()?,
            text: text.to_string(),
        })
    }

    pub fn apply_sent(&mut self, message: Message) -> Option<ListUpdate> {
        if !message.is_displayable() || self.entries.iter().any(|e| e.message.id == message.id) {
            return None;
        }
        self.entries.insert(0, MessageEntry::viewing(message));
        Some(ListUpdate::Prepended)
    }

    /// Ids of the messages that currently offer edit or delete.
    pub fn modifiable_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| self.can_modify(&e.message, now))
            .map(|e| e.message.id.clone())
            .collect()
    }

    /// Opens the inline editor; any other open editor is discarded.
    pub fn start_edit(&mut self, message_id: &str, now: DateTime<Utc>) -> bool {
        let allowed = self
            .entries
            .iter()
            .find(|e| e.message.id == message_id)
            .is_some_and(|e| self.can_modify(&e.message, now));
        if !allowed {
            return false;
        }
        for entry in &mut self.entries {
            entry.mode = if entry.message.id == message_id {
                MessageMode::Editing {
                    draft: entry.message.text.clone(),
                }
            } else {
                MessageMode::Viewing
            };
        }
        true
    }

    pub fn set_draft(&mut self, message_id: &str, text: &str) {
        if let Some(MessageEntry {
            mode: MessageMode::Editing { draft },
            ..
        }) = self.entry_mut(message_id)
        {
            *draft = text.to_string();
        }
    }

    pub fn cancel_edit(&mut self, message_id: &str) {
        if let Some(entry) = self.entry_mut(message_id) {
            entry.mode = MessageMode::Viewing;
        }
    }

    pub fn prepare_edit(&self, message_id: &str) -> Option<EditRequest> {
        let entry = self.entries.iter().find(|e| e.message.id == message_id)?;
        let text = entry.draft()?.trim();
        if text.is_empty() {
            return None;
        }
        Some(EditRequest {
            report_id: self.report_id.clone(),
            conversation_id: self.conversation_id.clone()?,
            message_id: message_id.to_string(),
            text: text.to_string(),
        })
    }

    pub fn apply_edit(&mut self, req: &EditRequest) -> bool {
        match self.entry_mut(&req.message_id) {
            Some(entry) => {
                entry.message.text = req.text.clone();
                entry.mode = MessageMode::Viewing;
                true
            }
            None => false,
        }
    }

    pub fn prepare_delete(&self, message_id: &str, now: DateTime<Utc>) -> Option<DeleteRequest> {
        let entry = self.entries.iter().find(|e| e.message.id == message_id)?;
        if !self.can_delete(&entry.message, now) {
            return None;
        }
        Some(DeleteRequest {
            report_id: self.report_id.clone(),
            conversation_id: self.conversation_id.clone()?,
            message_id: message_id.to_string(),
        })
    }

    pub fn apply_delete(&mut self, req: &DeleteRequest) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.message.id != req.message_id);
        self.entries.len() < before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{MessageKind, PageMeta};
    use chrono::{Duration, TimeZone};

    const ME: &str = "admin-1";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
    }

    fn msg(id: &str, sender: &str, minutes_ago: i64) -> Message {
        Message {
            id: id.into(),
            sender_id: sender.into(),
            sender_name: None,
            sender_role: None,
            text: format!("text {id}"),
            kind: MessageKind::Text,
            attachments: Vec::new(),
            is_deleted: false,
            created_at: t0() - Duration::minutes(minutes_ago),
        }
    }

    fn page(items: Vec<Message>, current_page: u32, total_pages: u32) -> MessagePage {
        MessagePage {
            items,
            meta: PageMeta {
                current_page,
                total_pages,
            },
        }
    }

    fn report(status: ReportStatus, conversation: Option<&str>) -> Report {
        Report {
            id: "r1".into(),
            status,
            booking_id: None,
            reporter: None,
            subject: None,
            conversation_id: conversation.map(str::to_string),
        }
    }

    fn loaded(items: Vec<Message>) -> ConversationState {
        let mut state = ConversationState::new(&report(ReportStatus::Pending, Some("c1")), ME);
        let req = state.begin_initial_load().unwrap();
        state.apply_page(page(items, 1, 1), req.append);
        state
    }

    fn ids(state: &ConversationState) -> Vec<&str> {
        state.entries().iter().map(|e| e.message.id.as_str()).collect()
    }

    #[test]
    fn initial_load_filters_deleted_and_non_text() {
        let mut deleted = msg("d", ME, 5);
        deleted.is_deleted = true;
        let mut image = msg("i", "u2", 6);
        image.kind = MessageKind::Image;
        let state = loaded(vec![msg("a", ME, 1), deleted, image, msg("b", "u2", 7)]);

        assert_eq!(ids(&state), ["a", "b"]);
        assert!(state.entries().iter().all(|e| e.message.is_displayable()));
        assert_eq!(state.fetch_status(), FetchStatus::Idle);
    }

    #[test]
    fn more_pages_enable_load_more_and_append_older() {
        let mut state = ConversationState::new(&report(ReportStatus::Pending, Some("c1")), ME);
        let req = state.begin_initial_load().unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(state.fetch_status(), FetchStatus::LoadingInitial);
        assert_eq!(state.apply_page(page(vec![msg("new", ME, 1)], 1, 3), false), ListUpdate::Replaced);
        assert!(state.has_more());

        let more = state.begin_load_more().unwrap();
        assert_eq!(more.page, 2);
        assert!(more.append);
        let update = state.apply_page(page(vec![msg("old", "u2", 90)], 2, 3), true);
        assert_eq!(update, ListUpdate::Appended);
        assert!(!update.scrolls_to_latest());
        assert_eq!(ids(&state), ["new", "old"]);
    }

    #[test]
    fn load_more_is_refused_while_a_page_is_in_flight() {
        let mut state = ConversationState::new(&report(ReportStatus::Pending, Some("c1")), ME);
        state.begin_initial_load().unwrap();
        state.apply_page(page(vec![msg("a", ME, 1)], 1, 3), false);

        assert!(state.begin_load_more().is_some());
        assert!(state.begin_load_more().is_none());
        assert!(state.begin_initial_load().is_none());

        state.load_failed();
        assert_eq!(state.fetch_status(), FetchStatus::Idle);
        assert_eq!(ids(&state), ["a"]);
        assert!(state.begin_load_more().is_some());
    }

    #[test]
    fn appended_duplicates_are_dropped() {
        let mut state = ConversationState::new(&report(ReportStatus::Pending, Some("c1")), ME);
        state.begin_initial_load().unwrap();
        state.apply_page(page(vec![msg("a", ME, 1), msg("b", ME, 2)], 1, 2), false);
        state.begin_load_more().unwrap();
        state.apply_page(page(vec![msg("b", ME, 2), msg("c", ME, 3)], 2, 2), true);
        assert_eq!(ids(&state), ["a", "b", "c"]);
        assert!(!state.has_more());
        assert!(state.begin_load_more().is_none());
    }

    #[test]
    fn missing_conversation_disables_loading_and_composer() {
        let mut state = ConversationState::new(&report(ReportStatus::Pending, None), ME);
        assert!(state.begin_initial_load().is_none());
        assert!(state.prepare_send("hello").is_none());
        assert!(!state.composer_available());
        assert_eq!(state.fetch_status(), FetchStatus::Idle);
    }

    #[test]
    fn empty_pending_conversation_keeps_composer() {
        let state = loaded(Vec::new());
        assert!(state.is_empty());
        assert!(state.composer_available());
        assert!(!state.has_more());
    }

    #[test]
    fn closed_report_hides_composer() {
        let state = ConversationState::new(&report(ReportStatus::Escalated, Some("c1")), ME);
        assert!(!state.composer_available());
    }

    #[test]
    fn blank_send_is_a_no_op() {
        let state = loaded(vec![msg("a", ME, 1)]);
        assert!(state.prepare_send("").is_none());
        assert!(state.prepare_send("  \n\t ").is_none());
        assert_eq!(state.entries().len(), 1);
    }

    #[test]
    fn sent_message_is_trimmed_and_prepended() {
        let mut state = loaded(vec![msg("a", "u2", 10)]);
        let req = state.prepare_send("  on my way  ").unwrap();
        assert_eq!(req.text, "on my way");
        assert_eq!(req.conversation_id, "c1");

        let mut confirmed = msg("z", ME, 0);
        confirmed.text = req.text.clone();
        let update = state.apply_sent(confirmed).unwrap();
        assert!(update.scrolls_to_latest());
        assert_eq!(ids(&state), ["z", "a"]);
        assert!(state.apply_sent(msg("z", ME, 0)).is_none());
    }

    #[test]
    fn edit_round_trip() {
        let mut state = loaded(vec![msg("a", ME, 5), msg("b", "u2", 6)]);
        assert!(!state.start_edit("b", t0()));
        assert!(state.start_edit("a", t0()));
        assert_eq!(state.editing_id(), Some("a"));
        assert_eq!(state.entries()[0].draft(), Some("text a"));

        state.set_draft("a", "  fixed typo ");
        let req = state.prepare_edit("a").unwrap();
        assert_eq!(req.text, "fixed typo");
        assert!(state.apply_edit(&req));
        assert_eq!(state.entries()[0].message.text, "fixed typo");
        assert_eq!(state.editing_id(), None);
    }

    #[test]
    fn blank_edit_is_rejected_and_draft_kept() {
        let mut state = loaded(vec![msg("a", ME, 5)]);
        state.start_edit("a", t0());
        state.set_draft("a", "   ");
        assert!(state.prepare_edit("a").is_none());
        assert_eq!(state.entries()[0].draft(), Some("   "));
    }

    #[test]
    fn cancel_edit_restores_original() {
        let mut state = loaded(vec![msg("a", ME, 5)]);
        state.start_edit("a", t0());
        state.set_draft("a", "something else");
        state.cancel_edit("a");
        assert_eq!(state.editing_id(), None);
        assert_eq!(state.entries()[0].message.text, "text a");
    }

    #[test]
    fn only_one_editor_open_at_a_time() {
        let mut state = loaded(vec![msg("a", ME, 5), msg("b", ME, 6)]);
        state.start_edit("a", t0());
        state.start_edit("b", t0());
        assert_eq!(state.editing_id(), Some("b"));
        assert_eq!(state.entries()[0].mode, MessageMode::Viewing);
    }

    #[test]
    fn edit_window_boundary() {
        let mut state = loaded(vec![msg("a", ME, 60)]);
        assert!(state.can_modify(&state.entries()[0].message, t0() - Duration::seconds(1)));
        assert!(!state.can_modify(&state.entries()[0].message, t0() + Duration::seconds(1)));
        assert!(!state.start_edit("a", t0() + Duration::seconds(1)));
    }

    #[test]
    fn actions_are_refused_once_the_window_passes() {
        let state_at = |now| loaded(vec![msg("a", ME, 59), msg("b", "u2", 1)]).modifiable_ids(now);
        assert_eq!(state_at(t0()), ["a"]);
        assert!(state_at(t0() + Duration::minutes(2)).is_empty());

        let mut state = loaded(vec![msg("a", ME, 59)]);
        let later = t0() + Duration::minutes(2);
        assert!(!state.start_edit("a", later));
        assert!(state.prepare_delete("a", later).is_none());
        assert_eq!(state.editing_id(), None);
        assert_eq!(state.entries().len(), 1);
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut state = loaded(vec![msg("a", ME, 5), msg("b", "u2", 6), msg("c", ME, 7)]);
        assert!(state.prepare_delete("b", t0()).is_none());
        let req = state.prepare_delete("a", t0()).unwrap();
        assert!(state.apply_delete(&req));
        assert_eq!(state.entries().len(), 2);
        assert!(!ids(&state).contains(&"a"));
        assert!(!state.apply_delete(&req));
    }

    #[test]
    fn delete_unavailable_once_report_leaves_pending() {
        let mut state = ConversationState::new(&report(ReportStatus::Resolved, Some("c1")), ME);
        state.begin_initial_load().unwrap();
        state.apply_page(page(vec![msg("a", ME, 5)], 1, 1), false);
        assert!(state.can_modify(&state.entries()[0].message, t0()));
        assert!(state.prepare_delete("a", t0()).is_none());
    }
}
