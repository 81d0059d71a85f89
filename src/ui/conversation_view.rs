use chrono::{Local, Utc};
use gtk4::prelude::*;
use gtk4 as gtk;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::api::models::{MessageKind, Report};
use crate::api::{ApiClient, ApiError, PAGE_SIZE};
use crate::conversation::grouping::{self, DisplayItem};
use crate::conversation::state::{DeleteRequest, PageRequest};
use crate::conversation::{ConversationState, FetchStatus, MessageEntry, MessageMode};
use crate::ui::dialogs;

/// Message thread of one report: history, composer, inline edit and delete.
pub struct ConversationView {
    inner: Rc<Inner>,
}

struct Inner {
    root: gtk::Box,
    window: gtk::Window,
    client: Arc<ApiClient>,
    state: RefCell<ConversationState>,
    on_unauthorized: Rc<dyn Fn()>,
    scroller: gtk::ScrolledWindow,
    list: gtk::Box,
    load_more_btn: gtk::Button,
    composer: gtk::Box,
    entry: gtk::Entry,
    send_btn: gtk::Button,
    notice: gtk::Label,
    shown_modifiable: RefCell<Vec<String>>,
}

/// How often expired Edit/Delete buttons are re-checked.
const AFFORDANCE_REFRESH_SECS: u32 = 30;

impl ConversationView {
    pub fn new(
        window: &gtk::Window,
        client: Arc<ApiClient>,
        report: &Report,
        current_user_id: &str,
        on_unauthorized: Rc<dyn Fn()>,
    ) -> Self {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);

        root.append(&report_header(report));

        let load_more_btn = gtk::Button::with_label("Load Older Messages");
        load_more_btn.add_css_class("flat");
        load_more_btn.set_halign(gtk::Align::Center);
        load_more_btn.set_visible(false);

        let list = gtk::Box::new(gtk::Orientation::Vertical, 6);
        let column = gtk::Box::new(gtk::Orientation::Vertical, 6);
        column.append(&load_more_btn);
        column.append(&list);

        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .build();
        scroller.set_child(Some(&column));
        root.append(&scroller);

        let notice = gtk::Label::new(None);
        notice.add_css_class("dim-label");
        notice.set_wrap(true);
        root.append(&notice);

        let composer = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let entry = gtk::Entry::new();
        entry.set_hexpand(true);
        entry.set_placeholder_text(Some("Type a message…"));
        let send_btn = gtk::Button::with_label("Send");
        send_btn.add_css_class("suggested-action");
        composer.append(&entry);
        composer.append(&send_btn);
        root.append(&composer);

        let inner = Rc::new(Inner {
            root,
            window: window.clone(),
            client,
            state: RefCell::new(ConversationState::new(report, current_user_id)),
            on_unauthorized,
            scroller,
            list,
            load_more_btn,
            composer,
            entry,
            send_btn,
            notice,
            shown_modifiable: RefCell::default(),
        });

        {
            let weak = Rc::downgrade(&inner);
            inner.load_more_btn.connect_clicked(move |_| with(&weak, Inner::load_more));
        }
        {
            let weak = Rc::downgrade(&inner);
            inner.send_btn.connect_clicked(move |_| with(&weak, Inner::send));
        }
        {
            let weak = Rc::downgrade(&inner);
            inner.entry.connect_activate(move |_| with(&weak, Inner::send));
        }

        {
            let weak = Rc::downgrade(&inner);
            glib::timeout_add_seconds_local(AFFORDANCE_REFRESH_SECS, move || match weak.upgrade() {
                Some(inner) => {
                    inner.refresh_affordances();
                    glib::ControlFlow::Continue
                }
                None => glib::ControlFlow::Break,
            });
        }

        inner.render();
        inner.load_initial();
        Self { inner }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.inner.root.clone().upcast()
    }
}

fn with(weak: &Weak<Inner>, f: impl FnOnce(&Rc<Inner>)) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}

fn report_header(report: &Report) -> gtk::Widget {
    let header = gtk::Box::new(gtk::Orientation::Vertical, 2);
    let title = gtk::Label::new(Some(&report.title()));
    title.add_css_class("title-3");
    title.set_halign(gtk::Align::Start);
    header.append(&title);

    let mut details = vec![report.status.label().to_string()];
    if let Some(name) = report.reporter.as_ref().and_then(|r| r.name.as_deref()) {
        details.push(format!("Reported by {name}"));
    }
    if let Some(booking) = report.booking_id.as_deref() {
        details.push(format!("Booking {booking}"));
    }
    let subtitle = gtk::Label::new(Some(&details.join(" · ")));
    subtitle.add_css_class("dim-label");
    subtitle.set_halign(gtk::Align::Start);
    header.append(&subtitle);
    header.upcast()
}

fn body_widget(entry: &MessageEntry) -> gtk::Widget {
    let msg = &entry.message;
    let text = match msg.kind {
        MessageKind::Text => msg.text.clone(),
        MessageKind::Image => format!("🖼 Image ({} attachment(s))", msg.attachments.len()),
        MessageKind::File => format!("📎 File ({} attachment(s))", msg.attachments.len()),
        MessageKind::Voice => "🎤 Voice message".to_string(),
        MessageKind::Unknown => "Unsupported message".to_string(),
    };
    let label = gtk::Label::new(Some(&text));
    label.set_wrap(true);
    label.set_xalign(0.0);
    label.set_selectable(true);
    label.upcast()
}

impl Inner {
    fn handle_error(&self, heading: &str, err: &ApiError) {
        if err.is_unauthorized() {
            log::info!("Session rejected by server, signing out");
            (self.on_unauthorized)();
        } else {
            dialogs::show_error(&self.window, heading, err);
        }
    }

    fn scroll_to_latest(&self) {
        let scroller = self.scroller.clone();
        glib::idle_add_local_once(move || {
            let adj = scroller.vadjustment();
            adj.set_value(adj.upper() - adj.page_size());
        });
    }

    fn load_initial(self: &Rc<Self>) {
        let req = self.state.borrow_mut().begin_initial_load();
        if let Some(req) = req {
            self.fetch_page(req);
        }
    }

    fn load_more(self: &Rc<Self>) {
        let req = self.state.borrow_mut().begin_load_more();
        if let Some(req) = req {
            self.fetch_page(req);
        }
    }

    fn fetch_page(self: &Rc<Self>, req: PageRequest) {
        self.render();
        let client = self.client.clone();
        let call = req.clone();
        let rx = crate::utils::run_async_to_main(async move {
            client
                .conversation_messages(&call.report_id, &call.conversation_id, call.page, PAGE_SIZE)
                .await
        });
        let weak = Rc::downgrade(self);
        rx.attach(None, move |res| {
            with(&weak, |inner| match res {
                Ok(page) => {
                    log::debug!("Loaded page {} of report {}", req.page, req.report_id);
                    let update = inner.state.borrow_mut().apply_page(page, req.append);
                    inner.render();
                    if update.scrolls_to_latest() {
                        inner.scroll_to_latest();
                    }
                }
                Err(err) => {
                    inner.state.borrow_mut().load_failed();
                    inner.render();
                    if err.is_unauthorized() {
                        inner.handle_error("Could not load messages", &err);
                    } else {
                        log::warn!("Failed to load page {} of report {}: {err}", req.page, req.report_id);
                    }
                }
            });
            glib::ControlFlow::Break
        });
    }

    fn send(self: &Rc<Self>) {
        if !self.send_btn.is_sensitive() {
            return;
        }
        let req = self.state.borrow().prepare_send(&self.entry.text());
        let Some(req) = req else {
            return;
        };
        self.send_btn.set_sensitive(false);
        let client = self.client.clone();
        let rx = crate::utils::run_async_to_main(async move {
            client
                .send_message(&req.report_id, &req.conversation_id, &req.text)
                .await
        });
        let weak = Rc::downgrade(self);
        rx.attach(None, move |res| {
            with(&weak, |inner| {
                inner.send_btn.set_sensitive(true);
                match res {
                    Ok(message) => {
                        inner.entry.set_text("");
                        let update = inner.state.borrow_mut().apply_sent(message);
                        inner.render();
                        if update.is_some_and(|u| u.scrolls_to_latest()) {
                            inner.scroll_to_latest();
                        }
                    }
                    Err(err) => inner.handle_error("Message not sent", &err),
                }
            });
            glib::ControlFlow::Break
        });
    }

    fn start_edit(self: &Rc<Self>, message_id: &str) {
        let started = self.state.borrow_mut().start_edit(message_id, Utc::now());
        if !started {
            self.edit_window_closed();
        }
        self.render();
    }

    fn edit_window_closed(self: &Rc<Self>) {
        log::debug!("Edit window closed; refusing action");
        dialogs::show_notice(
            &self.window,
            "Message can no longer be changed",
            "Messages can only be edited or deleted within an hour of sending.",
        );
    }

    /// Re-renders when a message's edit window has closed since the last
    /// render. An open editor is left alone.
    fn refresh_affordances(self: &Rc<Self>) {
        let stale = {
            let state = self.state.borrow();
            state.editing_id().is_none()
                && state.modifiable_ids(Utc::now()) != *self.shown_modifiable.borrow()
        };
        if stale {
            self.render();
        }
    }

    fn cancel_edit(self: &Rc<Self>, message_id: &str) {
        self.state.borrow_mut().cancel_edit(message_id);
        self.render();
    }

    fn save_edit(self: &Rc<Self>, message_id: &str) {
        let req = self.state.borrow().prepare_edit(message_id);
        let Some(req) = req else {
            return;
        };
        let client = self.client.clone();
        let call = req.clone();
        let rx = crate::utils::run_async_to_main(async move {
            client
                .edit_message(&call.report_id, &call.conversation_id, &call.message_id, &call.text)
                .await
        });
        let weak = Rc::downgrade(self);
        rx.attach(None, move |res| {
            with(&weak, |inner| match res {
                Ok(_) => {
                    inner.state.borrow_mut().apply_edit(&req);
                    inner.render();
                }
                Err(err) => inner.handle_error("Message not updated", &err),
            });
            glib::ControlFlow::Break
        });
    }

    fn confirm_delete(self: &Rc<Self>, message_id: &str) {
        let req = self.state.borrow().prepare_delete(message_id, Utc::now());
        let Some(req) = req else {
            self.edit_window_closed();
            self.render();
            return;
        };
        let weak = Rc::downgrade(self);
        dialogs::confirm_destructive(
            &self.window,
            "Delete message?",
            "The message will be removed from this conversation.",
            "Delete",
            move || with(&weak, |inner| inner.delete(req.clone())),
        );
    }

    fn delete(self: &Rc<Self>, req: DeleteRequest) {
        let client = self.client.clone();
        let call = req.clone();
        let rx = crate::utils::run_async_to_main(async move {
            client
                .delete_message(&call.report_id, &call.conversation_id, &call.message_id)
                .await
        });
        let weak = Rc::downgrade(self);
        rx.attach(None, move |res| {
            with(&weak, |inner| match res {
                Ok(()) => {
                    inner.state.borrow_mut().apply_delete(&req);
                    inner.render();
                }
                Err(err) => inner.handle_error("Message not deleted", &err),
            });
            glib::ControlFlow::Break
        });
    }

    fn render(self: &Rc<Self>) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }

        let state = self.state.borrow();
        let now = Utc::now();
        self.shown_modifiable.replace(state.modifiable_ids(now));
        let loading = state.fetch_status();
        self.load_more_btn.set_visible(state.has_more());
        self.load_more_btn.set_sensitive(loading == FetchStatus::Idle);
        self.load_more_btn.set_label(if loading == FetchStatus::LoadingMore {
            "Loading…"
        } else {
            "Load Older Messages"
        });

        if state.conversation_id().is_none() {
            self.list.append(&placeholder("No conversation yet for this report."));
        } else if state.is_empty() {
            let text = if loading == FetchStatus::LoadingInitial {
                "Loading messages…"
            } else {
                "No messages yet. Start the conversation below."
            };
            self.list.append(&placeholder(text));
        } else {
            for item in grouping::display_items(state.entries(), &Local) {
                match item {
                    DisplayItem::DateHeader(day) => {
                        let label = gtk::Label::new(Some(&grouping::date_label(day)));
                        label.add_css_class("date-separator");
                        label.add_css_class("dim-label");
                        label.set_halign(gtk::Align::Center);
                        self.list.append(&label);
                    }
                    DisplayItem::Message(entry) => {
                        self.list.append(&self.bubble(&state, entry, now));
                    }
                }
            }
        }

        let composer_open = state.composer_available();
        self.composer.set_visible(composer_open);
        if composer_open {
            self.notice.set_visible(false);
        } else {
            self.notice.set_visible(true);
            self.notice.set_label(&match state.conversation_id() {
                None => "Messaging starts once a conversation exists for this report.".to_string(),
                Some(_) => format!(
                    "This report is {}; new messages are closed.",
                    state.status().label().to_lowercase()
                ),
            });
        }
    }

    fn bubble(
        self: &Rc<Self>,
        state: &ConversationState,
        entry: &MessageEntry,
        now: chrono::DateTime<Utc>,
    ) -> gtk::Widget {
        let msg = &entry.message;
        let own = state.is_own(msg);

        let bubble = gtk::Box::new(gtk::Orientation::Vertical, 4);
        bubble.add_css_class("bubble");
        bubble.add_css_class(if own { "bubble-own" } else { "bubble-other" });
        bubble.set_halign(if own { gtk::Align::End } else { gtk::Align::Start });

        if !own {
            let who = match (msg.sender_name.as_deref(), msg.sender_role.as_deref()) {
                (Some(name), Some(role)) => format!("{name} · {role}"),
                (Some(name), None) => name.to_string(),
                (None, Some(role)) => role.to_string(),
                (None, None) => "Unknown sender".to_string(),
            };
            let sender = gtk::Label::new(Some(&who));
            sender.add_css_class("caption-heading");
            sender.set_halign(gtk::Align::Start);
            bubble.append(&sender);
        }

        match &entry.mode {
            MessageMode::Viewing => bubble.append(&body_widget(entry)),
            MessageMode::Editing { draft } => bubble.append(&self.editor(&msg.id, draft)),
        }

        let footer = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        let time = gtk::Label::new(Some(&grouping::time_label(msg.created_at, &Local)));
        time.add_css_class("caption");
        time.add_css_class("dim-label");
        footer.append(&time);

        // Other edit buttons stay hidden while a draft is open.
        if entry.mode == MessageMode::Viewing {
            if state.editing_id().is_none() && state.can_modify(msg, now) {
                let edit_btn = gtk::Button::with_label("Edit");
                edit_btn.add_css_class("flat");
                let weak = Rc::downgrade(self);
                let id = msg.id.clone();
                edit_btn.connect_clicked(move |_| with(&weak, |inner| inner.start_edit(&id)));
                footer.append(&edit_btn);
            }
            if state.can_delete(msg, now) {
                let delete_btn = gtk::Button::with_label("Delete");
                delete_btn.add_css_class("flat");
                delete_btn.add_css_class("destructive-action");
                let weak = Rc::downgrade(self);
                let id = msg.id.clone();
                delete_btn.connect_clicked(move |_| with(&weak, |inner| inner.confirm_delete(&id)));
                footer.append(&delete_btn);
            }
        }
        bubble.append(&footer);
        bubble.upcast()
    }

    fn editor(self: &Rc<Self>, message_id: &str, draft: &str) -> gtk::Widget {
        let editor = gtk::Box::new(gtk::Orientation::Vertical, 4);
        let text_view = gtk::TextView::new();
        text_view.set_wrap_mode(gtk::WrapMode::WordChar);
        text_view.add_css_class("message-editor");
        let buffer = text_view.buffer();
        buffer.set_text(draft);
        {
            let weak = Rc::downgrade(self);
            let id = message_id.to_string();
            buffer.connect_changed(move |buf| {
                let text = buf.text(&buf.start_iter(), &buf.end_iter(), false);
                with(&weak, |inner| inner.state.borrow_mut().set_draft(&id, &text));
            });
        }
        editor.append(&text_view);

        let actions = gtk::Box::new(gtk::Orientation::Horizontal, 6);
        actions.set_halign(gtk::Align::End);
        let cancel_btn = gtk::Button::with_label("Cancel");
        let save_btn = gtk::Button::with_label("Save");
        save_btn.add_css_class("suggested-action");
        {
            let weak = Rc::downgrade(self);
            let id = message_id.to_string();
            cancel_btn.connect_clicked(move |_| with(&weak, |inner| inner.cancel_edit(&id)));
        }
        {
            let weak = Rc::downgrade(self);
            let id = message_id.to_string();
            save_btn.connect_clicked(move |_| with(&weak, |inner| inner.save_edit(&id)));
        }
        actions.append(&cancel_btn);
        actions.append(&save_btn);
        editor.append(&actions);
        text_view.grab_focus();
        editor.upcast()
    }
}

fn placeholder(text: &str) -> gtk::Label {
    let label = gtk::Label::new(Some(text));
    label.add_css_class("dim-label");
    label.set_vexpand(true);
    label.set_valign(gtk::Align::Center);
    label
}
