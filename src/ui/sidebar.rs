use chrono::{Local, TimeZone};
use gtk4::prelude::*;
use gtk4 as gtk;
use std::fmt::Display;
use std::cell::RefCell;
use std::rc::Rc;

use crate::storage::RecentReport;

pub struct Sidebar {
    root: gtk::Box,
    list: gtk::ListBox,
    ids: Rc<RefCell<Vec<String>>>,
}

impl Sidebar {
    pub fn new<F>(on_open: F) -> Self
    where
        F: Fn(String) + 'static,
    {
        let root = gtk::Box::new(gtk::Orientation::Vertical, 6);
        root.set_margin_top(8);
        root.set_margin_bottom(8);
        root.set_margin_start(8);
        root.set_margin_end(8);
        root.set_width_request(240);

        let title = gtk::Label::new(Some("Recent Reports"));
        title.add_css_class("heading");
        title.set_halign(gtk::Align::Start);
        root.append(&title);

        let list = gtk::ListBox::new();
        list.add_css_class("navigation-sidebar");
        let scroller = gtk::ScrolledWindow::builder()
            .vexpand(true)
            .hscrollbar_policy(gtk::PolicyType::Never)
            .child(&list)
            .build();
        root.append(&scroller);

        let ids: Rc<RefCell<Vec<String>>> = Rc::default();
        {
            let ids = ids.clone();
            list.connect_row_activated(move |_, row| {
                let id = usize::try_from(row.index())
                    .ok()
                    .and_then(|i| ids.borrow().get(i).cloned());
                if let Some(id) = id {
                    on_open(id);
                }
            });
        }

        Self { root, list, ids }
    }

    pub fn widget(&self) -> gtk::Widget {
        self.root.clone().upcast()
    }

    pub fn set_items(&self, items: Vec<RecentReport>) {
        while let Some(child) = self.list.first_child() {
            self.list.remove(&child);
        }
        let mut ids = self.ids.borrow_mut();
        ids.clear();
        for report in items {
            let row = gtk::ListBoxRow::new();
            let cell = gtk::Box::new(gtk::Orientation::Vertical, 2);
            cell.set_margin_top(6);
            cell.set_margin_bottom(6);
            cell.set_margin_start(8);
            cell.set_margin_end(8);

            let title = gtk::Label::new(Some(&report.title));
            title.set_halign(gtk::Align::Start);
            title.set_ellipsize(gtk::pango::EllipsizeMode::End);
            cell.append(&title);

            let status = gtk::Label::new(Some(&caption(&report, &Local)));
            status.add_css_class("caption");
            status.add_css_class("dim-label");
            status.set_halign(gtk::Align::Start);
            cell.append(&status);

            row.set_child(Some(&cell));
            self.list.append(&row);
            ids.push(report.id);
        }
    }
}

/// Status line under a recent report's title.
fn caption<Tz>(report: &RecentReport, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let opened = report.opened_at.with_timezone(tz).format("%b %-d, %H:%M");
    match report.conversation_id {
        Some(_) => format!("{} · opened {opened}", report.status.label()),
        None => format!("{} · no conversation · opened {opened}", report.status.label()),
    }
}
