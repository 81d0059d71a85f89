use adw::prelude::*;
use adw::Application;
use chrono::Utc;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::api::models::Report;
use crate::api::{ApiClient, ApiError};
use crate::app::AppState;
use crate::storage;
use crate::ui::conversation_view::ConversationView;
use crate::ui::sidebar::Sidebar;

const RECENT_LIMIT: usize = 50;

fn load_recent(sidebar: &Sidebar) {
    match storage::open().and_then(|conn| storage::recent_reports(&conn, RECENT_LIMIT)) {
        Ok(items) => sidebar.set_items(items),
        Err(e) => log::warn!("Recent reports unavailable: {e}"),
    }
}

fn remember(report: &Report) {
    if let Err(e) = storage::open().and_then(|conn| storage::upsert_report(&conn, report, Utc::now())) {
        log::warn!("Could not cache report {}: {e}", report.id);
    }
}

pub fn show_main_window(app: &Application) {
    let state = AppState::load();
    let (client, admin) = match (state.client_config().and_then(ApiClient::new), state.admin.clone()) {
        (Ok(client), Some(admin)) => (Arc::new(client), admin),
        (Err(e), _) => {
            log::error!("Stored settings unusable: {e}");
            crate::ui::login::show_login_window(app);
            return;
        }
        (_, None) => {
            crate::ui::login::show_login_window(app);
            return;
        }
    };

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Crowdship Admin")
        .default_width(1024)
        .default_height(700)
        .build();

    let overlay = adw::ToastOverlay::new();

    let split = adw::Flap::builder()
        .reveal_flap(true)
        .locked(true)
        .modal(false)
        .build();

    let content = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    content.set_hexpand(true);
    let welcome = gtk4::Label::new(Some("Open a report to view its conversation."));
    welcome.add_css_class("dim-label");
    welcome.set_vexpand(true);
    content.append(&welcome);
    split.set_content(Some(&content));

    // The view is kept alive here; its widgets only hold weak references.
    let current: Rc<RefCell<Option<ConversationView>>> = Rc::default();

    let sign_out: Rc<dyn Fn()> = {
        let app = app.clone();
        let window = window.clone();
        Rc::new(move || {
            let mut st = AppState::load();
            st.sign_out();
            if let Err(e) = st.save() {
                log::error!("Failed to clear session: {e}");
            }
            crate::ui::login::show_login_window(&app);
            window.close();
        })
    };

    let open_report: Rc<dyn Fn(Report)> = {
        let window = window.clone();
        let client = client.clone();
        let content = content.clone();
        let current = current.clone();
        let sign_out = sign_out.clone();
        let admin_id = admin.id.clone();
        Rc::new(move |report: Report| {
            log::info!("Opening report {} ({})", report.id, report.status.as_str());
            while let Some(child) = content.first_child() {
                content.remove(&child);
            }
            let view = ConversationView::new(
                window.upcast_ref::<gtk4::Window>(),
                client.clone(),
                &report,
                &admin_id,
                sign_out.clone(),
            );
            content.append(&view.widget());
            current.replace(Some(view));
        })
    };

    // Fetches the report fresh so status and conversation id are current.
    let fetch_report: Rc<RefCell<Option<Rc<dyn Fn(String)>>>> = Rc::default();
    let sidebar = {
        let fetch_report = fetch_report.clone();
        Rc::new(Sidebar::new(move |id| {
            if let Some(f) = fetch_report.borrow().as_ref() {
                f(id);
            }
        }))
    };
    split.set_flap(Some(&sidebar.widget()));

    let fetch: Rc<dyn Fn(String)> = {
        let client = client.clone();
        let overlay = overlay.clone();
        let sidebar = sidebar.clone();
        let open_report = open_report.clone();
        let sign_out = sign_out.clone();
        Rc::new(move |report_id: String| {
            let client = client.clone();
            let rx = crate::utils::run_async_to_main(async move { client.report(&report_id).await });
            let overlay = overlay.clone();
            let sidebar = sidebar.clone();
            let open_report = open_report.clone();
            let sign_out = sign_out.clone();
            rx.attach(None, move |res: Result<Report, ApiError>| {
                match res {
                    Ok(report) => {
                        remember(&report);
                        load_recent(&sidebar);
                        open_report(report);
                    }
                    Err(err) if err.is_unauthorized() => sign_out(),
                    Err(err) => {
                        log::warn!("Failed to open report: {err}");
                        overlay.add_toast(adw::Toast::new(&format!(
                            "Could not open report: {}",
                            err.user_message()
                        )));
                    }
                }
                glib::ControlFlow::Break
            });
        })
    };
    fetch_report.replace(Some(fetch));

    overlay.set_child(Some(&split));

    let container = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let who = admin.name.clone().unwrap_or_else(|| admin.id.clone());
    let title = gtk4::Label::new(Some(&format!("Crowdship Admin · {who}")));
    header.set_title_widget(Some(&title));

    let open_btn = gtk4::Button::with_label("Open Report");
    open_btn.add_css_class("suggested-action");
    header.pack_end(&open_btn);
    let sign_out_btn = gtk4::Button::with_label("Sign Out");
    header.pack_start(&sign_out_btn);
    container.append(&header);
    container.append(&overlay);
    window.set_content(Some(&container));
    window.present();

    load_recent(&sidebar);

    {
        let sign_out = sign_out.clone();
        sign_out_btn.connect_clicked(move |_| sign_out());
    }

    {
        let overlay = overlay.clone();
        let window = window.clone();
        open_btn.connect_clicked(move |_| {
            let dialog = gtk4::Dialog::builder()
                .title("Open Report")
                .transient_for(&window)
                .modal(true)
                .build();
            let body = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
            body.set_margin_top(12);
            body.set_margin_bottom(12);
            body.set_margin_start(12);
            body.set_margin_end(12);

            let info = gtk4::Label::new(Some("Enter the id of the report to open:"));
            info.set_halign(gtk4::Align::Start);
            body.append(&info);

            let entry = gtk4::Entry::new();
            entry.set_placeholder_text(Some("Report id"));
            entry.set_hexpand(true);
            entry.set_activates_default(true);
            body.append(&entry);

            dialog.set_child(Some(&body));
            let _ = dialog.add_button("Cancel", gtk4::ResponseType::Cancel);
            let ok_btn = dialog.add_button("Open", gtk4::ResponseType::Ok);
            ok_btn.add_css_class("suggested-action");
            dialog.set_default_response(gtk4::ResponseType::Ok);

            let overlay = overlay.clone();
            let fetch_report = fetch_report.clone();
            dialog.connect_response(move |dlg, resp| {
                if resp == gtk4::ResponseType::Ok {
                    let id = entry.text().trim().to_string();
                    if id.is_empty() {
                        overlay.add_toast(adw::Toast::new("Please enter a report id."));
                        return;
                    }
                    if let Some(f) = fetch_report.borrow().as_ref() {
                        f(id);
                    }
                }
                dlg.close();
            });

            dialog.present();
        });
    }
}
