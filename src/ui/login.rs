use adw::prelude::*;
use adw::Application;
use gtk4 as gtk;
use std::time::Duration;

use crate::api::models::Session;
use crate::api::{ApiClient, ApiError, ClientConfig};
use crate::app::AppState;

pub fn show_login_window(app: &Application) {
    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title("Crowdship Admin Login")
        .default_width(420)
        .default_height(320)
        .resizable(false)
        .build();

    let toast_overlay = adw::ToastOverlay::new();

    let root = gtk::Box::new(gtk::Orientation::Vertical, 12);
    root.set_margin_top(24);
    root.set_margin_bottom(24);
    root.set_margin_start(24);
    root.set_margin_end(24);

    let title = gtk::Label::new(Some("Sign in to the admin console"));
    title.add_css_class("title-2");
    title.set_halign(gtk::Align::Start);
    root.append(&title);

    let saved = AppState::load();

    let server_entry = gtk::Entry::new();
    server_entry.set_placeholder_text(Some("API URL (e.g. https://api.example.com)"));
    server_entry.set_text(&saved.default_server_url());
    server_entry.set_hexpand(true);

    let email_entry = gtk::Entry::new();
    email_entry.set_placeholder_text(Some("Admin email"));
    email_entry.set_input_purpose(gtk::InputPurpose::Email);
    email_entry.set_hexpand(true);

    let pass_entry = gtk::PasswordEntry::new();
    pass_entry.set_placeholder_text(Some("Password"));
    pass_entry.set_show_peek_icon(true);
    pass_entry.set_hexpand(true);

    let form = gtk::Box::new(gtk::Orientation::Vertical, 8);
    form.append(&server_entry);
    form.append(&email_entry);
    form.append(&pass_entry);
    root.append(&form);

    let status = gtk::Label::new(None);
    status.add_css_class("dim-label");
    status.set_halign(gtk::Align::Start);
    root.append(&status);

    let login_btn = gtk::Button::with_label("Sign In");
    login_btn.add_css_class("suggested-action");
    login_btn.set_halign(gtk::Align::End);
    root.append(&login_btn);

    toast_overlay.set_child(Some(&root));
    let container = gtk::Box::new(gtk::Orientation::Vertical, 0);
    let header = adw::HeaderBar::new();
    let header_title = gtk::Label::new(Some("Crowdship Admin"));
    header.set_title_widget(Some(&header_title));
    container.append(&header);
    container.append(&toast_overlay);
    window.set_content(Some(&container));

    let on_connect = {
        let app = app.clone();
        let window = window.clone();
        let overlay = toast_overlay.clone();
        let server_entry = server_entry.clone();
        let email_entry = email_entry.clone();
        let pass_entry = pass_entry.clone();
        let login_btn = login_btn.clone();
        move || {
            let url = crate::utils::normalize_url(&server_entry.text());
            let email = email_entry.text().trim().to_string();
            let password = pass_entry.text().to_string();
            if url.is_empty() || email.is_empty() || password.is_empty() {
                overlay.add_toast(adw::Toast::new("Please enter the API URL, email and password."));
                return;
            }
            let config = match ClientConfig::new(&url, None) {
                Ok(c) => c.with_timeout(Duration::from_secs(10)),
                Err(e) => {
                    overlay.add_toast(adw::Toast::new(&e.to_string()));
                    return;
                }
            };

            status.set_label("Signing in…");
            login_btn.set_sensitive(false);

            let rx: glib::Receiver<Result<Session, ApiError>> =
                crate::utils::run_async_to_main(async move {
                    let client = ApiClient::new(config)?;
                    client.login(&email, &password).await
                });

            let status_label = status.clone();
            let app2 = app.clone();
            let window2 = window.clone();
            let overlay2 = overlay.clone();
            let login_btn2 = login_btn.clone();
            rx.attach(None, move |res| {
                login_btn2.set_sensitive(true);
                match res {
                    Ok(session) => {
                        log::info!("Signed in as admin {}", session.admin.id);
                        let mut st = AppState::load();
                        st.base_url = url.clone();
                        st.token = Some(session.token);
                        st.admin = Some(session.admin);
                        if let Err(e) = st.save() {
                            overlay2.add_toast(adw::Toast::new(&format!("Failed to save settings: {}", e)));
                        }
                        crate::ui::main_window::show_main_window(&app2);
                        window2.close();
                    }
                    Err(err) => {
                        log::warn!("Sign in failed: {err}");
                        status_label.set_label("Sign in failed");
                        let text = match err {
                            ApiError::Unauthorized => "Invalid email or password.".to_string(),
                            other => other.user_message(),
                        };
                        overlay2.add_toast(adw::Toast::new(&text));
                    }
                }
                glib::ControlFlow::Break
            });
        }
    };

    use std::rc::Rc;
    let on_connect: Rc<dyn Fn()> = Rc::new(on_connect);
    {
        let on_connect = on_connect.clone();
        login_btn.connect_clicked(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        email_entry.connect_activate(move |_| (on_connect)());
    }
    {
        let on_connect = on_connect.clone();
        pass_entry.connect_activate(move |_| (on_connect)());
    }

    window.present();
}
