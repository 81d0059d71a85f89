use adw::prelude::*;
use gtk4 as gtk;

use crate::api::ApiError;

/// Blocking error notice for a failed action.
pub fn show_error(parent: &impl IsA<gtk::Window>, heading: &str, err: &ApiError) {
    log::error!("{heading}: {err}");
    let dialog = adw::MessageDialog::new(Some(parent), Some(heading), Some(&err.user_message()));
    dialog.add_response("ok", "OK");
    dialog.set_default_response(Some("ok"));
    dialog.set_close_response("ok");
    dialog.present();
}

pub fn show_notice(parent: &impl IsA<gtk::Window>, heading: &str, body: &str) {
    let dialog = adw::MessageDialog::new(Some(parent), Some(heading), Some(body));
    dialog.add_response("ok", "OK");
    dialog.set_default_response(Some("ok"));
    dialog.set_close_response("ok");
    dialog.present();
}

/// Asks before a destructive action; `on_confirm` runs only on the
/// destructive response.
pub fn confirm_destructive<F>(
    parent: &impl IsA<gtk::Window>,
    heading: &str,
    body: &str,
    confirm_label: &str,
    on_confirm: F,
) where
    F: Fn() + 'static,
{
    let dialog = adw::MessageDialog::new(Some(parent), Some(heading), Some(body));
    dialog.add_response("cancel", "Cancel");
    dialog.add_response("confirm", confirm_label);
    dialog.set_response_appearance("confirm", adw::ResponseAppearance::Destructive);
    dialog.set_default_response(Some("cancel"));
    dialog.set_close_response("cancel");
    dialog.connect_response(None, move |_, response| {
        if response == "confirm" {
            on_confirm();
        }
    });
    dialog.present();
}
