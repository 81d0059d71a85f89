pub mod conversation_view;
pub mod dialogs;
pub mod login;
pub mod main_window;
pub mod sidebar;

use gtk4 as gtk;

const STYLE: &str = r#"
.bubble {
    padding: 8px 12px;
    border-radius: 12px;
    margin: 2px 6px;
}
.bubble-own {
    background-color: alpha(@accent_bg_color, 0.18);
}
.bubble-other {
    background-color: alpha(@card_fg_color, 0.06);
}
.date-separator {
    margin: 10px 0 4px 0;
    font-size: smaller;
}
.message-editor {
    min-height: 60px;
    padding: 4px;
}
"#;

/// Bubble and separator styling for the conversation view.
pub fn load_css() {
    let provider = gtk::CssProvider::new();
    provider.load_from_data(STYLE);
    match gtk::gdk::Display::default() {
        Some(display) => gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        ),
        None => log::warn!("No display available, skipping custom styles"),
    }
}
