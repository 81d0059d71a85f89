mod api;
mod app;
mod conversation;
mod storage;
mod ui;
mod utils;

use adw::prelude::*;
use adw::Application;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = Application::builder()
        .application_id("com.crowdship.Admin")
        .build();
    app.connect_startup(|_| crate::ui::load_css());
    app.connect_activate(|app| {
        if let Err(e) = crate::storage::open() {
            log::warn!("Recent reports cache unavailable: {e}");
        }
        crate::app::build_ui(app);
    });
    app.run();
}
