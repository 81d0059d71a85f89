use glib::MainContext;
use once_cell::sync::Lazy;

/// Network calls run here; results hop back to the GTK main loop via
/// [`run_async_to_main`].
pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("crowdship-net")
        .build()
        .expect("Failed to build Tokio runtime")
});

/// Runs `fut` on [`RUNTIME`] and hands its result to whichever main context
/// the returned receiver is attached to.
pub fn run_async_to_main<T, E, Fut>(fut: Fut) -> glib::Receiver<Result<T, E>>
where
    T: Send + 'static,
    E: Send + 'static,
    Fut: std::future::Future<Output = Result<T, E>> + Send + 'static,
{
    let (tx, rx) = MainContext::channel(glib::Priority::default());
    RUNTIME.spawn(async move {
        let res = fut.await;
        if tx.send(res).is_err() {
            log::debug!("Result dropped: receiving view is gone");
        }
    });
    rx
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn result_reaches_the_attached_context() {
        let ctx = MainContext::new();
        let got: Rc<Cell<Option<u32>>> = Rc::default();
        let rx = run_async_to_main(async { Ok::<u32, String>(7) });
        {
            let got = got.clone();
            rx.attach(Some(&ctx), move |res| {
                got.set(res.ok());
                glib::ControlFlow::Break
            });
        }
        while got.get().is_none() {
            ctx.iteration(true);
        }
        assert_eq!(got.get(), Some(7));
    }

    #[test]
    fn adds_https_when_scheme_missing() {
        assert_eq!(normalize_url(" api.example.com "), "https://api.example.com");
        assert_eq!(normalize_url("http://localhost:3000"), "http://localhost:3000");
        assert_eq!(normalize_url("   "), "");
    }
}
