//! The socket server side of the cmuxterm control plane: a unix-domain
//! listener, one handler thread per client, and a single "main" scheduler
//! thread that owns every topology mutation.

use mux::Mux;
use std::sync::Arc;

pub mod browser;
pub mod dispatch;
pub mod local;
pub mod scheduler;
pub mod sessionhandler;

pub use browser::{BrowserAdapter, StubWebView, WebView};
pub use local::Listener;
pub use scheduler::Scheduler;
pub use sessionhandler::SessionHandler;

/// Bundle of the long-lived server state shared by every client handler.
pub struct Server {
    pub scheduler: Scheduler,
    pub handler: Arc<SessionHandler>,
}

impl Server {
    /// Wire up a server around an existing mux.  The browser adapter
    /// drops its per-surface views as surfaces are removed.
    pub fn new(mux: &Arc<Mux>, access_mode: config::AccessMode) -> Self {
        let browser = Arc::new(BrowserAdapter::new(mux));
        {
            let browser = Arc::clone(&browser);
            mux.subscribe(move |notification| {
                if let mux::MuxNotification::SurfaceRemoved(surface_id) = notification {
                    browser.forget(surface_id);
                }
                true
            });
        }
        let handler = Arc::new(SessionHandler::new(mux, browser, access_mode));
        Self {
            scheduler: Scheduler::spawn(),
            handler,
        }
    }
}
