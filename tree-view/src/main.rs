//! Application entry point for the Weber–Penn tree viewer.
//!
//! This binary installs a log subscriber, sets up eframe/egui and
//! delegates all interactive logic and rendering to [`Viewer`].

mod viewer;

use tracing_subscriber::EnvFilter;
use viewer::Viewer;

/// Starts the native eframe application.
///
/// Logging is filtered by `RUST_LOG` and defaults to `info`.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if eframe fails to create the native window or event loop.
fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = eframe::NativeOptions::default();

    eframe::run_native(
        "Weber-Penn Tree",
        options,
        Box::new(|_cc| Ok(Box::new(Viewer::new()))),
    )
}
