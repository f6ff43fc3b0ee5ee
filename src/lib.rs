pub mod capability;
pub mod config;
pub mod db;
pub mod error;
pub mod hotkey;
pub mod services;
pub mod utils;

use tracing_subscriber::EnvFilter;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use hotkey::{Hotkey, Shortcut};
pub use services::retention::spawn_purge_timer;
pub use services::search::FoundSnippet;
pub use services::settings::{Settings, UiSettings};
pub use services::snippet_store::{Snippet, SnippetStore};

/// Installs a compact stderr subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
