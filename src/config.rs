use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;

pub const DB_FILE_NAME: &str = "snipvault.db";
pub const DEFAULT_STYLE: &str = "base16-ocean.dark";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_WRITE_RETRIES: u32 = 5;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);
const DEFAULT_MAX_HIGHLIGHT_CHARS: usize = 100_000;
const DEFAULT_PURGE_EVERY: i64 = 10;

/// Everything the store needs to open its database. Passed in explicitly so
/// the storage location is a parameter, not ambient state.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub write_retries: u32,
    pub retry_backoff: Duration,
    pub max_highlight_chars: usize,
    pub purge_every: i64,
    pub default_style: String,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            write_retries: DEFAULT_WRITE_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_highlight_chars: DEFAULT_MAX_HIGHLIGHT_CHARS,
            purge_every: DEFAULT_PURGE_EVERY,
            default_style: DEFAULT_STYLE.to_string(),
        }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DB_FILE_NAME))
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_write_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.write_retries = retries.max(1);
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_highlight_chars(mut self, max: usize) -> Self {
        self.max_highlight_chars = max;
        self
    }

    pub fn with_purge_every(mut self, every: i64) -> Self {
        self.purge_every = every;
        self
    }

    pub fn with_default_style(mut self, style: impl Into<String>) -> Self {
        self.default_style = style.into();
        self
    }

    /// `./data/snipvault.db` while developing, the platform data directory in production.
    pub fn default_db_path(production: bool) -> PathBuf {
        if production {
            if let Some(dirs) = ProjectDirs::from("dev", "snipvault", "snipvault") {
                return dirs.data_dir().join(DB_FILE_NAME);
            }
        }
        PathBuf::from("data").join(DB_FILE_NAME)
    }
}
