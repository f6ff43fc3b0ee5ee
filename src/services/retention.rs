use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::StoreResult;
use crate::services::snippet_store::SnippetStore;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Oldest capture time that survives a purge at `now`; `None` when retention
/// is off or the horizon reaches past the representable range.
pub fn cutoff(now: i64, retention_days: i64) -> Option<i64> {
    if retention_days <= 0 {
        return None;
    }
    retention_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|horizon| now.checked_sub(horizon))
}

pub fn run_purge(db: &Database, now: i64) -> StoreResult<usize> {
    let days = db.retention_days()?;
    let Some(cutoff) = cutoff(now, days) else {
        return Ok(0);
    };
    let deleted = db.purge_before(cutoff)?;
    if deleted > 0 {
        info!("purged {deleted} snippets older than {days} days");
    }
    Ok(deleted)
}

/// Runs the purge on a fixed interval from the blocking pool. Must be called
/// inside a tokio runtime; abort the handle to stop it.
pub fn spawn_purge_timer(store: Arc<SnippetStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.purge_expired()).await {
                Ok(Ok(deleted)) => debug!("scheduled purge removed {deleted} snippets"),
                Ok(Err(err)) => warn!("scheduled purge failed: {err}"),
                Err(err) => warn!("scheduled purge task failed: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::StoreConfig;

    const DAY: i64 = SECONDS_PER_DAY;
    const NOW: i64 = 1_760_000_000;

    fn store() -> SnippetStore {
        SnippetStore::open_in_memory(StoreConfig::new(":memory:").with_purge_every(0))
            .expect("store")
    }

    #[test]
    fn cutoff_is_disabled_for_non_positive_horizons() {
        assert_eq!(cutoff(NOW, 0), None);
        assert_eq!(cutoff(NOW, -5), None);
        assert_eq!(cutoff(NOW, 30), Some(NOW - 30 * DAY));
    }

    #[test]
    fn huge_horizons_keep_everything() {
        assert_eq!(cutoff(NOW, i64::MAX), None);
        assert_eq!(cutoff(i64::MIN + DAY, 2), None);

        let store = store();
        store.set_retention_days(i64::MAX).expect("retention");
        store.add_snippet("ancient", "text", 0).expect("add");
        assert_eq!(store.purge_expired_at(NOW).expect("purge"), 0);
        store
            .set_retention_days(i64::MAX / 1000)
            .expect("retention");
        assert_eq!(store.purge_expired_at(NOW).expect("purge"), 0);
        assert_eq!(store.find_snippets("", None, None).expect("list").len(), 1);
    }

    #[test]
    fn purge_removes_only_rows_past_the_horizon() {
        let store = store();
        store.set_retention_days(30).expect("retention");
        let expired = store.add_snippet("expired", "text", NOW - 31 * DAY).expect("add");
        let kept = store.add_snippet("kept", "text", NOW - 29 * DAY).expect("add");

        assert_eq!(store.purge_expired_at(NOW).expect("purge"), 1);
        assert!(store.get_snippet_detail(expired).is_err());
        assert!(store.get_snippet_detail(kept).is_ok());
        store.check_index().expect("index consistent");

        assert_eq!(store.purge_expired_at(NOW).expect("purge again"), 0);
    }

    #[test]
    fn zero_horizon_deletes_nothing() {
        let store = store();
        store.set_retention_days(0).expect("retention");
        store.add_snippet("ancient", "text", 0).expect("add");
        assert_eq!(store.purge_expired_at(NOW).expect("purge"), 0);
        assert_eq!(store.find_snippets("", None, None).expect("list").len(), 1);
    }

    #[tokio::test]
    async fn timer_purges_in_the_background() {
        let store = Arc::new(store());
        store.set_retention_days(1).expect("retention");
        let now = Utc::now().timestamp();
        store.add_snippet("stale", "text", now - 3 * DAY).expect("add");
        store.add_snippet("fresh", "text", now).expect("add");

        let handle = spawn_purge_timer(Arc::clone(&store), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let remaining = store.find_snippets("", None, None).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "fresh");
    }
}
