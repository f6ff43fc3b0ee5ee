use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::db::{Database, DumpRow, NewSnippet, SnippetRecord};
use crate::error::{StoreError, StoreResult};
use crate::hotkey::{Hotkey, Shortcut};
use crate::services::search::FoundSnippet;
use crate::services::settings::{Settings, UiSettings};
use crate::services::{highlight, lexer, retention, search, settings};
use crate::utils::hash::content_hash;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Snippet {
    pub id: i64,
    pub content: String,
    pub copied_at: i64,
    pub language: String,
    pub hash: String,
    pub html_lines: Option<Vec<String>>,
}

impl Snippet {
    /// The full rendered snippet, if it was highlighted.
    pub fn html(&self) -> Option<String> {
        self.html_lines.as_ref().map(|lines| lines.concat())
    }
}

impl From<SnippetRecord> for Snippet {
    fn from(record: SnippetRecord) -> Self {
        Self {
            id: record.id,
            content: record.content,
            copied_at: record.copied_at,
            language: record.language,
            hash: record.hash,
            html_lines: record.html_lines,
        }
    }
}

pub struct SnippetStore {
    db: Arc<Database>,
    config: StoreConfig,
}

impl SnippetStore {
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let db = Database::open(&config)?;
        Self::with_database(db, config)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory(config: StoreConfig) -> StoreResult<Self> {
        Self::with_database(Database::new_in_memory()?, config)
    }

    fn with_database(db: Database, config: StoreConfig) -> StoreResult<Self> {
        settings::bootstrap(&db, &config.default_style)?;
        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stores `content`, replacing any earlier capture of the same content.
    /// Every `purge_every`-th id also sweeps expired snippets.
    pub fn add_snippet(
        &self,
        content: &str,
        language_hint: &str,
        captured_at: i64,
    ) -> StoreResult<i64> {
        let lexer = lexer::lookup(language_hint)?;
        let hash = content_hash(content);
        let html_lines =
            highlight::build_line_cache(&lexer, content, self.config.max_highlight_chars)?;

        let inserted = self.db.insert_replacing(&NewSnippet {
            content,
            copied_at: captured_at,
            language: lexer.name(),
            hash: &hash,
            html_lines: html_lines.as_deref(),
        })?;
        if let Some(previous) = inserted.replaced {
            debug!("snippet {previous} replaced by {} (same content)", inserted.id);
        }

        if self.config.purge_every > 0 && inserted.id % self.config.purge_every == 0 {
            if let Err(err) = retention::run_purge(&self.db, Utc::now().timestamp()) {
                warn!("purge after insert {} failed: {err}", inserted.id);
            }
        }

        Ok(inserted.id)
    }

    pub fn find_snippets(
        &self,
        query: &str,
        before: Option<i64>,
        limit: Option<i64>,
    ) -> StoreResult<Vec<FoundSnippet>> {
        search::find(&self.db, query, before, limit)
    }

    pub fn get_snippet_detail(&self, id: i64) -> StoreResult<Snippet> {
        self.db
            .get_snippet(id)?
            .map(Snippet::from)
            .ok_or(StoreError::NotFound(id))
    }

    pub fn purge_expired(&self) -> StoreResult<usize> {
        self.purge_expired_at(Utc::now().timestamp())
    }

    pub fn purge_expired_at(&self, now: i64) -> StoreResult<usize> {
        retention::run_purge(&self.db, now)
    }

    pub fn settings(&self) -> StoreResult<Settings> {
        settings::load(&self.db)
    }

    pub fn ui_settings(&self) -> StoreResult<UiSettings> {
        settings::load_ui(&self.db)
    }

    pub fn set_style(&self, style: &str) -> StoreResult<()> {
        settings::set_style(&self.db, style)
    }

    pub fn set_retention_days(&self, days: i64) -> StoreResult<i64> {
        settings::set_retention_days(&self.db, days)
    }

    pub fn set_font_size(&self, size: i64) -> StoreResult<bool> {
        settings::set_font_size(&self.db, size)
    }

    pub fn set_toggle_hotkey(&self, shortcut: &Shortcut) -> StoreResult<Hotkey> {
        settings::set_toggle_hotkey(&self.db, shortcut)
    }

    pub fn dump(&self, limit: i64) -> StoreResult<Vec<DumpRow>> {
        Ok(self.db.dump_recent(limit)?)
    }

    pub fn reset(&self) -> StoreResult<()> {
        self.db.reset()?;
        settings::bootstrap(&self.db, &self.config.default_style)?;
        Ok(())
    }

    pub fn snippet_count(&self) -> StoreResult<i64> {
        Ok(self.db.snippet_count()?)
    }

    pub fn check_index(&self) -> StoreResult<()> {
        Ok(self.db.check_index()?)
    }

    pub fn rebuild_index(&self) -> StoreResult<()> {
        Ok(self.db.rebuild_index()?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    // Amortized purging is off here; the fixtures use timestamps near the epoch.
    fn store() -> SnippetStore {
        SnippetStore::open_in_memory(StoreConfig::new(":memory:").with_purge_every(0))
            .expect("store")
    }

    fn ids(found: &[FoundSnippet]) -> Vec<i64> {
        found.iter().map(|f| f.id).collect()
    }

    #[test]
    fn identical_content_keeps_one_row_with_latest_timestamp() {
        let store = store();
        let first = store.add_snippet("SELECT 1;", "sql", 100).expect("first");
        let second = store.add_snippet("SELECT 1;", "sql", 200).expect("second");

        assert_ne!(first, second);
        assert!(matches!(
            store.get_snippet_detail(first),
            Err(StoreError::NotFound(id)) if id == first
        ));
        let listed = store.find_snippets("", None, None).expect("list");
        assert_eq!(ids(&listed), vec![second]);
        assert_eq!(listed[0].copied_at, 200);
        store.check_index().expect("index consistent");
    }

    #[test]
    fn last_language_hint_wins_for_identical_content() {
        let store = store();
        store.add_snippet("print(1)", "python", 1).expect("python");
        let id = store.add_snippet("print(1)", "text", 2).expect("text");
        let detail = store.get_snippet_detail(id).expect("detail");
        assert_eq!(detail.language, "Plain Text");
        assert_eq!(store.find_snippets("", None, None).expect("list").len(), 1);
    }

    #[test]
    fn unknown_language_is_rejected_without_writing() {
        let store = store();
        assert!(matches!(
            store.add_snippet("x", "klingon", 1),
            Err(StoreError::UnknownLanguage(_))
        ));
        assert!(store.find_snippets("", None, None).expect("list").is_empty());
    }

    #[test]
    fn detail_carries_normalized_language_and_rendered_lines() {
        let store = store();
        let id = store
            .add_snippet("fn main() {\n    println!(\"hi\");\n}", "rs", 5)
            .expect("add");
        let detail = store.get_snippet_detail(id).expect("detail");
        assert_eq!(detail.language, "Rust");
        assert_eq!(detail.hash, content_hash(&detail.content));
        assert_eq!(detail.html_lines.as_ref().map(Vec::len), Some(3));
        assert!(detail.html().expect("html").contains("println"));
    }

    #[test]
    fn interpolation_spanning_lines_is_stored_and_rendered() {
        let store = store();
        for (content, hint) in [
            ("const msg = `total: ${\n  a + b\n}`;\n", "javascript"),
            ("msg = f\"total: {\n  a + b\n}\"\n", "python"),
        ] {
            let id = store.add_snippet(content, hint, 1).expect("add");
            let detail = store.get_snippet_detail(id).expect("detail");
            assert_eq!(detail.html_lines.as_ref().map(Vec::len), Some(3));
        }
    }

    #[test]
    fn oversized_content_is_stored_without_cache_and_still_searchable() {
        let store = SnippetStore::open_in_memory(
            StoreConfig::new(":memory:")
                .with_purge_every(0)
                .with_max_highlight_chars(16),
        )
        .expect("store");
        let id = store
            .add_snippet("this line is well past sixteen chars", "text", 1)
            .expect("add");

        assert!(store.get_snippet_detail(id).expect("detail").html_lines.is_none());
        let found = store.find_snippets("sixteen", None, None).expect("search");
        assert_eq!(ids(&found), vec![id]);
        assert_eq!(found[0].preview_html, None);
    }

    #[test]
    fn trigram_search_finds_substrings_inside_identifiers() {
        let store = store();
        let hit = store
            .add_snippet("let resultBuffer = vec![];", "rust", 1)
            .expect("hit");
        store.add_snippet("let other = 2;", "rust", 2).expect("miss");

        assert_eq!(ids(&store.find_snippets("tBuf", None, None).expect("s")), vec![hit]);
        assert_eq!(
            ids(&store.find_snippets("RESULTBUFFER", None, None).expect("s")),
            vec![hit]
        );
        assert!(store.find_snippets("absent", None, None).expect("s").is_empty());
    }

    #[test]
    fn quotes_in_queries_are_literal() {
        let store = store();
        let hit = store
            .add_snippet(r#"echo "hello world""#, "bash", 1)
            .expect("add");
        let found = store.find_snippets(r#""hello"#, None, None).expect("search");
        assert_eq!(ids(&found), vec![hit]);
    }

    #[test]
    fn short_queries_scan_case_insensitively() {
        let store = store();
        let a = store.add_snippet("Go fast", "text", 1).expect("a");
        store.add_snippet("nothing here", "text", 2).expect("b");
        let c = store.add_snippet("ergo", "text", 3).expect("c");
        let d = store.add_snippet("GO", "text", 4).expect("d");

        let found: HashSet<i64> = ids(&store.find_snippets("gO", None, None).expect("scan"))
            .into_iter()
            .collect();
        assert_eq!(found, HashSet::from([a, c, d]));
    }

    #[test]
    fn pagination_walks_pages_without_gaps_or_overlap() {
        let store = store();
        let mut inserted: Vec<i64> = (0..25)
            .map(|i| {
                store
                    .add_snippet(&format!("snippet number {i}"), "text", i)
                    .expect("add")
            })
            .collect();
        inserted.reverse();

        for query in ["", "snippet number", "sn"] {
            let mut seen = Vec::new();
            let mut cursor = None;
            let mut sizes = Vec::new();
            loop {
                let page = store
                    .find_snippets(query, cursor, Some(10))
                    .expect("page");
                if page.is_empty() {
                    break;
                }
                sizes.push(page.len());
                cursor = page.last().map(|f| f.id);
                seen.extend(ids(&page));
            }
            assert_eq!(sizes, vec![10, 10, 5], "query {query:?}");
            assert_eq!(seen, inserted, "query {query:?}");
        }
    }

    #[test]
    fn search_preview_starts_at_the_matching_line() {
        let store = store();
        let content = (0..10)
            .map(|i| format!("row_{i} = {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let id = store.add_snippet(&content, "python", 1).expect("add");

        let found = store.find_snippets("ROW_7", None, None).expect("search");
        assert_eq!(ids(&found), vec![id]);
        assert_eq!(found[0].preview_start_line, Some(7));
        let html = found[0].preview_html.as_deref().expect("preview");
        assert_eq!(html.matches(r#"<span class="line">"#).count(), 3);
        assert!(html.contains(r#"<span class="ln">8</span>"#));

        let listed = store.find_snippets("", None, None).expect("list");
        assert_eq!(listed[0].preview_html, None);
    }

    #[test]
    fn every_tenth_id_sweeps_expired_rows() {
        let store = SnippetStore::open_in_memory(StoreConfig::new(":memory:")).expect("store");
        let now = Utc::now().timestamp();
        let stale = now - 40 * retention::SECONDS_PER_DAY;
        for i in 0..9 {
            store
                .add_snippet(&format!("stale {i}"), "text", stale)
                .expect("stale");
        }
        assert_eq!(store.find_snippets("", None, None).expect("list").len(), 9);

        let tenth = store.add_snippet("fresh", "text", now).expect("fresh");
        assert_eq!(tenth, 10);
        let remaining = store.find_snippets("", None, None).expect("list");
        assert_eq!(ids(&remaining), vec![tenth]);
    }

    #[test]
    fn reset_clears_snippets_and_restores_default_settings() {
        let store = store();
        store.add_snippet("to be dropped", "text", 1).expect("add");
        store.set_font_size(22).expect("font");

        store.reset().expect("reset");

        assert_eq!(store.snippet_count().expect("count"), 0);
        assert_eq!(store.settings().expect("settings").font_size, 14);
        let id = store.add_snippet("after", "text", 2).expect("add");
        assert_eq!(store.get_snippet_detail(id).expect("detail").content, "after");
    }

    #[test]
    fn dump_orders_by_capture_time() {
        let store = store();
        let older = store.add_snippet("older", "text", 10).expect("older");
        let newer = store.add_snippet("newer", "text", 20).expect("newer");
        let back_dated = store.add_snippet("back", "text", 5).expect("back");

        let rows = store.dump(2).expect("dump");
        assert_eq!(
            rows.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![newer, older]
        );
        assert!(!rows.iter().any(|r| r.id == back_dated));
    }
}
