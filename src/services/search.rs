use serde::Serialize;

use crate::db::{Database, Lookup, SnippetRecord};
use crate::error::StoreResult;
use crate::services::preview;

/// Shortest query the trigram index can answer; anything shorter is scanned.
pub const MIN_INDEXED_QUERY_CHARS: usize = 3;
pub const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    Listing,
    Trigram(String),
    Scan(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FoundSnippet {
    pub id: i64,
    pub content: String,
    pub copied_at: i64,
    pub language: String,
    pub preview_html: Option<String>,
    pub preview_start_line: Option<usize>,
}

/// Wraps a query as an FTS5 phrase literal, doubling embedded quotes.
pub fn phrase_literal(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

pub fn plan(query: &str) -> SearchMode {
    if query.is_empty() {
        SearchMode::Listing
    } else if query.chars().count() >= MIN_INDEXED_QUERY_CHARS {
        SearchMode::Trigram(phrase_literal(query))
    } else {
        SearchMode::Scan(query.to_string())
    }
}

pub fn effective_limit(limit: Option<i64>) -> i64 {
    limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
}

/// Cursor as an exclusive upper id bound; absent or non-positive means unbounded.
pub fn effective_cursor(before: Option<i64>) -> i64 {
    before.filter(|b| *b > 0).unwrap_or(i64::MAX)
}

pub fn find(
    db: &Database,
    query: &str,
    before: Option<i64>,
    limit: Option<i64>,
) -> StoreResult<Vec<FoundSnippet>> {
    let mode = plan(query);
    let lookup = match &mode {
        SearchMode::Listing => Lookup::Recent,
        SearchMode::Trigram(phrase) => Lookup::Phrase(phrase),
        SearchMode::Scan(needle) => Lookup::Substring(needle),
    };
    let rows = db.lookup(lookup, effective_cursor(before), effective_limit(limit))?;
    Ok(rows
        .into_iter()
        .map(|row| with_preview(row, query))
        .collect())
}

fn with_preview(row: SnippetRecord, query: &str) -> FoundSnippet {
    let window = preview::extract(&row.content, row.html_lines.as_deref(), query);
    let preview_html = window.map(|w| w.html());
    let preview_start_line = window.map(|w| w.start_line);
    FoundSnippet {
        id: row.id,
        content: row.content,
        copied_at: row.copied_at,
        language: row.language,
        preview_html,
        preview_start_line,
    }
}
