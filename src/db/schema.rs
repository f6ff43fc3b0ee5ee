// Applied in order; the position in this list (1-based) is the schema version
// recorded in PRAGMA user_version.
pub const MIGRATIONS: &[&str] = &[V1];

const V1: &str = r#"
CREATE TABLE IF NOT EXISTS snippets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  content TEXT NOT NULL,
  copied_at INTEGER NOT NULL,
  language TEXT NOT NULL,
  hash TEXT NOT NULL UNIQUE,
  html_lines TEXT
);

CREATE INDEX IF NOT EXISTS idx_snippets_copied_at ON snippets(copied_at DESC);

CREATE VIRTUAL TABLE IF NOT EXISTS snippets_fts USING fts5(
  content,
  content='snippets',
  content_rowid='id',
  tokenize='trigram'
);

CREATE TABLE IF NOT EXISTS settings (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  retention_days INTEGER NOT NULL,
  style TEXT NOT NULL,
  toggle_hotkey TEXT NOT NULL,
  font_size INTEGER NOT NULL DEFAULT 14
);
"#;

pub const DROP_ALL: &str = r#"
DROP TABLE IF EXISTS snippets_fts;
DROP TABLE IF EXISTS snippets;
DROP TABLE IF EXISTS settings;
PRAGMA user_version = 0;
"#;
