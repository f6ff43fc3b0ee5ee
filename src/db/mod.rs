mod schema;

use std::fs;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("database busy after {attempts} attempts")]
    Contention { attempts: u32 },
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnippetRecord {
    pub id: i64,
    pub content: String,
    pub copied_at: i64,
    pub language: String,
    pub hash: String,
    pub html_lines: Option<Vec<String>>,
}

pub struct NewSnippet<'a> {
    pub content: &'a str,
    pub copied_at: i64,
    pub language: &'a str,
    pub hash: &'a str,
    pub html_lines: Option<&'a [String]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    pub id: i64,
    pub replaced: Option<i64>,
}

/// Which rows a lookup selects. Phrase queries must already be quoted for FTS5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Recent,
    Phrase(&'a str),
    Substring(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRow {
    pub retention_days: i64,
    pub style: String,
    pub toggle_hotkey: String,
    pub font_size: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DumpRow {
    pub id: i64,
    pub content: String,
}

pub struct Database {
    conn: Mutex<Connection>,
    write_retries: u32,
    retry_backoff: Duration,
}

const SNIPPET_COLUMNS: &str = "s.id, s.content, s.copied_at, s.language, s.hash, s.html_lines";

impl Database {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    pub fn open(config: &StoreConfig) -> Result<Self, DbError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(&config.db_path)?;
        conn.busy_timeout(config.busy_timeout)?;
        Self::initialize(&mut conn)?;
        info!("opened snippet database at {}", config.db_path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            write_retries: config.write_retries.max(1),
            retry_backoff: config.retry_backoff,
        })
    }

    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DbError> {
        let mut conn = Connection::open_in_memory()?;
        Self::initialize(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            write_retries: 1,
            retry_backoff: Duration::ZERO,
        })
    }

    fn initialize(conn: &mut Connection) -> Result<(), DbError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        migrate(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// Runs `op` inside an IMMEDIATE transaction, retrying on lock contention
    /// up to the configured bound.
    fn write<T, F>(&self, mut op: F) -> DbResult<T>
    where
        F: FnMut(&Transaction<'_>) -> DbResult<T>,
    {
        let mut conn = self.conn()?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match run_in_transaction(&mut conn, &mut op) {
                Err(err) if is_busy(&err) => {
                    if attempt >= self.write_retries {
                        return Err(DbError::Contention { attempts: attempt });
                    }
                    warn!("database busy, retrying write (attempt {attempt})");
                    thread::sleep(self.retry_backoff * attempt);
                }
                other => return other,
            }
        }
    }

    /// Inserts a snippet, first removing any row (and its index entry) that
    /// carries the same hash. Both happen in one transaction.
    pub fn insert_replacing(&self, snippet: &NewSnippet<'_>) -> DbResult<Inserted> {
        let html_json = snippet.html_lines.map(serde_json::to_string).transpose()?;
        self.write(|tx| {
            let existing: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, content FROM snippets WHERE hash = ?1",
                    params![snippet.hash],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((old_id, old_content)) = &existing {
                unindex(tx, *old_id, old_content)?;
                tx.execute("DELETE FROM snippets WHERE id = ?1", params![old_id])?;
            }

            tx.execute(
                "
                INSERT INTO snippets (content, copied_at, language, hash, html_lines)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![
                    snippet.content,
                    snippet.copied_at,
                    snippet.language,
                    snippet.hash,
                    html_json,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO snippets_fts (rowid, content) VALUES (?1, ?2)",
                params![id, snippet.content],
            )?;

            Ok(Inserted {
                id,
                replaced: existing.map(|(old_id, _)| old_id),
            })
        })
    }

    pub fn get_snippet(&self, id: i64) -> DbResult<Option<SnippetRecord>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!("SELECT {SNIPPET_COLUMNS} FROM snippets s WHERE s.id = ?1"),
                params![id],
                raw_snippet_from_row,
            )
            .optional()?;
        raw.map(RawSnippet::decode).transpose()
    }

    /// Rows with `id < before`, newest first.
    pub fn lookup(
        &self,
        lookup: Lookup<'_>,
        before: i64,
        limit: i64,
    ) -> DbResult<Vec<SnippetRecord>> {
        let conn = self.conn()?;
        let raws = match lookup {
            Lookup::Recent => {
                let mut stmt = conn.prepare(&format!(
                    "
                    SELECT {SNIPPET_COLUMNS}
                    FROM snippets s
                    WHERE s.id < ?1
                    ORDER BY s.id DESC
                    LIMIT ?2
                    "
                ))?;
                let rows = stmt.query_map(params![before, limit], raw_snippet_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            Lookup::Phrase(phrase) => {
                let mut stmt = conn.prepare(&format!(
                    "
                    SELECT {SNIPPET_COLUMNS}
                    FROM snippets_fts f
                    JOIN snippets s ON s.id = f.rowid
                    WHERE snippets_fts MATCH ?1 AND s.id < ?2
                    ORDER BY s.id DESC
                    LIMIT ?3
                    "
                ))?;
                let rows = stmt.query_map(params![phrase, before, limit], raw_snippet_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            Lookup::Substring(needle) => {
                let mut stmt = conn.prepare(&format!(
                    "
                    SELECT {SNIPPET_COLUMNS}
                    FROM snippets s
                    WHERE instr(lower(s.content), lower(?1)) > 0 AND s.id < ?2
                    ORDER BY s.id DESC
                    LIMIT ?3
                    "
                ))?;
                let rows = stmt.query_map(params![needle, before, limit], raw_snippet_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        raws.into_iter().map(RawSnippet::decode).collect()
    }

    /// Deletes every row captured before `cutoff`, index entries included, as one batch.
    pub fn purge_before(&self, cutoff: i64) -> DbResult<usize> {
        self.write(|tx| {
            tx.execute(
                "
                INSERT INTO snippets_fts (snippets_fts, rowid, content)
                SELECT 'delete', id, content FROM snippets WHERE copied_at < ?1
                ",
                params![cutoff],
            )?;
            let deleted = tx.execute("DELETE FROM snippets WHERE copied_at < ?1", params![cutoff])?;
            Ok(deleted)
        })
    }

    pub fn dump_recent(&self, limit: i64) -> DbResult<Vec<DumpRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content FROM snippets ORDER BY copied_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.max(0)], |row| {
            Ok(DumpRow {
                id: row.get(0)?,
                content: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn snippet_count(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM snippets", [], |row| row.get(0))?)
    }

    /// Fails if the trigram index disagrees with the snippets table.
    pub fn check_index(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snippets_fts (snippets_fts, rank) VALUES ('integrity-check', 1)",
            [],
        )?;
        Ok(())
    }

    pub fn rebuild_index(&self) -> DbResult<()> {
        self.write(|tx| {
            tx.execute("INSERT INTO snippets_fts (snippets_fts) VALUES ('rebuild')", [])?;
            Ok(())
        })
    }

    /// Drops and recreates every table. Settings must be bootstrapped again afterwards.
    pub fn reset(&self) -> DbResult<()> {
        self.write(|tx| {
            tx.execute_batch(schema::DROP_ALL)?;
            migrate(tx)
        })?;
        let conn = self.conn()?;
        conn.execute_batch("VACUUM;")?;
        info!("snippet database reset");
        Ok(())
    }

    pub fn insert_settings_if_absent(&self, row: &SettingsRow) -> DbResult<bool> {
        self.write(|tx| {
            let inserted = tx.execute(
                "
                INSERT OR IGNORE INTO settings (id, retention_days, style, toggle_hotkey, font_size)
                VALUES (1, ?1, ?2, ?3, ?4)
                ",
                params![row.retention_days, row.style, row.toggle_hotkey, row.font_size],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn read_settings(&self) -> DbResult<SettingsRow> {
        let conn = self.conn()?;
        let row = conn.query_row(
            "SELECT retention_days, style, toggle_hotkey, font_size FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(SettingsRow {
                    retention_days: row.get(0)?,
                    style: row.get(1)?,
                    toggle_hotkey: row.get(2)?,
                    font_size: row.get(3)?,
                })
            },
        )?;
        Ok(row)
    }

    pub fn retention_days(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COALESCE(retention_days, 0) FROM settings WHERE id = 1",
            [],
            |row| row.get(0),
        )?)
    }

    pub fn update_style(&self, style: &str) -> DbResult<()> {
        self.update_setting("UPDATE settings SET style = ?1 WHERE id = 1", style)
    }

    pub fn update_retention_days(&self, days: i64) -> DbResult<()> {
        self.update_setting("UPDATE settings SET retention_days = ?1 WHERE id = 1", days)
    }

    pub fn update_toggle_hotkey(&self, encoded: &str) -> DbResult<()> {
        self.update_setting("UPDATE settings SET toggle_hotkey = ?1 WHERE id = 1", encoded)
    }

    pub fn update_font_size(&self, size: i64) -> DbResult<()> {
        self.update_setting("UPDATE settings SET font_size = ?1 WHERE id = 1", size)
    }

    fn update_setting<V: rusqlite::ToSql>(&self, sql: &str, value: V) -> DbResult<()> {
        self.write(|tx| {
            tx.execute(sql, params![value])?;
            Ok(())
        })
    }
}

fn run_in_transaction<T, F>(conn: &mut Connection, op: &mut F) -> DbResult<T>
where
    F: FnMut(&Transaction<'_>) -> DbResult<T>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn is_busy(err: &DbError) -> bool {
    matches!(
        err,
        DbError::Sql(rusqlite::Error::SqliteFailure(failure, _))
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn migrate(conn: &Connection) -> DbResult<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let applied = usize::try_from(version).unwrap_or(0);
    for (idx, sql) in schema::MIGRATIONS.iter().enumerate().skip(applied) {
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", (idx + 1) as i64)?;
        debug!("applied schema migration {}", idx + 1);
    }
    Ok(())
}

fn unindex(tx: &Transaction<'_>, id: i64, content: &str) -> DbResult<()> {
    tx.execute(
        "INSERT INTO snippets_fts (snippets_fts, rowid, content) VALUES ('delete', ?1, ?2)",
        params![id, content],
    )?;
    Ok(())
}

struct RawSnippet {
    id: i64,
    content: String,
    copied_at: i64,
    language: String,
    hash: String,
    html_lines: Option<String>,
}

impl RawSnippet {
    fn decode(self) -> DbResult<SnippetRecord> {
        let html_lines = self
            .html_lines
            .map(|raw| {
                serde_json::from_str::<Vec<String>>(&raw).map_err(|err| DbError::Malformed {
                    field: "html_lines",
                    reason: format!("snippet {}: {err}", self.id),
                })
            })
            .transpose()?;
        Ok(SnippetRecord {
            id: self.id,
            content: self.content,
            copied_at: self.copied_at,
            language: self.language,
            hash: self.hash,
            html_lines,
        })
    }
}

fn raw_snippet_from_row(row: &Row<'_>) -> Result<RawSnippet, rusqlite::Error> {
    Ok(RawSnippet {
        id: row.get(0)?,
        content: row.get(1)?,
        copied_at: row.get(2)?,
        language: row.get(3)?,
        hash: row.get(4)?,
        html_lines: row.get(5)?,
    })
}
