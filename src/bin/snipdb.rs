//! Maintenance tool for the snippet database.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use snipvault::hotkey::Shortcut;
use snipvault::services::highlight::available_styles;
use snipvault::utils::hash::content_hash;
use snipvault::{init_logging, SnippetStore, StoreConfig, StoreError};

const SAMPLES: &[(&str, &str)] = &[
    ("package main\nfunc main() { println(\"hi\") }", "go"),
    ("def add(a,b):\n    return a+b\nprint(add(2,3))", "python"),
    ("function add(a,b){return a+b;}\nconsole.log(add(2,3));", "javascript"),
    ("<!doctype html>\n<title>x</title>\n<p>Hello</p>", "html"),
    ("SELECT 1;\nCREATE TABLE t(id INT);", "sql"),
    ("#!/usr/bin/env bash\necho hi\nexit 0", "bash"),
    ("{\n  \"name\": \"demo\",\n  \"ok\": true\n}", "json"),
];

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "snipdb", version, about = "Inspect and maintain the snippet database")]
struct Args {
    /// Database file (defaults to ./data/snipvault.db, or the app data dir with --prod)
    #[arg(long, env = "SNIPVAULT_DB", global = true)]
    db: Option<PathBuf>,

    /// Use the production data directory
    #[arg(long, global = true)]
    prod: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the settings as the UI sees them
    Settings,
    /// Drop all data and recreate the schema
    Reset,
    /// Insert sample snippets (one per language when N is omitted)
    Seed { count: Option<usize> },
    /// Print the most recently captured snippets
    Dump {
        #[arg(default_value_t = 10)]
        count: i64,
    },
    /// Search snippets
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Delete snippets past the retention horizon
    Purge,
    /// Rebuild the search index and verify it
    Reindex,
    /// List the bundled highlight styles
    Styles,
    SetStyle { name: String },
    SetFontSize { size: i64 },
    SetRetention { days: i64 },
    SetHotkey {
        /// Key code name, e.g. KeyV or Space
        #[arg(long)]
        code: String,
        /// Modifier name (Control, Shift, Alt, Meta); repeatable
        #[arg(long = "modifier")]
        modifiers: Vec<String>,
    },
    /// Remove the database file and its WAL siblings
    Delete,
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("snipdb: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let db_path = args
        .db
        .unwrap_or_else(|| StoreConfig::default_db_path(args.prod));

    if let Command::Delete = args.command {
        return delete_database(&db_path);
    }

    let store = SnippetStore::open(StoreConfig::new(&db_path))?;
    match args.command {
        Command::Settings => print_json(&store.ui_settings()?),
        Command::Reset => {
            store.reset()?;
            println!("Database reset.");
            Ok(())
        }
        Command::Seed { count } => {
            let inserted = seed(&store, count.unwrap_or(SAMPLES.len()))?;
            println!("Inserted {inserted} snippets.");
            Ok(())
        }
        Command::Dump { count } => print_json(&store.dump(count)?),
        Command::Search { query, limit } => {
            print_json(&store.find_snippets(&query.join(" "), None, Some(limit))?)
        }
        Command::Purge => {
            let deleted = store.purge_expired()?;
            println!(
                "Purged {deleted} snippets, {} remaining.",
                store.snippet_count()?
            );
            Ok(())
        }
        Command::Reindex => {
            store.rebuild_index()?;
            store.check_index()?;
            println!("Index rebuilt for {} snippets.", store.snippet_count()?);
            Ok(())
        }
        Command::Styles => print_json(&available_styles()),
        Command::SetStyle { name } => {
            store.set_style(&name)?;
            print_json(&store.ui_settings()?)
        }
        Command::SetFontSize { size } => {
            if !store.set_font_size(size)? {
                eprintln!("font size {size} is out of range, ignored");
            }
            print_json(&store.ui_settings()?)
        }
        Command::SetRetention { days } => {
            store.set_retention_days(days)?;
            print_json(&store.ui_settings()?)
        }
        Command::SetHotkey { code, modifiers } => {
            let hotkey = store.set_toggle_hotkey(&Shortcut { modifiers, code })?;
            println!("Toggle hotkey set to {hotkey}.");
            Ok(())
        }
        Command::Delete => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn seed(store: &SnippetStore, count: usize) -> Result<usize, CliError> {
    let now = Utc::now();
    for i in 0..count {
        let (source, language) = SAMPLES[i % SAMPLES.len()];
        let nanos = now.timestamp_nanos_opt().unwrap_or_default();
        let marker = content_hash(&format!("{nanos}-{i}"))[..8].to_string();
        let content = with_seed_marker(source, language, &marker)?;
        store.add_snippet(&content, language, now.timestamp())?;
    }
    Ok(count)
}

/// Makes each seeded sample unique so dedup keeps every row.
fn with_seed_marker(source: &str, language: &str, marker: &str) -> Result<String, CliError> {
    let marked = match language {
        "go" | "javascript" => format!("{source}\n// seed:{marker}"),
        "python" | "bash" => format!("{source}\n# seed:{marker}"),
        "sql" => format!("{source}\n-- seed:{marker}"),
        "html" => format!("{source}\n<!-- seed:{marker} -->"),
        "json" => {
            let mut value: Value = serde_json::from_str(source)?;
            if let Some(object) = value.as_object_mut() {
                object.insert("_seed".to_string(), Value::String(marker.to_string()));
            }
            serde_json::to_string_pretty(&value)?
        }
        _ => format!("{source}\n{marker}"),
    };
    Ok(marked)
}

fn delete_database(db_path: &Path) -> Result<(), CliError> {
    fs::remove_file(db_path).map_err(|source| CliError::Io {
        path: db_path.to_path_buf(),
        source,
    })?;
    for suffix in ["-wal", "-shm"] {
        let mut sibling = db_path.as_os_str().to_owned();
        sibling.push(suffix);
        let sibling = PathBuf::from(sibling);
        match fs::remove_file(&sibling) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(CliError::Io { path: sibling, source }),
        }
    }
    println!("Database deleted.");
    Ok(())
}
