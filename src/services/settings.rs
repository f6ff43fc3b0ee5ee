use serde::Serialize;
use tracing::debug;

use crate::db::{Database, SettingsRow};
use crate::error::{StoreError, StoreResult};
use crate::hotkey::{Hotkey, Shortcut};
use crate::services::highlight;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;
pub const DEFAULT_FONT_SIZE: i64 = 14;
pub const MIN_FONT_SIZE: i64 = 8;
pub const MAX_FONT_SIZE: i64 = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub style: String,
    pub retention_days: i64,
    pub toggle_hotkey: Hotkey,
    pub font_size: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StyleInfo {
    pub name: String,
    pub css: String,
}

/// Settings in the shape the UI consumes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UiSettings {
    pub style: StyleInfo,
    pub toggle_hotkey: Shortcut,
    pub retention_days: i64,
    pub font_size: i64,
}

pub fn normalize_retention_days(days: i64) -> i64 {
    days.max(0)
}

pub fn font_size_in_range(size: i64) -> bool {
    (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size)
}

/// Writes the default row unless one already exists. Returns whether it wrote.
pub fn bootstrap(db: &Database, default_style: &str) -> StoreResult<bool> {
    let row = SettingsRow {
        retention_days: DEFAULT_RETENTION_DAYS,
        style: default_style.to_string(),
        toggle_hotkey: Hotkey::default().encode()?,
        font_size: DEFAULT_FONT_SIZE,
    };
    let inserted = db.insert_settings_if_absent(&row)?;
    if inserted {
        debug!("bootstrapped default settings");
    }
    Ok(inserted)
}

pub fn load(db: &Database) -> StoreResult<Settings> {
    let row = db.read_settings()?;
    let toggle_hotkey =
        Hotkey::decode(&row.toggle_hotkey).map_err(|err| StoreError::MalformedState {
            field: "toggle_hotkey",
            reason: err.to_string(),
        })?;
    Ok(Settings {
        style: row.style,
        retention_days: row.retention_days,
        toggle_hotkey,
        font_size: row.font_size,
    })
}

pub fn load_ui(db: &Database) -> StoreResult<UiSettings> {
    let settings = load(db)?;
    let css = highlight::style_css(&settings.style)?;
    Ok(UiSettings {
        toggle_hotkey: settings.toggle_hotkey.to_shortcut(),
        style: StyleInfo {
            name: settings.style,
            css,
        },
        retention_days: settings.retention_days,
        font_size: settings.font_size,
    })
}

pub fn set_style(db: &Database, style: &str) -> StoreResult<()> {
    Ok(db.update_style(style)?)
}

pub fn set_retention_days(db: &Database, days: i64) -> StoreResult<i64> {
    let days = normalize_retention_days(days);
    db.update_retention_days(days)?;
    Ok(days)
}

/// Out-of-range sizes are ignored; returns whether the value was stored.
pub fn set_font_size(db: &Database, size: i64) -> StoreResult<bool> {
    if !font_size_in_range(size) {
        debug!("ignoring font size {size}");
        return Ok(false);
    }
    db.update_font_size(size)?;
    Ok(true)
}

pub fn set_toggle_hotkey(db: &Database, shortcut: &Shortcut) -> StoreResult<Hotkey> {
    let hotkey = Hotkey::from_shortcut(shortcut)?;
    db.update_toggle_hotkey(&hotkey.encode()?)?;
    Ok(hotkey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_STYLE;
    use crate::hotkey::HotkeyError;

    fn bootstrapped() -> Database {
        let db = Database::new_in_memory().expect("db init");
        bootstrap(&db, DEFAULT_STYLE).expect("bootstrap");
        db
    }

    #[test]
    fn bootstrap_writes_defaults_once() {
        let db = bootstrapped();
        set_font_size(&db, 20).expect("font");
        assert!(!bootstrap(&db, "InspiredGitHub").expect("second bootstrap"));

        let settings = load(&db).expect("load");
        assert_eq!(settings.style, DEFAULT_STYLE);
        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.font_size, 20);
        assert_eq!(settings.toggle_hotkey, Hotkey::default());
    }

    #[test]
    fn font_size_outside_bounds_is_ignored() {
        let db = bootstrapped();
        assert!(!set_font_size(&db, 7).expect("too small"));
        assert!(!set_font_size(&db, 33).expect("too large"));
        assert_eq!(load(&db).expect("load").font_size, DEFAULT_FONT_SIZE);
        assert!(set_font_size(&db, 8).expect("lower bound"));
        assert!(set_font_size(&db, 32).expect("upper bound"));
        assert_eq!(load(&db).expect("load").font_size, 32);
    }

    #[test]
    fn non_positive_retention_means_disabled() {
        let db = bootstrapped();
        assert_eq!(set_retention_days(&db, -4).expect("negative"), 0);
        assert_eq!(load(&db).expect("load").retention_days, 0);
        assert_eq!(set_retention_days(&db, 7).expect("positive"), 7);
        assert_eq!(db.retention_days().expect("days"), 7);
    }

    #[test]
    fn hotkey_updates_round_trip_through_storage() {
        let db = bootstrapped();
        let shortcut = Shortcut {
            modifiers: vec!["Control".to_string(), "Alt".to_string()],
            code: "Space".to_string(),
        };
        set_toggle_hotkey(&db, &shortcut).expect("set hotkey");
        assert_eq!(load_ui(&db).expect("ui").toggle_hotkey, shortcut);
        assert_eq!(
            db.read_settings().expect("row").toggle_hotkey,
            r#"{"mods":[4096,2048],"key":49}"#
        );
    }

    #[test]
    fn unsupported_hotkey_names_leave_settings_untouched() {
        let db = bootstrapped();
        let err = set_toggle_hotkey(
            &db,
            &Shortcut {
                modifiers: vec!["Meta".to_string()],
                code: "Pause".to_string(),
            },
        )
        .expect_err("unsupported");
        assert!(matches!(
            err,
            StoreError::Hotkey(HotkeyError::UnsupportedKey(_))
        ));
        assert_eq!(load(&db).expect("load").toggle_hotkey, Hotkey::default());
    }

    #[test]
    fn corrupt_hotkey_is_a_hard_error() {
        let db = bootstrapped();
        for raw in [r#"{"mods":[256],"key":4242}"#, r#"{"mods":[512,512],"key":0}"#] {
            db.update_toggle_hotkey(raw).expect("write raw");
            assert!(matches!(
                load(&db),
                Err(StoreError::MalformedState {
                    field: "toggle_hotkey",
                    ..
                })
            ));
        }
    }

    #[test]
    fn ui_settings_resolve_style_css() {
        let db = bootstrapped();
        set_style(&db, "InspiredGitHub").expect("style");
        let ui = load_ui(&db).expect("ui");
        assert_eq!(ui.style.name, "InspiredGitHub");
        assert!(!ui.style.css.is_empty());
        assert_eq!(ui.toggle_hotkey.code, "KeyA");
    }
}
