//! Toggle hotkey model.
//!
//! A hotkey is persisted as `{"mods":[flags…],"key":code}` using Carbon modifier
//! flags and macOS virtual key codes, and shown to the UI as DOM
//! `KeyboardEvent.code` names. Both directions go through the fixed tables
//! below, so anything outside them fails to decode.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),
    #[error("unsupported modifier: {0}")]
    UnsupportedModifier(String),
    #[error("unknown key code: {0}")]
    UnknownKeyCode(u32),
    #[error("unknown modifier flag: {0}")]
    UnknownModifierFlag(u32),
    #[error("modifier {0} listed more than once")]
    DuplicateModifier(&'static str),
    #[error("invalid encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Control,
    Shift,
    Alt,
    Meta,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [
        Modifier::Control,
        Modifier::Shift,
        Modifier::Alt,
        Modifier::Meta,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Modifier::Control => "Control",
            Modifier::Shift => "Shift",
            Modifier::Alt => "Alt",
            Modifier::Meta => "Meta",
        }
    }

    pub fn flag(self) -> u32 {
        match self {
            Modifier::Meta => 1 << 8,
            Modifier::Shift => 1 << 9,
            Modifier::Alt => 1 << 11,
            Modifier::Control => 1 << 12,
        }
    }

    pub fn from_name(name: &str) -> Result<Self, HotkeyError> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| HotkeyError::UnsupportedModifier(name.to_string()))
    }

    pub fn from_flag(flag: u32) -> Result<Self, HotkeyError> {
        Self::ALL
            .into_iter()
            .find(|m| m.flag() == flag)
            .ok_or(HotkeyError::UnknownModifierFlag(flag))
    }
}

const KEYS: &[(&str, u32)] = &[
    ("Space", 0x31),
    ("Digit1", 0x12),
    ("Digit2", 0x13),
    ("Digit3", 0x14),
    ("Digit4", 0x15),
    ("Digit5", 0x17),
    ("Digit6", 0x16),
    ("Digit7", 0x1A),
    ("Digit8", 0x1C),
    ("Digit9", 0x19),
    ("Digit0", 0x1D),
    ("KeyA", 0x00),
    ("KeyB", 0x0B),
    ("KeyC", 0x08),
    ("KeyD", 0x02),
    ("KeyE", 0x0E),
    ("KeyF", 0x03),
    ("KeyG", 0x05),
    ("KeyH", 0x04),
    ("KeyI", 0x22),
    ("KeyJ", 0x26),
    ("KeyK", 0x28),
    ("KeyL", 0x25),
    ("KeyM", 0x2E),
    ("KeyN", 0x2D),
    ("KeyO", 0x1F),
    ("KeyP", 0x23),
    ("KeyQ", 0x0C),
    ("KeyR", 0x0F),
    ("KeyS", 0x01),
    ("KeyT", 0x11),
    ("KeyU", 0x20),
    ("KeyV", 0x09),
    ("KeyW", 0x0D),
    ("KeyX", 0x07),
    ("KeyY", 0x10),
    ("KeyZ", 0x06),
    ("Enter", 0x24),
    ("Escape", 0x35),
    ("Backspace", 0x33),
    ("Tab", 0x30),
    ("ArrowLeft", 0x7B),
    ("ArrowRight", 0x7C),
    ("ArrowUp", 0x7E),
    ("ArrowDown", 0x7D),
    ("F1", 0x7A),
    ("F2", 0x78),
    ("F3", 0x63),
    ("F4", 0x76),
    ("F5", 0x60),
    ("F6", 0x61),
    ("F7", 0x62),
    ("F8", 0x64),
    ("F9", 0x65),
    ("F10", 0x6D),
    ("F11", 0x67),
    ("F12", 0x6F),
    ("F13", 0x69),
    ("F14", 0x6B),
    ("F15", 0x71),
    ("F16", 0x6A),
    ("F17", 0x40),
    ("F18", 0x4F),
    ("F19", 0x50),
    ("F20", 0x5A),
];

/// A key from the supported table. Only constructible through a table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    idx: usize,
}

/// Index of `name` in [`KEYS`], resolved at compile time.
const fn key_index(name: &str) -> usize {
    let mut idx = 0;
    while idx < KEYS.len() {
        if str_eq(KEYS[idx].0, name) {
            return idx;
        }
        idx += 1;
    }
    panic!("key missing from KEYS")
}

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

const DEFAULT_KEY: Key = Key {
    idx: key_index("KeyA"),
};

impl Key {
    pub fn all() -> impl Iterator<Item = Key> {
        (0..KEYS.len()).map(|idx| Key { idx })
    }

    pub fn name(self) -> &'static str {
        KEYS[self.idx].0
    }

    pub fn code(self) -> u32 {
        KEYS[self.idx].1
    }

    pub fn from_name(name: &str) -> Result<Self, HotkeyError> {
        KEYS.iter()
            .position(|(n, _)| *n == name)
            .map(|idx| Key { idx })
            .ok_or_else(|| HotkeyError::UnsupportedKey(name.to_string()))
    }

    pub fn from_code(code: u32) -> Result<Self, HotkeyError> {
        KEYS.iter()
            .position(|(_, c)| *c == code)
            .map(|idx| Key { idx })
            .ok_or(HotkeyError::UnknownKeyCode(code))
    }
}

/// UI-facing form of a hotkey, e.g. `{"modifiers":["Meta","Shift"],"code":"KeyA"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortcut {
    pub modifiers: Vec<String>,
    pub code: String,
}

#[derive(Serialize, Deserialize)]
struct EncodedHotkey {
    mods: Vec<u32>,
    key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    pub modifiers: Vec<Modifier>,
    pub key: Key,
}

impl Hotkey {
    pub fn new(modifiers: Vec<Modifier>, key: Key) -> Self {
        Self { modifiers, key }
    }

    pub fn encode(&self) -> Result<String, HotkeyError> {
        let encoded = EncodedHotkey {
            mods: self.modifiers.iter().map(|m| m.flag()).collect(),
            key: self.key.code(),
        };
        Ok(serde_json::to_string(&encoded)?)
    }

    pub fn decode(raw: &str) -> Result<Self, HotkeyError> {
        let encoded: EncodedHotkey = serde_json::from_str(raw)?;
        let modifiers = encoded
            .mods
            .into_iter()
            .map(Modifier::from_flag)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            modifiers: distinct(modifiers)?,
            key: Key::from_code(encoded.key)?,
        })
    }

    pub fn to_shortcut(&self) -> Shortcut {
        Shortcut {
            modifiers: self.modifiers.iter().map(|m| m.name().to_string()).collect(),
            code: self.key.name().to_string(),
        }
    }

    pub fn from_shortcut(shortcut: &Shortcut) -> Result<Self, HotkeyError> {
        let key = Key::from_name(&shortcut.code)?;
        let modifiers = shortcut
            .modifiers
            .iter()
            .map(|name| Modifier::from_name(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            modifiers: distinct(modifiers)?,
            key,
        })
    }
}

/// Modifiers form a set; a repeat means the input is malformed.
fn distinct(modifiers: Vec<Modifier>) -> Result<Vec<Modifier>, HotkeyError> {
    for (idx, modifier) in modifiers.iter().enumerate() {
        if modifiers[..idx].contains(modifier) {
            return Err(HotkeyError::DuplicateModifier(modifier.name()));
        }
    }
    Ok(modifiers)
}

impl Default for Hotkey {
    fn default() -> Self {
        Self {
            modifiers: vec![Modifier::Meta, Modifier::Shift],
            key: DEFAULT_KEY,
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier.name())?;
        }
        f.write_str(self.key.name())
    }
}
