use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::hotkey::Hotkey;
use crate::services::settings::Settings;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("hotkey {0} is already taken")]
    HotkeyTaken(String),
    #[error("platform call failed: {0}")]
    Platform(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KeyDownCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Screen point in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// A live registration; dropping it without cancelling leaks the OS binding.
pub trait Subscription: Send {
    fn cancel(self: Box<Self>) -> Result<(), CapabilityError>;
}

pub trait HotkeySource: Send + Sync {
    fn register(
        &self,
        hotkey: &Hotkey,
        on_key_down: KeyDownCallback,
    ) -> Result<Box<dyn Subscription>, CapabilityError>;
}

pub trait WindowHost: Send + Sync {
    fn show_near(&self, cursor: CursorPosition) -> Result<(), CapabilityError>;
}

pub trait PasteInjector: Send + Sync {
    fn inject_paste(&self) -> Result<(), CapabilityError>;
}

pub fn register_toggle_hotkey(
    settings: &Settings,
    source: &dyn HotkeySource,
    on_key_down: KeyDownCallback,
) -> Result<Box<dyn Subscription>, CapabilityError> {
    let subscription = source.register(&settings.toggle_hotkey, on_key_down)?;
    info!("registered toggle hotkey {}", settings.toggle_hotkey);
    Ok(subscription)
}
