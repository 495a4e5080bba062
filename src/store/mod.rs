mod file;
mod memory;
mod types;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use types::{
    ChangeListener, ListenerId, SettingsStore, StorageArea, StorageChange, StorageMap,
};

/// Storage keys shared between the engine, the updater and store setup.
pub mod keys {
    pub const SETTINGS: &str = "transparentZenSettings";
    pub const SKIP_THEMING: &str = "skipThemingList";
    pub const SKIP_FORCE_THEMING: &str = "skipForceThemingList";
    pub const FALLBACK_BACKGROUND: &str = "fallbackBackgroundList";
    pub const STYLES_MAPPING: &str = "stylesMapping";
    pub const STYLES: &str = "styles";
    pub const REPOSITORY_URL: &str = "stylesRepositoryUrl";
}
