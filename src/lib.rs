pub mod api;
pub mod config;
pub mod engine;
pub mod init;
pub mod settings;
pub mod stats;
pub mod store;
pub mod updater;
