//! Configuration module for quarry.
//!
//! Handles settings files and environment variable expansion.

mod settings;

pub use settings::{expand_env_vars, QuerySettings, Settings, SettingsError, SqliteSettings};
