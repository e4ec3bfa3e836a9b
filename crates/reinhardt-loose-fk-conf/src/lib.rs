//! # Reinhardt Loose FK Configuration
//!
//! Settings and startup checks for loose foreign keys.
//!
//! ## Module Organization
//!
//! - [`settings`]: The [`LooseFkSettings`] type and the process-wide instance
//! - [`checks`]: System checks such as the wildcard `allowed_hosts` warning

pub mod checks;
pub mod settings;

pub use checks::{CheckLevel, CheckMessage, check_allowed_hosts_wildcard, run_checks};
pub use settings::{
	DEFAULT_LOADER_NAME, LooseFkSettings, SettingsError, on_settings_changed, reconfigure,
	reset_settings, settings,
};
