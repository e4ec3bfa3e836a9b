//! Loose foreign key settings
//!
//! Settings can be built in code, loaded from environment variables or read from a
//! TOML/JSON configuration file. A process-wide instance is kept behind [`settings()`]
//! and replaced through [`reconfigure()`], which notifies every registered change
//! listener so that loader-derived state can be rebuilt.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Name of the fetcher used when no loader is configured
pub const DEFAULT_LOADER_NAME: &str = "default";

/// Settings consumed by the loose foreign key machinery
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LooseFkSettings {
	/// Name of the registered fetcher used by the default loader
	#[serde(default = "default_loader_name")]
	pub default_loose_fk_loader: String,

	/// Explicit URL prefixes that are always treated as local.
	/// When non-empty, host based classification is not used at all.
	#[serde(default)]
	pub loose_fk_local_base_urls: Vec<String>,

	/// Host names this deployment answers to
	#[serde(default)]
	pub allowed_hosts: Vec<String>,

	/// Script prefix the service is mounted under (e.g. "/api")
	#[serde(default)]
	pub force_script_name: Option<String>,
}

fn default_loader_name() -> String {
	DEFAULT_LOADER_NAME.to_string()
}

impl Default for LooseFkSettings {
	fn default() -> Self {
		Self {
			default_loose_fk_loader: default_loader_name(),
			loose_fk_local_base_urls: Vec::new(),
			allowed_hosts: Vec::new(),
			force_script_name: None,
		}
	}
}

impl LooseFkSettings {
	/// Create new settings with defaults
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_conf::LooseFkSettings;
	///
	/// let settings = LooseFkSettings::new();
	/// assert_eq!(settings.default_loose_fk_loader, "default");
	/// assert!(settings.loose_fk_local_base_urls.is_empty());
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	/// Select the fetcher used by the default loader
	pub fn with_loader(mut self, name: impl Into<String>) -> Self {
		self.default_loose_fk_loader = name.into();
		self
	}

	/// Set the explicit local base URLs
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_conf::LooseFkSettings;
	///
	/// let settings = LooseFkSettings::new()
	///     .with_local_base_urls(["http://api.example.nl/ozgv-t/zaken"]);
	/// assert_eq!(settings.loose_fk_local_base_urls.len(), 1);
	/// ```
	pub fn with_local_base_urls<I, S>(mut self, urls: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.loose_fk_local_base_urls = urls.into_iter().map(Into::into).collect();
		self
	}

	/// Set the allowed hosts
	pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.allowed_hosts = hosts.into_iter().map(Into::into).collect();
		self
	}

	/// Set the script prefix
	pub fn with_force_script_name(mut self, prefix: impl Into<String>) -> Self {
		self.force_script_name = Some(prefix.into());
		self
	}

	/// Validate settings
	///
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.default_loose_fk_loader.trim().is_empty() {
			return Err(SettingsError::ValidationError(
				"DEFAULT_LOOSE_FK_LOADER must not be empty".to_string(),
			));
		}

		if let Some(base) = self
			.loose_fk_local_base_urls
			.iter()
			.find(|base| !(base.starts_with("http://") || base.starts_with("https://")))
		{
			return Err(SettingsError::ValidationError(format!(
				"LOOSE_FK_LOCAL_BASE_URLS entry '{}' must be an absolute http(s) URL",
				base
			)));
		}

		if let Some(prefix) = &self.force_script_name
			&& !prefix.starts_with('/')
		{
			return Err(SettingsError::ValidationError(format!(
				"FORCE_SCRIPT_NAME '{}' must start with '/'",
				prefix
			)));
		}

		Ok(())
	}

	/// Whether the allowed hosts contain a bare wildcard
	pub fn has_wildcard_host(&self) -> bool {
		self.allowed_hosts.iter().any(|host| host == "*")
	}

	/// Load settings from environment variables
	///
	pub fn from_env() -> Result<Self, SettingsError> {
		let mut settings = Self::default();

		if let Ok(loader) = std::env::var("REINHARDT_LOOSE_FK_LOADER") {
			settings.default_loose_fk_loader = loader;
		}

		if let Ok(urls) = std::env::var("REINHARDT_LOOSE_FK_LOCAL_BASE_URLS") {
			settings.loose_fk_local_base_urls = split_list(&urls);
		}

		if let Ok(hosts) = std::env::var("REINHARDT_ALLOWED_HOSTS") {
			settings.allowed_hosts = split_list(&hosts);
		}

		if let Ok(prefix) = std::env::var("REINHARDT_FORCE_SCRIPT_NAME")
			&& !prefix.is_empty()
		{
			settings.force_script_name = Some(prefix);
		}

		settings.validate()?;
		Ok(settings)
	}

	/// Load settings from a configuration file
	///
	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
		let path = path.into();
		let contents = std::fs::read_to_string(&path).map_err(|e| {
			SettingsError::FileError(format!("Failed to read {}: {}", path.display(), e))
		})?;

		let settings: LooseFkSettings =
			if path.extension().and_then(|s| s.to_str()) == Some("toml") {
				toml::from_str(&contents)
					.map_err(|e| SettingsError::ParseError(format!("TOML parse error: {}", e)))?
			} else if path.extension().and_then(|s| s.to_str()) == Some("json") {
				serde_json::from_str(&contents)
					.map_err(|e| SettingsError::ParseError(format!("JSON parse error: {}", e)))?
			} else {
				return Err(SettingsError::UnsupportedFormat(
					"Supported formats: .toml, .json".to_string(),
				));
			};

		settings.validate()?;
		Ok(settings)
	}
}

fn split_list(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
		.collect()
}

/// Settings errors
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("File error: {0}")]
	FileError(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Unsupported format: {0}")]
	UnsupportedFormat(String),
}

type ChangeListener = Arc<dyn Fn(&LooseFkSettings) + Send + Sync>;

static SETTINGS: Lazy<RwLock<Arc<LooseFkSettings>>> =
	Lazy::new(|| RwLock::new(Arc::new(LooseFkSettings::default())));

static LISTENERS: Lazy<RwLock<Vec<ChangeListener>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Current process-wide settings
pub fn settings() -> Arc<LooseFkSettings> {
	SETTINGS.read().clone()
}

/// Replace the process-wide settings and notify change listeners
///
/// # Examples
///
/// ```
/// use reinhardt_loose_fk_conf::{LooseFkSettings, reconfigure, reset_settings, settings};
///
/// reconfigure(LooseFkSettings::new().with_allowed_hosts(["api.example.com"]));
/// assert_eq!(settings().allowed_hosts, vec!["api.example.com".to_string()]);
///
/// reset_settings();
/// assert!(settings().allowed_hosts.is_empty());
/// ```
pub fn reconfigure(new_settings: LooseFkSettings) -> Arc<LooseFkSettings> {
	let new_settings = Arc::new(new_settings);
	{
		let mut guard = SETTINGS.write();
		*guard = new_settings.clone();
	}

	tracing::debug!(
		loader = %new_settings.default_loose_fk_loader,
		local_base_urls = new_settings.loose_fk_local_base_urls.len(),
		"loose fk settings reconfigured"
	);

	// Listeners run outside the settings lock so they can read the new value
	let listeners = LISTENERS.read().clone();
	for listener in listeners {
		listener(&new_settings);
	}

	new_settings
}

/// Restore the default settings
pub fn reset_settings() -> Arc<LooseFkSettings> {
	reconfigure(LooseFkSettings::default())
}

/// Register a callback invoked after every [`reconfigure()`]
pub fn on_settings_changed<F>(listener: F)
where
	F: Fn(&LooseFkSettings) + Send + Sync + 'static,
{
	LISTENERS.write().push(Arc::new(listener));
}
