//! System checks
//!
//! Checks run at startup and report configuration problems as [`CheckMessage`]s
//! instead of failing hard. Each message carries a stable identifier so that
//! deployments can silence or assert on specific checks.

use crate::settings::LooseFkSettings;
use serde::Serialize;
use std::fmt;

/// Identifier of the wildcard `allowed_hosts` warning
pub const WILDCARD_ALLOWED_HOSTS: &str = "reinhardt_loose_fk.W001";

/// Severity of a check message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CheckLevel {
	Debug,
	Info,
	Warning,
	Error,
	Critical,
}

impl fmt::Display for CheckLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			CheckLevel::Debug => "DEBUG",
			CheckLevel::Info => "INFO",
			CheckLevel::Warning => "WARNING",
			CheckLevel::Error => "ERROR",
			CheckLevel::Critical => "CRITICAL",
		};
		f.write_str(label)
	}
}

/// A single finding produced by a system check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckMessage {
	pub level: CheckLevel,
	pub msg: String,
	pub hint: Option<String>,
	/// Object the message is about, rendered as text
	pub obj: Option<String>,
	/// Stable identifier (e.g. "reinhardt_loose_fk.W001")
	pub id: String,
}

impl CheckMessage {
	/// Create a new check message
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_conf::checks::{CheckLevel, CheckMessage};
	///
	/// let message = CheckMessage::new(CheckLevel::Error, "broken", "app.E001")
	///     .with_hint("fix it");
	/// assert!(message.is_serious());
	/// assert_eq!(message.hint.as_deref(), Some("fix it"));
	/// ```
	pub fn new(level: CheckLevel, msg: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			level,
			msg: msg.into(),
			hint: None,
			obj: None,
			id: id.into(),
		}
	}

	pub fn warning(msg: impl Into<String>, id: impl Into<String>) -> Self {
		Self::new(CheckLevel::Warning, msg, id)
	}

	pub fn error(msg: impl Into<String>, id: impl Into<String>) -> Self {
		Self::new(CheckLevel::Error, msg, id)
	}

	pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
		self.hint = Some(hint.into());
		self
	}

	pub fn with_obj(mut self, obj: impl Into<String>) -> Self {
		self.obj = Some(obj.into());
		self
	}

	/// Errors and above stop a deployment; warnings do not
	pub fn is_serious(&self) -> bool {
		self.level >= CheckLevel::Error
	}
}

impl fmt::Display for CheckMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(obj) = &self.obj {
			write!(f, "{}: ", obj)?;
		}
		write!(f, "({}) {}", self.id, self.msg)?;
		if let Some(hint) = &self.hint {
			write!(f, "\n\tHINT: {}", hint)?;
		}
		Ok(())
	}
}

/// Warn when `allowed_hosts` contains a bare wildcard
///
/// A wildcard makes every host acceptable, so host based classification treats
/// every URL as local and remote references can no longer be detected.
///
/// # Examples
///
/// ```
/// use reinhardt_loose_fk_conf::LooseFkSettings;
/// use reinhardt_loose_fk_conf::checks::{check_allowed_hosts_wildcard, WILDCARD_ALLOWED_HOSTS};
///
/// let settings = LooseFkSettings::new().with_allowed_hosts(["*"]);
/// let messages = check_allowed_hosts_wildcard(&settings);
/// assert_eq!(messages.len(), 1);
/// assert_eq!(messages[0].id, WILDCARD_ALLOWED_HOSTS);
/// ```
pub fn check_allowed_hosts_wildcard(settings: &LooseFkSettings) -> Vec<CheckMessage> {
	if !settings.has_wildcard_host() {
		return Vec::new();
	}

	vec![
		CheckMessage::warning(
			"You have wildcards in your ALLOWED_HOSTS setting - this will cause all remote \
			 URLs to be considered local URLs and break the loose foreign key behaviour.",
			WILDCARD_ALLOWED_HOSTS,
		)
		.with_obj(format!("ALLOWED_HOSTS={:?}", settings.allowed_hosts))
		.with_hint("You should use an explicit list of domains *without* wildcards."),
	]
}

/// Run every registered check against the given settings and log the findings
pub fn run_checks(settings: &LooseFkSettings) -> Vec<CheckMessage> {
	let messages = check_allowed_hosts_wildcard(settings);

	for message in &messages {
		match message.level {
			CheckLevel::Debug | CheckLevel::Info => {
				tracing::info!(check = %message.id, "{}", message)
			}
			CheckLevel::Warning => tracing::warn!(check = %message.id, "{}", message),
			CheckLevel::Error | CheckLevel::Critical => {
				tracing::error!(check = %message.id, "{}", message)
			}
		}
	}

	messages
}
