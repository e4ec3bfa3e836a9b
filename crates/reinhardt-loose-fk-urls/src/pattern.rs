//! Path patterns for resource routes
//!
//! Patterns use the `{name}` placeholder syntax, e.g. `/zaaktypen/{pk}/`.
//! A placeholder captures one path segment.

use crate::locator::LocatorError;
use std::collections::HashMap;

/// Maximum allowed length for a pattern string in bytes.
const MAX_PATTERN_LENGTH: usize = 1024;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20;

/// A compiled resource path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
	pattern: String,
	regex: regex::Regex,
	param_names: Vec<String>,
}

impl PathPattern {
	/// Compile a pattern
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_urls::PathPattern;
	///
	/// let pattern = PathPattern::new("/zaaktypen/{pk}/").unwrap();
	/// let params = pattern.matches("/zaaktypen/42/").unwrap();
	/// assert_eq!(params.get("pk").map(String::as_str), Some("42"));
	/// assert!(pattern.matches("/zaaktypen/42/extra/").is_none());
	/// ```
	pub fn new(pattern: &str) -> Result<Self, LocatorError> {
		if pattern.len() > MAX_PATTERN_LENGTH {
			return Err(LocatorError::InvalidPattern(format!(
				"pattern length {} exceeds maximum of {} bytes",
				pattern.len(),
				MAX_PATTERN_LENGTH
			)));
		}

		let (regex_str, param_names) = Self::compile(pattern)?;
		let regex = regex::RegexBuilder::new(&regex_str)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| LocatorError::InvalidPattern(format!("{}: {}", pattern, e)))?;

		Ok(Self {
			pattern: pattern.to_string(),
			regex,
			param_names,
		})
	}

	fn compile(pattern: &str) -> Result<(String, Vec<String>), LocatorError> {
		let mut regex_str = String::from("^");
		let mut param_names = Vec::new();
		let mut chars = pattern.chars();

		while let Some(c) = chars.next() {
			if c == '{' {
				let mut name = String::new();
				let mut closed = false;
				for next in chars.by_ref() {
					if next == '}' {
						closed = true;
						break;
					}
					name.push(next);
				}

				let valid_name = !name.is_empty()
					&& name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
				if !closed || !valid_name {
					return Err(LocatorError::InvalidPattern(format!(
						"invalid placeholder in '{}'",
						pattern
					)));
				}

				regex_str.push_str(&format!("(?P<{}>[^/]+)", name));
				param_names.push(name);
			} else {
				regex_str.push_str(&regex::escape(&c.to_string()));
			}
		}

		regex_str.push('$');
		Ok((regex_str, param_names))
	}

	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	pub fn param_names(&self) -> &[String] {
		&self.param_names
	}

	/// Match a path, returning the captured parameters
	pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
		let caps = self.regex.captures(path)?;
		Some(
			self.param_names
				.iter()
				.filter_map(|name| {
					caps.name(name)
						.map(|m| (name.clone(), m.as_str().to_string()))
				})
				.collect(),
		)
	}

	/// Substitute parameters back into the pattern
	///
	/// Returns `None` if a placeholder has no value.
	pub fn reverse(&self, params: &HashMap<String, String>) -> Option<String> {
		let mut path = self.pattern.clone();
		for name in &self.param_names {
			let value = params.get(name)?;
			path = path.replace(&format!("{{{}}}", name), value);
		}
		Some(path)
	}
}
