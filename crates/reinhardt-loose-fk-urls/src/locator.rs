//! Resource lookup by local path
//!
//! [`ResourceLocator`] turns the path of a local detail URL into the entity
//! behind it: the script prefix is stripped, the path is routed through the
//! [`ResourceRouter`] and the matched handler is queried with its lookup field.

use crate::router::ResourceRouter;
use reinhardt_loose_fk_conf::LooseFkSettings;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Errors raised while locating a local resource
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
	/// The path did not route, or the query returned nothing
	#[error("Resource not found: {0}")]
	NotFound(String),

	/// The lookup matched several rows. Lookup fields are expected to be unique,
	/// so this is an internal error rather than bad input.
	#[error("Lookup for {path} returned {count} objects, expected exactly one")]
	MultipleObjectsReturned { path: String, count: usize },

	#[error("Invalid URL: {0}")]
	InvalidUrl(String),

	#[error("Invalid route pattern: {0}")]
	InvalidPattern(String),

	/// The resource's own query failed
	#[error("Query failed: {0}")]
	Query(String),
}

/// Locates local entities from detail paths
pub struct ResourceLocator<E> {
	router: Arc<ResourceRouter<E>>,
	script_prefix: Option<String>,
}

impl<E> Clone for ResourceLocator<E> {
	fn clone(&self) -> Self {
		Self {
			router: Arc::clone(&self.router),
			script_prefix: self.script_prefix.clone(),
		}
	}
}

impl<E> fmt::Debug for ResourceLocator<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceLocator")
			.field("router", &self.router)
			.field("script_prefix", &self.script_prefix)
			.finish()
	}
}

impl<E: Send + 'static> ResourceLocator<E> {
	pub fn new(router: Arc<ResourceRouter<E>>) -> Self {
		Self {
			router,
			script_prefix: None,
		}
	}

	/// Use the script prefix from the settings
	pub fn from_settings(router: Arc<ResourceRouter<E>>, settings: &LooseFkSettings) -> Self {
		let locator = Self::new(router);
		match &settings.force_script_name {
			Some(prefix) => locator.with_script_prefix(prefix.clone()),
			None => locator,
		}
	}

	pub fn with_script_prefix(mut self, prefix: impl Into<String>) -> Self {
		let prefix = prefix.into();
		let prefix = prefix.trim_end_matches('/');
		self.script_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
		self
	}

	pub fn router(&self) -> &ResourceRouter<E> {
		&self.router
	}

	/// Remove the script prefix from `path` if it is present
	///
	/// # Examples
	///
	/// ```
	/// use std::sync::Arc;
	/// use reinhardt_loose_fk_urls::{ResourceLocator, ResourceRouter};
	///
	/// let locator = ResourceLocator::<String>::new(Arc::new(ResourceRouter::new()))
	///     .with_script_prefix("/api/");
	/// assert_eq!(locator.strip_script_prefix("/api/zaken/1/"), "/zaken/1/");
	/// assert_eq!(locator.strip_script_prefix("/zaken/1/"), "/zaken/1/");
	/// ```
	pub fn strip_script_prefix<'a>(&self, path: &'a str) -> &'a str {
		let Some(prefix) = &self.script_prefix else {
			return path;
		};
		match path.strip_prefix(prefix.as_str()) {
			Some(rest) if rest.starts_with('/') => rest,
			_ => path,
		}
	}

	/// Find the single entity behind a local path
	pub async fn locate(&self, path: &str) -> Result<E, LocatorError> {
		let path = self.strip_script_prefix(path);
		let route = self.router.route(path).ok_or_else(|| {
			tracing::debug!(path, "path did not resolve to a resource");
			LocatorError::NotFound(format!("URL did not resolve: {}", path))
		})?;

		let mut found = route
			.handler
			.query(&route.lookup_field, &route.lookup_value)
			.await?;

		match found.len() {
			0 => Err(LocatorError::NotFound(format!(
				"no {} with {}={}",
				route.name, route.lookup_field, route.lookup_value
			))),
			1 => found.pop().ok_or_else(|| LocatorError::NotFound(path.to_string())),
			count => {
				tracing::warn!(path, count, "detail lookup matched several objects");
				Err(LocatorError::MultipleObjectsReturned {
					path: path.to_string(),
					count,
				})
			}
		}
	}

	/// Find the single entity behind an absolute local URL
	pub async fn locate_url(&self, url: &str) -> Result<E, LocatorError> {
		let parsed =
			Url::parse(url).map_err(|e| LocatorError::InvalidUrl(format!("{}: {}", url, e)))?;
		self.locate(parsed.path()).await
	}
}
