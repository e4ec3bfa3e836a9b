//! Remote loaders
//!
//! A [`Loader`] turns a URL into an entity. Local URLs are routed through the
//! [`ResourceLocator`] and yield the real row; remote URLs are fetched with a
//! pluggable [`Fetch`] implementation and materialized as read-only
//! [`VirtualInstance`]s.
//!
//! Fetchers are registered by name in a process-wide registry. The default
//! loader is built from the fetcher named by the `default_loose_fk_loader`
//! setting and rebuilt whenever the settings are reconfigured.

use crate::errors::{LooseFkError, LooseFkResult};
use crate::model::{ModelMeta, Record};
use crate::virtual_models::{Resolved, virtual_model_factory};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use reinhardt_loose_fk_conf::{LooseFkSettings, on_settings_changed, settings};
use reinhardt_loose_fk_urls::{ResourceLocator, ResourceRouter, UrlClassifier};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

/// A decoded JSON object
pub type JsonObject = Map<String, JsonValue>;

/// Strategy fetching the JSON representation of a remote resource
#[async_trait]
pub trait Fetch: Send + Sync {
	/// Fetch `url`
	///
	/// Fails with [`LooseFkError::Fetch`] for transport errors and non-success
	/// statuses, and with [`LooseFkError::FetchJson`] when the body is not a
	/// JSON object.
	async fn fetch(&self, url: &str) -> LooseFkResult<JsonObject>;
}

/// Decode a response body into a JSON object
pub fn decode_object(url: &str, body: &[u8]) -> LooseFkResult<JsonObject> {
	let value: JsonValue = serde_json::from_slice(body).map_err(|e| LooseFkError::FetchJson {
		url: url.to_string(),
		reason: e.to_string(),
	})?;

	match value {
		JsonValue::Object(object) => Ok(object),
		other => Err(LooseFkError::FetchJson {
			url: url.to_string(),
			reason: format!("expected a JSON object, got {}", json_type(&other)),
		}),
	}
}

fn json_type(value: &JsonValue) -> &'static str {
	match value {
		JsonValue::Null => "null",
		JsonValue::Bool(_) => "a boolean",
		JsonValue::Number(_) => "a number",
		JsonValue::String(_) => "a string",
		JsonValue::Array(_) => "an array",
		JsonValue::Object(_) => "an object",
	}
}

/// Fetcher issuing plain HTTP GET requests
#[cfg(feature = "http-loader")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetcher {
	client: reqwest::Client,
}

#[cfg(feature = "http-loader")]
impl ReqwestFetcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Use a preconfigured client (timeouts, auth headers, ...)
	pub fn with_client(client: reqwest::Client) -> Self {
		Self { client }
	}
}

#[cfg(feature = "http-loader")]
#[async_trait]
impl Fetch for ReqwestFetcher {
	async fn fetch(&self, url: &str) -> LooseFkResult<JsonObject> {
		let fetch_error = |reason: String| LooseFkError::Fetch {
			url: url.to_string(),
			reason,
		};

		let response = self
			.client
			.get(url)
			.send()
			.await
			.map_err(|e| fetch_error(format!("Request failed: {}", e)))?;

		let status = response.status();
		if !status.is_success() {
			tracing::info!(url, %status, "remote fetch returned an error status");
			return Err(fetch_error(format!("status {}", status)));
		}

		let body = response
			.bytes()
			.await
			.map_err(|e| fetch_error(format!("Failed to read body: {}", e)))?;

		decode_object(url, &body)
	}
}

type FetcherFactory = Arc<dyn Fn() -> Arc<dyn Fetch> + Send + Sync>;

static FETCHERS: Lazy<RwLock<HashMap<String, FetcherFactory>>> = Lazy::new(|| {
	#[allow(unused_mut)]
	let mut fetchers: HashMap<String, FetcherFactory> = HashMap::new();
	#[cfg(feature = "http-loader")]
	fetchers.insert(
		reinhardt_loose_fk_conf::DEFAULT_LOADER_NAME.to_string(),
		Arc::new(|| Arc::new(ReqwestFetcher::new()) as Arc<dyn Fetch>),
	);
	RwLock::new(fetchers)
});

/// Registry of named fetchers
pub struct FetcherRegistry;

impl FetcherRegistry {
	/// Register a fetcher factory under `name`, replacing any previous one
	pub fn register<F>(name: impl Into<String>, factory: F)
	where
		F: Fn() -> Arc<dyn Fetch> + Send + Sync + 'static,
	{
		let name = name.into();
		tracing::debug!(fetcher = %name, "registered fetcher");
		FETCHERS.write().insert(name, Arc::new(factory));
		reset_default_loader();
	}

	/// Build the fetcher registered under `name`
	pub fn get(name: &str) -> LooseFkResult<Arc<dyn Fetch>> {
		let factory = FETCHERS
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| LooseFkError::UnknownFetcher(name.to_string()))?;
		Ok(factory())
	}

	pub fn contains(name: &str) -> bool {
		FETCHERS.read().contains_key(name)
	}
}

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Resolves URLs to local records or virtual instances
pub struct Loader {
	id: u64,
	fetcher: Arc<dyn Fetch>,
	classifier: UrlClassifier,
	locator: Option<ResourceLocator<Arc<Record>>>,
}

impl Loader {
	pub fn new(fetcher: Arc<dyn Fetch>, classifier: UrlClassifier) -> Self {
		Self {
			id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
			fetcher,
			classifier,
			locator: None,
		}
	}

	/// Build a loader from settings, routing local URLs through `router`
	pub fn from_settings(
		settings: &LooseFkSettings,
		router: Option<Arc<ResourceRouter<Arc<Record>>>>,
	) -> LooseFkResult<Self> {
		let fetcher = FetcherRegistry::get(&settings.default_loose_fk_loader)?;
		let loader = Self::new(fetcher, UrlClassifier::from_settings(settings));
		Ok(match router {
			Some(router) => loader.with_locator(ResourceLocator::from_settings(router, settings)),
			None => loader,
		})
	}

	pub fn with_locator(mut self, locator: ResourceLocator<Arc<Record>>) -> Self {
		self.locator = Some(locator);
		self
	}

	/// Process unique identifier, part of the virtual type cache key
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn classifier(&self) -> &UrlClassifier {
		&self.classifier
	}

	pub fn locator(&self) -> Option<&ResourceLocator<Arc<Record>>> {
		self.locator.as_ref()
	}

	pub fn is_local_url(&self, url: &str, host: Option<&str>) -> bool {
		self.classifier.is_local_url(url, host)
	}

	/// Fetch the raw JSON object behind a remote URL
	pub async fn fetch_object(&self, url: &str) -> LooseFkResult<JsonObject> {
		tracing::debug!(url, "fetching remote object");
		self.fetcher.fetch(url).await
	}

	/// Find the local record behind a local URL
	pub async fn load_local(&self, url: &str) -> LooseFkResult<Arc<Record>> {
		let locator = self.locator.as_ref().ok_or_else(|| {
			LooseFkError::NotFound(format!("no resource router configured to resolve {}", url))
		})?;
		Ok(locator.locate_url(url).await?)
	}

	/// Resolve `url` to an instance of `model`
	///
	/// Local URLs yield the real row, remote URLs a virtual instance whose
	/// nested relations resolve against the same `host`.
	pub async fn resolve(
		self: &Arc<Self>,
		url: &str,
		model: &Arc<ModelMeta>,
		host: Option<&str>,
	) -> LooseFkResult<Resolved> {
		if self.is_local_url(url, host) {
			tracing::debug!(url, model = model.name(), "resolving local url");
			return Ok(Resolved::Local(self.load_local(url).await?));
		}

		let payload = self.fetch_object(url).await?;
		let virtual_type = virtual_model_factory(model, self);
		let mut instance = virtual_type.materialize(payload, host)?;
		if instance.url().is_none() {
			instance.set_url(url);
		}
		Ok(Resolved::Virtual(instance))
	}
}

impl fmt::Debug for Loader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Loader")
			.field("id", &self.id)
			.field("classifier", &self.classifier)
			.field("locator", &self.locator)
			.finish()
	}
}

static ROUTER: Lazy<RwLock<Option<Arc<ResourceRouter<Arc<Record>>>>>> =
	Lazy::new(|| RwLock::new(None));

static DEFAULT_LOADER: Lazy<RwLock<Option<Arc<Loader>>>> = Lazy::new(|| RwLock::new(None));

static LISTEN: Once = Once::new();

/// Install the routing table the default loader resolves local URLs with
pub fn install_router(router: Arc<ResourceRouter<Arc<Record>>>) {
	*ROUTER.write() = Some(router);
	reset_default_loader();
}

/// Drop the cached default loader; the next call to [`default_loader()`]
/// rebuilds it from the current settings
pub fn reset_default_loader() {
	if DEFAULT_LOADER.write().take().is_some() {
		tracing::debug!("default loose fk loader reset");
	}
}

/// The loader configured by the process-wide settings
pub fn default_loader() -> LooseFkResult<Arc<Loader>> {
	LISTEN.call_once(|| on_settings_changed(|_| reset_default_loader()));

	if let Some(loader) = DEFAULT_LOADER.read().as_ref() {
		return Ok(Arc::clone(loader));
	}

	let mut slot = DEFAULT_LOADER.write();
	if let Some(loader) = slot.as_ref() {
		return Ok(Arc::clone(loader));
	}

	let router = ROUTER.read().clone();
	let loader = Arc::new(Loader::from_settings(&settings(), router)?);
	tracing::debug!(loader = loader.id(), "built default loose fk loader");
	*slot = Some(Arc::clone(&loader));
	Ok(loader)
}
