//! Local/remote URL classification
//!
//! A URL is *local* when it points into this service, in which case a loose
//! foreign key resolves it to a row through the [`ResourceLocator`]. Everything
//! else is *remote* and gets fetched.
//!
//! Two strategies exist:
//!
//! - explicit base URLs (`loose_fk_local_base_urls`): prefix matching, the
//!   request host is ignored
//! - host matching: the URL's host must equal the host of the current request
//!
//! [`ResourceLocator`]: crate::locator::ResourceLocator

use reinhardt_loose_fk_conf::LooseFkSettings;
use url::Url;

/// Decide whether `url` belongs to this service
///
/// With a non-empty `local_base_urls` the URL is local iff it starts with one
/// of the base URLs (case-sensitive). Otherwise it is local iff the authority
/// of the URL, as written, equals `host`. Malformed URLs are never local.
///
/// # Examples
///
/// ```
/// use reinhardt_loose_fk_urls::is_local;
///
/// let none: [&str; 0] = [];
/// assert!(is_local("api.example.nl", "http://api.example.nl/zaken/1", &none));
/// assert!(!is_local("api.example.nl", "http://otherapi.example.nl/zaken/1", &none));
///
/// let bases = ["http://otherapi.example.nl/ozgv-t/zaken"];
/// assert!(is_local("api.example.nl", "http://otherapi.example.nl/ozgv-t/zaken/1", &bases));
/// ```
pub fn is_local<S: AsRef<str>>(host: &str, url: &str, local_base_urls: &[S]) -> bool {
	if !local_base_urls.is_empty() {
		return local_base_urls
			.iter()
			.any(|base| url.starts_with(base.as_ref()));
	}

	match url_authority(url) {
		Some(authority) => authority == host,
		None => false,
	}
}

/// Authority of the URL exactly as written, without userinfo
///
/// The text is taken from the input rather than from the parsed URL, which
/// lowercases the host and drops default ports.
fn url_authority(url: &str) -> Option<&str> {
	let parsed = Url::parse(url).ok()?;
	parsed.host_str()?;

	let rest = &url[url.find("://")? + 3..];
	let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
	let authority = &rest[..end];
	Some(match authority.rfind('@') {
		Some(at) => &authority[at + 1..],
		None => authority,
	})
}

/// Settings driven classifier used by loaders and validators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlClassifier {
	local_base_urls: Vec<String>,
	allowed_hosts: Vec<String>,
}

impl UrlClassifier {
	pub fn new(local_base_urls: Vec<String>, allowed_hosts: Vec<String>) -> Self {
		Self {
			local_base_urls,
			allowed_hosts,
		}
	}

	/// Build a classifier from the given settings
	pub fn from_settings(settings: &LooseFkSettings) -> Self {
		Self::new(
			settings.loose_fk_local_base_urls.clone(),
			settings.allowed_hosts.clone(),
		)
	}

	pub fn local_base_urls(&self) -> &[String] {
		&self.local_base_urls
	}

	pub fn allowed_hosts(&self) -> &[String] {
		&self.allowed_hosts
	}

	/// Classify `url` against the current request host
	///
	/// When no request host is known (e.g. while resolving a relation nested in
	/// a remote payload outside of a request) the URL's host is checked against
	/// `allowed_hosts` instead. A `*` entry accepts every host, which makes
	/// every URL local.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_urls::UrlClassifier;
	///
	/// let classifier = UrlClassifier::new(vec![], vec!["testserver.com".to_string()]);
	/// assert!(classifier.is_local_url("http://testserver.com/zaaktypen/1/", None));
	/// assert!(!classifier.is_local_url("https://example.com/zaaktypen/1/", None));
	/// assert!(classifier.is_local_url("https://example.com/zaaktypen/1/", Some("example.com")));
	/// ```
	pub fn is_local_url(&self, url: &str, host: Option<&str>) -> bool {
		if !self.local_base_urls.is_empty() {
			return is_local(host.unwrap_or_default(), url, &self.local_base_urls);
		}

		if let Some(host) = host {
			let none: [&str; 0] = [];
			return is_local(host, url, &none);
		}

		let Some(url_host) = Url::parse(url)
			.ok()
			.and_then(|parsed| parsed.host_str().map(str::to_lowercase))
		else {
			return false;
		};

		self.allowed_hosts
			.iter()
			.any(|pattern| host_matches(&url_host, pattern))
	}
}

/// Allowed-hosts style matching: `*` matches anything, `.example.com` matches
/// `example.com` and all of its subdomains, anything else must match exactly
/// (case-insensitive).
fn host_matches(host: &str, pattern: &str) -> bool {
	let pattern = pattern.to_lowercase();
	if pattern == "*" {
		return true;
	}
	if let Some(domain) = pattern.strip_prefix('.') {
		return host == domain || host.ends_with(&pattern);
	}
	host == pattern
}
