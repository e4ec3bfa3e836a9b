//! Error types for loose foreign keys

use reinhardt_loose_fk_urls::LocatorError;

/// Result type for loose foreign key operations
pub type LooseFkResult<T> = Result<T, LooseFkError>;

/// Errors raised while reading, writing, resolving or querying loose foreign keys
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LooseFkError {
	/// The remote endpoint was unreachable or answered with a non-2xx status
	#[error("Failed to fetch {url}: {reason}")]
	Fetch { url: String, reason: String },

	/// The remote body was not a JSON object
	#[error("{url} did not return a JSON object: {reason}")]
	FetchJson { url: String, reason: String },

	/// A local URL did not resolve to a row
	#[error("Object does not exist: {0}")]
	NotFound(String),

	#[error("Lookup for {path} returned {count} objects, expected exactly one")]
	MultipleObjectsReturned { path: String, count: usize },

	/// Neither or both of the two columns are populated
	#[error("Invariant violated: {0}")]
	InvariantViolation(String),

	/// A value of an unsupported type was assigned to a loose field
	#[error("Type mismatch: {0}")]
	TypeMismatch(String),

	#[error("Saving remotely fetched objects is forbidden.")]
	ForbiddenPersist,

	#[error("Invalid URL: {0}")]
	InvalidUrl(String),

	#[error("Cannot convert value for field '{field}': {reason}")]
	Coercion { field: String, reason: String },

	#[error("Model '{model}' has no field '{field}'")]
	UnknownField { model: String, field: String },

	#[error("Unknown model: {0}")]
	UnknownModel(String),

	#[error("No fetcher registered under '{0}'")]
	UnknownFetcher(String),

	#[error(transparent)]
	Locator(LocatorError),
}

impl LooseFkError {
	/// Stable machine readable code for the validation layer
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_db::LooseFkError;
	///
	/// let err = LooseFkError::NotFound("/zaaktypen/1/".to_string());
	/// assert_eq!(err.code(), "does_not_exist");
	/// ```
	pub fn code(&self) -> &'static str {
		match self {
			LooseFkError::Fetch { .. } | LooseFkError::InvalidUrl(_) => "bad-url",
			LooseFkError::FetchJson { .. } => "invalid-resource",
			LooseFkError::NotFound(_) => "does_not_exist",
			LooseFkError::ForbiddenPersist => "forbidden",
			LooseFkError::TypeMismatch(_) | LooseFkError::Coercion { .. } => "invalid",
			_ => "error",
		}
	}
}

impl From<LocatorError> for LooseFkError {
	fn from(err: LocatorError) -> Self {
		match err {
			LocatorError::NotFound(msg) => LooseFkError::NotFound(msg),
			LocatorError::MultipleObjectsReturned { path, count } => {
				LooseFkError::MultipleObjectsReturned { path, count }
			}
			LocatorError::InvalidUrl(msg) => LooseFkError::InvalidUrl(msg),
			other => LooseFkError::Locator(other),
		}
	}
}
