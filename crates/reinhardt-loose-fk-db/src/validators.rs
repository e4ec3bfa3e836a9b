//! Validation of incoming references
//!
//! An API client submits a loose foreign key as a URL. Before storing it, the
//! URL is resolved with the host of the current request: local URLs must
//! route to an existing row and remote URLs must return a JSON object.
//! Failures are reported as [`FieldValidationError`]s with a stable code.

use crate::descriptor::LooseValue;
use crate::errors::{LooseFkError, LooseFkResult};
use crate::loaders::{Loader, default_loader};
use crate::model::{ModelMeta, get_model};
use crate::query_list::is_url;
use crate::virtual_models::Resolved;
use std::sync::Arc;

pub const CODE_BAD_URL: &str = "bad-url";
pub const CODE_INVALID_RESOURCE: &str = "invalid-resource";
pub const CODE_DOES_NOT_EXIST: &str = "does_not_exist";

/// Field level validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldValidationError {
	pub field: String,
	pub code: &'static str,
	pub message: String,
}

/// Errors of [`LooseFkValidator::validate`]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidatorError {
	/// The submitted value is rejected
	#[error(transparent)]
	Field(#[from] FieldValidationError),

	/// Resolution failed for a reason the client cannot fix
	#[error(transparent)]
	Internal(#[from] LooseFkError),
}

/// Resolves submitted URLs for one loose field
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
	remote_model: Arc<ModelMeta>,
	field: String,
	loader: Arc<Loader>,
}

impl ReferenceResolver {
	pub fn new(remote_model: Arc<ModelMeta>, field: impl Into<String>, loader: Arc<Loader>) -> Self {
		Self {
			remote_model,
			field: field.into(),
			loader,
		}
	}

	/// Resolver for the loose field `name` of `model`, using the field's
	/// loader or the default one
	pub fn for_field(model: &ModelMeta, name: &str) -> LooseFkResult<Self> {
		let field = model
			.get_loose_field(name)
			.ok_or_else(|| LooseFkError::UnknownField {
				model: model.name().to_string(),
				field: name.to_string(),
			})?;
		let remote_model = get_model(&field.remote_model(model)?)?;
		let loader = match field.loader() {
			Some(loader) => Arc::clone(loader),
			None => default_loader()?,
		};
		Ok(Self {
			remote_model,
			field: name.to_string(),
			loader,
		})
	}

	pub fn with_loader(mut self, loader: Arc<Loader>) -> Self {
		self.loader = loader;
		self
	}

	pub fn field(&self) -> &str {
		&self.field
	}

	/// Resolve `url` as seen from a request to `host`
	pub async fn resolve(&self, host: &str, url: &str) -> LooseFkResult<Resolved> {
		self.loader.resolve(url, &self.remote_model, Some(host)).await
	}
}

/// Validator for submitted loose foreign key URLs
#[derive(Debug, Clone)]
pub struct LooseFkValidator {
	resolver: ReferenceResolver,
}

impl LooseFkValidator {
	pub fn new(resolver: ReferenceResolver) -> Self {
		Self { resolver }
	}

	pub fn for_field(model: &ModelMeta, name: &str) -> LooseFkResult<Self> {
		Ok(Self::new(ReferenceResolver::for_field(model, name)?))
	}

	pub fn resolver(&self) -> &ReferenceResolver {
		&self.resolver
	}

	fn reject(&self, code: &'static str, url: &str) -> FieldValidationError {
		FieldValidationError {
			field: self.resolver.field.clone(),
			code,
			message: format!(
				"Bad URL \"{}\" - object could not be fetched. This *may* be because you have insufficient read permissions.",
				url
			),
		}
	}

	/// Check that `url` resolves, returning what it resolved to
	pub async fn validate(&self, host: &str, url: &str) -> Result<Resolved, ValidatorError> {
		if !is_url(url) {
			return Err(FieldValidationError {
				field: self.resolver.field.clone(),
				code: CODE_BAD_URL,
				message: "Enter a valid URL.".to_string(),
			}
			.into());
		}

		match self.resolver.resolve(host, url).await {
			Ok(resolved) => Ok(resolved),
			Err(err @ LooseFkError::Fetch { .. }) => {
				tracing::info!(url, error = %err, "could not fetch remote object");
				Err(self.reject(CODE_BAD_URL, url).into())
			}
			Err(err @ LooseFkError::FetchJson { .. }) => {
				tracing::info!(url, error = %err, "url does not point to a JSON endpoint");
				Err(self.reject(CODE_INVALID_RESOURCE, url).into())
			}
			Err(LooseFkError::NotFound(_)) => {
				tracing::info!(url, "local lookup did not resolve to an object");
				Err(self.reject(CODE_DOES_NOT_EXIST, url).into())
			}
			Err(err) => Err(err.into()),
		}
	}

	/// Validate and convert into the value to store: the local row, or the
	/// URL of a remote object
	pub async fn to_internal_value(&self, host: &str, url: &str) -> Result<LooseValue, ValidatorError> {
		Ok(match self.validate(host, url).await? {
			Resolved::Local(record) => LooseValue::Local(record),
			Resolved::Virtual(_) => LooseValue::Url(url.to_string()),
		})
	}
}
