//! Relation handlers of virtual types
//!
//! Relation fields of a fetched payload are kept raw on the
//! [`VirtualInstance`] and resolved on access by the handler the
//! [`VirtualType`](crate::virtual_models::VirtualType) installed for the field.

use crate::errors::{LooseFkError, LooseFkResult};
use crate::loaders::Loader;
use crate::model::{ModelMeta, get_model};
use crate::query_list::{QueryList, is_url};
use crate::virtual_models::{LooseFkData, Resolved, VirtualInstance, virtual_model_factory};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Strategy resolving one relation field of a virtual instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationHandler {
	/// Foreign key: a single URL or nested object
	Single { field: String, remote_model: String },
	/// Many-to-many: a list of URLs
	Collection { field: String, remote_model: String },
	/// Loose foreign key: a URL that is itself classified as local or remote
	Loose { field: String, remote_model: String },
}

/// A resolved relation
#[derive(Debug, Clone, PartialEq)]
pub enum Relation {
	None,
	One(Resolved),
	Many(QueryList),
}

impl Relation {
	pub fn is_none(&self) -> bool {
		matches!(self, Relation::None)
	}

	pub fn one(&self) -> Option<&Resolved> {
		match self {
			Relation::One(resolved) => Some(resolved),
			_ => None,
		}
	}

	pub fn many(&self) -> Option<&QueryList> {
		match self {
			Relation::Many(list) => Some(list),
			_ => None,
		}
	}
}

impl RelationHandler {
	pub fn field_name(&self) -> &str {
		match self {
			RelationHandler::Single { field, .. }
			| RelationHandler::Collection { field, .. }
			| RelationHandler::Loose { field, .. } => field,
		}
	}

	pub fn remote_model(&self) -> &str {
		match self {
			RelationHandler::Single { remote_model, .. }
			| RelationHandler::Collection { remote_model, .. }
			| RelationHandler::Loose { remote_model, .. } => remote_model,
		}
	}

	/// Resolve the field's raw value on `instance`
	pub async fn load(&self, instance: &VirtualInstance) -> LooseFkResult<Relation> {
		let raw = match instance.loose_fk_data(self.field_name()) {
			Some(LooseFkData::Loaded(relation)) => return Ok(relation.clone()),
			Some(LooseFkData::Raw(raw)) => raw,
			None if matches!(self, RelationHandler::Collection { .. }) => {
				return Ok(Relation::Many(QueryList::default()));
			}
			None => return Ok(Relation::None),
		};

		let loader = instance.virtual_type().loader();
		let remote = get_model(self.remote_model())?;
		let host = instance.host();

		match self {
			RelationHandler::Single { .. } => match raw {
				JsonValue::Null => Ok(Relation::None),
				other => Ok(Relation::One(
					resolve_raw(self.field_name(), loader, other, &remote, host).await?,
				)),
			},
			RelationHandler::Collection { .. } => {
				let items = match raw {
					JsonValue::Null => return Ok(Relation::Many(QueryList::default())),
					JsonValue::Array(items) => items,
					other => {
						return Err(LooseFkError::TypeMismatch(format!(
							"{}: expected a list of URLs, got {}",
							self.field_name(),
							other
						)));
					}
				};

				let mut resolved = Vec::with_capacity(items.len());
				for item in items {
					resolved.push(resolve_raw(self.field_name(), loader, item, &remote, host).await?);
				}
				Ok(Relation::Many(QueryList::new(resolved)))
			}
			RelationHandler::Loose { .. } => match raw {
				JsonValue::Null => Ok(Relation::None),
				JsonValue::String(url) if !is_url(url) => Err(LooseFkError::InvalidUrl(url.clone())),
				other => {
					tracing::debug!(
						field = self.field_name(),
						"resolving chained loose reference"
					);
					Ok(Relation::One(
						resolve_raw(self.field_name(), loader, other, &remote, host).await?,
					))
				}
			},
		}
	}
}

/// Resolve a raw relation value: URLs through the loader, nested objects inline
async fn resolve_raw(
	field: &str,
	loader: &Arc<Loader>,
	raw: &JsonValue,
	remote: &Arc<ModelMeta>,
	host: Option<&str>,
) -> LooseFkResult<Resolved> {
	match raw {
		JsonValue::String(url) => loader.resolve(url, remote, host).await,
		JsonValue::Object(object) => {
			let virtual_type = virtual_model_factory(remote, loader);
			Ok(Resolved::Virtual(
				virtual_type.materialize(object.clone(), host)?,
			))
		}
		other => Err(LooseFkError::TypeMismatch(format!(
			"{}: expected a URL or an object, got {}",
			field, other
		))),
	}
}
