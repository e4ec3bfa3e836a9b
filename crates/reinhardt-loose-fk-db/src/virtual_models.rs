//! Virtual models
//!
//! Remote resources are materialized as [`VirtualInstance`]s of a
//! [`VirtualType`]: a read-only view over a local model whose relation fields
//! are backed by lazy [`RelationHandler`]s instead of database columns.
//!
//! Virtual types are created once per (model, loader) pair and kept for the
//! lifetime of the process, so every instance of a type shares the same
//! handlers.

use crate::errors::{LooseFkError, LooseFkResult};
use crate::handlers::{Relation, RelationHandler};
use crate::loaders::{JsonObject, Loader};
use crate::model::{FieldKind, ModelMeta, Record, Value};
use dashmap::DashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Key of the payload holding the resource URL
pub const URL_KEY: &str = "url";

static VIRTUAL_TYPES: Lazy<DashMap<(String, u64), Arc<VirtualType>>> = Lazy::new(DashMap::new);

/// Read-only variant of a model, bound to the loader that produced it
pub struct VirtualType {
	model: Arc<ModelMeta>,
	loader: Arc<Loader>,
	handlers: IndexMap<String, RelationHandler>,
}

impl VirtualType {
	fn new(model: Arc<ModelMeta>, loader: Arc<Loader>) -> Self {
		let mut handlers = IndexMap::new();

		for field in model.fields() {
			let handler = match &field.kind {
				FieldKind::ForeignKey { to } => RelationHandler::Single {
					field: field.name.clone(),
					remote_model: to.clone(),
				},
				FieldKind::ManyToMany { to } => RelationHandler::Collection {
					field: field.name.clone(),
					remote_model: to.clone(),
				},
				_ => continue,
			};
			handlers.insert(field.name.clone(), handler);
		}

		for loose in model.loose_fields() {
			match loose.remote_model(&model) {
				Ok(remote_model) => {
					handlers.insert(
						loose.name().to_string(),
						RelationHandler::Loose {
							field: loose.name().to_string(),
							remote_model,
						},
					);
				}
				Err(err) => {
					tracing::warn!(
						model = model.name(),
						field = loose.name(),
						error = %err,
						"loose fk without a foreign key target, skipping handler"
					);
				}
			}
		}

		Self {
			model,
			loader,
			handlers,
		}
	}

	/// Name of the virtual type, e.g. `VirtualZaakType`
	pub fn name(&self) -> String {
		format!("Virtual{}", self.model.name())
	}

	pub fn model(&self) -> &Arc<ModelMeta> {
		&self.model
	}

	pub fn loader(&self) -> &Arc<Loader> {
		&self.loader
	}

	pub fn handler(&self, field: &str) -> Option<&RelationHandler> {
		self.handlers.get(field)
	}

	pub fn handlers(&self) -> impl Iterator<Item = &RelationHandler> {
		self.handlers.values()
	}

	/// Build an instance from a fetched payload
	///
	/// Only declared field names and the `url` key are kept. Scalar fields are
	/// converted to their semantic type, relation fields are stored raw and
	/// resolved on access. Auto-created fields are never taken from the
	/// payload, so a virtual instance has no primary key.
	pub fn materialize(
		self: &Arc<Self>,
		payload: JsonObject,
		host: Option<&str>,
	) -> LooseFkResult<VirtualInstance> {
		let mut values = IndexMap::new();
		let mut loose_fk_data = HashMap::new();

		for field in self.model.fields() {
			if field.is_auto_created() {
				continue;
			}
			let Some(raw) = payload.get(&field.name) else {
				continue;
			};
			if self.handlers.contains_key(&field.name) {
				loose_fk_data.insert(field.name.clone(), LooseFkData::Raw(raw.clone()));
			} else {
				values.insert(field.name.clone(), field.to_value(raw)?);
			}
		}

		for loose in self.model.loose_fields() {
			if let Some(raw) = payload.get(loose.name()) {
				loose_fk_data.insert(loose.name().to_string(), LooseFkData::Raw(raw.clone()));
			}
		}

		let url = payload
			.get(URL_KEY)
			.and_then(JsonValue::as_str)
			.map(str::to_string);

		Ok(VirtualInstance {
			virtual_type: Arc::clone(self),
			url,
			initial_data: payload,
			values,
			loose_fk_data,
			host: host.map(str::to_string),
		})
	}
}

impl fmt::Debug for VirtualType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("VirtualType")
			.field("name", &self.name())
			.field("loader", &self.loader.id())
			.field("handlers", &self.handlers.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Get the virtual type of `model` for `loader`
///
/// The first request creates the type; every later request for the same
/// model and loader returns the same `Arc`, also under concurrent first
/// access.
pub fn virtual_model_factory(model: &Arc<ModelMeta>, loader: &Arc<Loader>) -> Arc<VirtualType> {
	let key = (model.name().to_string(), loader.id());
	VIRTUAL_TYPES
		.entry(key)
		.or_insert_with(|| {
			tracing::debug!(
				model = model.name(),
				loader = loader.id(),
				"creating virtual model"
			);
			Arc::new(VirtualType::new(Arc::clone(model), Arc::clone(loader)))
		})
		.value()
		.clone()
}

/// Relation data stored on a virtual instance
#[derive(Debug, Clone)]
pub enum LooseFkData {
	/// Raw payload value, resolved by the field's handler on access
	Raw(JsonValue),
	/// Already resolved value, returned as is
	Loaded(Relation),
}

/// Read-only instance of a remote resource
#[derive(Clone)]
pub struct VirtualInstance {
	virtual_type: Arc<VirtualType>,
	url: Option<String>,
	initial_data: JsonObject,
	values: IndexMap<String, Value>,
	loose_fk_data: HashMap<String, LooseFkData>,
	host: Option<String>,
}

impl VirtualInstance {
	pub fn url(&self) -> Option<&str> {
		self.url.as_deref()
	}

	pub(crate) fn set_url(&mut self, url: &str) {
		self.url = Some(url.to_string());
	}

	pub fn virtual_type(&self) -> &Arc<VirtualType> {
		&self.virtual_type
	}

	pub fn model(&self) -> &Arc<ModelMeta> {
		self.virtual_type.model()
	}

	/// The payload the instance was built from
	pub fn initial_data(&self) -> &JsonObject {
		&self.initial_data
	}

	/// Host of the request that triggered the resolution
	pub fn host(&self) -> Option<&str> {
		self.host.as_deref()
	}

	/// Converted value of a scalar field
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.values.get(field)
	}

	/// Primary key taken from the payload
	///
	/// Auto-created primary keys are never materialized, so this is `None`
	/// unless the model declares its own primary key field.
	pub fn pk(&self) -> Option<&Value> {
		self.values.get(self.model().pk_name())
	}

	pub fn loose_fk_data(&self, field: &str) -> Option<&LooseFkData> {
		self.loose_fk_data.get(field)
	}

	/// Resolve a relation field
	///
	/// Values stored with [`VirtualInstance::set_loaded`] are returned without
	/// any I/O; raw values are resolved by the field's handler.
	pub async fn related(&self, field: &str) -> LooseFkResult<Relation> {
		if let Some(LooseFkData::Loaded(relation)) = self.loose_fk_data.get(field) {
			return Ok(relation.clone());
		}

		let handler = self
			.virtual_type
			.handler(field)
			.ok_or_else(|| LooseFkError::UnknownField {
				model: self.virtual_type.name(),
				field: field.to_string(),
			})?;
		handler.load(self).await
	}

	/// Store a raw value for a relation field
	pub fn set_related(&mut self, field: &str, raw: JsonValue) -> LooseFkResult<()> {
		self.relation_slot(field)?;
		self.loose_fk_data
			.insert(field.to_string(), LooseFkData::Raw(raw));
		Ok(())
	}

	/// Store an already resolved value for a relation field
	pub fn set_loaded(&mut self, field: &str, relation: Relation) -> LooseFkResult<()> {
		self.relation_slot(field)?;
		self.loose_fk_data
			.insert(field.to_string(), LooseFkData::Loaded(relation));
		Ok(())
	}

	fn relation_slot(&self, field: &str) -> LooseFkResult<()> {
		match self.virtual_type.handler(field) {
			Some(_) => Ok(()),
			None => Err(LooseFkError::UnknownField {
				model: self.virtual_type.name(),
				field: field.to_string(),
			}),
		}
	}

	/// Remote data is never written to the local database
	///
	/// # Errors
	///
	/// Always fails with [`LooseFkError::ForbiddenPersist`].
	pub fn save(&self) -> LooseFkResult<()> {
		tracing::warn!(url = ?self.url, "attempt to save a remotely fetched object");
		Err(LooseFkError::ForbiddenPersist)
	}
}

impl fmt::Debug for VirtualInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct(&self.virtual_type.name())
			.field("url", &self.url)
			.field("values", &self.values)
			.finish()
	}
}

/// Virtual instances are identified by their URL
impl PartialEq for VirtualInstance {
	fn eq(&self, other: &Self) -> bool {
		self.url == other.url
	}
}

impl PartialEq<str> for VirtualInstance {
	fn eq(&self, other: &str) -> bool {
		self.url.as_deref() == Some(other)
	}
}

impl PartialEq<&str> for VirtualInstance {
	fn eq(&self, other: &&str) -> bool {
		self.url.as_deref() == Some(*other)
	}
}

impl PartialEq<String> for VirtualInstance {
	fn eq(&self, other: &String) -> bool {
		self.url.as_deref() == Some(other.as_str())
	}
}

/// Outcome of resolving a URL
#[derive(Debug, Clone)]
pub enum Resolved {
	/// The URL pointed into this service
	Local(Arc<Record>),
	/// The URL was fetched
	Virtual(VirtualInstance),
}

impl Resolved {
	pub fn is_local(&self) -> bool {
		matches!(self, Resolved::Local(_))
	}

	pub fn as_record(&self) -> Option<&Arc<Record>> {
		match self {
			Resolved::Local(record) => Some(record),
			Resolved::Virtual(_) => None,
		}
	}

	pub fn as_virtual(&self) -> Option<&VirtualInstance> {
		match self {
			Resolved::Virtual(instance) => Some(instance),
			Resolved::Local(_) => None,
		}
	}

	/// URL of a virtual instance; local records carry none
	pub fn url(&self) -> Option<&str> {
		self.as_virtual().and_then(VirtualInstance::url)
	}

	/// Scalar field value of either representation
	pub fn get(&self, field: &str) -> Option<&Value> {
		match self {
			Resolved::Local(record) => record.get(field),
			Resolved::Virtual(instance) => instance.get(field),
		}
	}
}

impl PartialEq for Resolved {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Resolved::Local(a), Resolved::Local(b)) => a == b,
			(Resolved::Virtual(a), Resolved::Virtual(b)) => a == b,
			_ => false,
		}
	}
}
