//! Reading and writing loose foreign keys
//!
//! [`LooseFkDescriptor`] is the accessor for one [`LooseFkField`] of a model.
//! Reads return a [`LooseValue`]: the local row, the unresolved URL, the
//! resolved [`VirtualInstance`], or nothing. Writes route the value into the
//! right column and clear the other one.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use reinhardt_loose_fk_db::{FieldMeta, LooseFkDescriptor, LooseFkField, LooseValue, ModelMeta, Record};
//!
//! let zaak = Arc::new(
//!     ModelMeta::new("DocZaak", "doc_zaak")
//!         .field(FieldMeta::foreign_key("_zaaktype", "DocZaakType").null(true))
//!         .field(FieldMeta::url("extern_zaaktype").blank(true))
//!         .loose_fk(LooseFkField::new("zaaktype", "_zaaktype", "extern_zaaktype")),
//! );
//! let zaaktype = LooseFkDescriptor::for_field(&zaak, "zaaktype").unwrap();
//!
//! let mut record = Record::new(zaak.clone());
//! zaaktype.set(&mut record, "https://example.com/zaaktypen/1").unwrap();
//! assert_eq!(
//!     zaaktype.raw(&record).unwrap(),
//!     LooseValue::Url("https://example.com/zaaktypen/1".to_string())
//! );
//! assert!(record.validate_constraints().is_ok());
//! ```

use crate::errors::{LooseFkError, LooseFkResult};
use crate::fields::LooseFkField;
use crate::loaders::{Loader, default_loader};
use crate::model::{ModelMeta, Record, Value, get_model};
use crate::query_list::is_url;
use crate::virtual_models::{Resolved, VirtualInstance};
use std::sync::Arc;

/// Value of a loose foreign key
#[derive(Debug, Clone)]
pub enum LooseValue {
	/// A row of the local database
	Local(Arc<Record>),
	/// A remote URL that has not been resolved
	Url(String),
	/// A resolved remote resource
	Virtual(VirtualInstance),
	/// Neither column is filled; only valid for nullable fields
	Absent,
}

impl LooseValue {
	/// URL of a remote value, resolved or not
	pub fn url(&self) -> Option<&str> {
		match self {
			LooseValue::Url(url) => Some(url),
			LooseValue::Virtual(instance) => instance.url(),
			LooseValue::Local(_) | LooseValue::Absent => None,
		}
	}

	pub fn as_record(&self) -> Option<&Arc<Record>> {
		match self {
			LooseValue::Local(record) => Some(record),
			_ => None,
		}
	}

	pub fn as_virtual(&self) -> Option<&VirtualInstance> {
		match self {
			LooseValue::Virtual(instance) => Some(instance),
			_ => None,
		}
	}

	pub fn is_absent(&self) -> bool {
		matches!(self, LooseValue::Absent)
	}
}

/// Remote values compare by URL; a local row never equals a remote value
impl PartialEq for LooseValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(LooseValue::Local(a), LooseValue::Local(b)) => a == b,
			(LooseValue::Absent, LooseValue::Absent) => true,
			(LooseValue::Virtual(a), LooseValue::Virtual(b)) => a == b,
			(LooseValue::Url(_) | LooseValue::Virtual(_), LooseValue::Url(_) | LooseValue::Virtual(_)) => {
				match (self.url(), other.url()) {
					(Some(a), Some(b)) => a == b,
					_ => false,
				}
			}
			_ => false,
		}
	}
}

impl PartialEq<str> for LooseValue {
	fn eq(&self, other: &str) -> bool {
		self.url() == Some(other)
	}
}

impl PartialEq<&str> for LooseValue {
	fn eq(&self, other: &&str) -> bool {
		self.url() == Some(*other)
	}
}

impl From<Arc<Record>> for LooseValue {
	fn from(value: Arc<Record>) -> Self {
		LooseValue::Local(value)
	}
}

impl From<Record> for LooseValue {
	fn from(value: Record) -> Self {
		LooseValue::Local(Arc::new(value))
	}
}

impl From<&str> for LooseValue {
	fn from(value: &str) -> Self {
		LooseValue::Url(value.to_string())
	}
}

impl From<String> for LooseValue {
	fn from(value: String) -> Self {
		LooseValue::Url(value)
	}
}

impl From<VirtualInstance> for LooseValue {
	fn from(value: VirtualInstance) -> Self {
		LooseValue::Virtual(value)
	}
}

impl From<Resolved> for LooseValue {
	fn from(value: Resolved) -> Self {
		match value {
			Resolved::Local(record) => LooseValue::Local(record),
			Resolved::Virtual(instance) => LooseValue::Virtual(instance),
		}
	}
}

impl<T: Into<LooseValue>> From<Option<T>> for LooseValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(LooseValue::Absent, Into::into)
	}
}

/// Accessor for a loose foreign key of a model
#[derive(Debug, Clone)]
pub struct LooseFkDescriptor {
	model: Arc<ModelMeta>,
	field: LooseFkField,
	remote_model: String,
	loader: Option<Arc<Loader>>,
}

impl LooseFkDescriptor {
	/// Accessor for the loose field `name` of `model`
	pub fn for_field(model: &Arc<ModelMeta>, name: &str) -> LooseFkResult<Self> {
		let field = model
			.get_loose_field(name)
			.cloned()
			.ok_or_else(|| LooseFkError::UnknownField {
				model: model.name().to_string(),
				field: name.to_string(),
			})?;
		let remote_model = field.remote_model(model)?;
		let loader = field.loader().cloned();
		Ok(Self {
			model: Arc::clone(model),
			field,
			remote_model,
			loader,
		})
	}

	/// Resolve URLs with `loader`, overriding the field's loader
	pub fn with_loader(mut self, loader: Arc<Loader>) -> Self {
		self.loader = Some(loader);
		self
	}

	pub fn field(&self) -> &LooseFkField {
		&self.field
	}

	pub fn remote_model(&self) -> &str {
		&self.remote_model
	}

	fn loader(&self) -> LooseFkResult<Arc<Loader>> {
		match &self.loader {
			Some(loader) => Ok(Arc::clone(loader)),
			None => default_loader(),
		}
	}

	fn check_model(&self, record: &Record) -> LooseFkResult<()> {
		if record.model().name() == self.model.name() {
			Ok(())
		} else {
			Err(LooseFkError::TypeMismatch(format!(
				"{} is not a field of {}",
				self.field.name(),
				record.model().name()
			)))
		}
	}

	/// Read the stored value without any I/O
	///
	/// # Errors
	///
	/// [`LooseFkError::InvariantViolation`] when both columns are filled, or
	/// when neither is and the field is not nullable.
	pub fn raw(&self, record: &Record) -> LooseFkResult<LooseValue> {
		self.check_model(record)?;

		let fk = record.get(self.field.fk_field()).filter(|v| !v.is_null());
		let url = match record.get(self.field.url_field()) {
			Some(Value::Text(url)) if !url.is_empty() => Some(url.as_str()),
			_ => None,
		};

		match (fk, url) {
			(Some(_), Some(_)) => Err(LooseFkError::InvariantViolation(format!(
				"{}: both '{}' and '{}' are set",
				self.field.name(),
				self.field.fk_field(),
				self.field.url_field()
			))),
			(Some(Value::Related(related)), None) => Ok(LooseValue::Local(Arc::clone(related))),
			(Some(other), None) => Err(LooseFkError::TypeMismatch(format!(
				"{}: expected a loaded related record, got {}",
				self.field.fk_field(),
				other.type_name()
			))),
			(None, Some(url)) => Ok(LooseValue::Url(url.to_string())),
			(None, None) if self.field.is_nullable() => Ok(LooseValue::Absent),
			(None, None) => Err(LooseFkError::InvariantViolation(format!(
				"{}: neither '{}' nor '{}' is set",
				self.field.name(),
				self.field.fk_field(),
				self.field.url_field()
			))),
		}
	}

	/// Read the value, resolving a stored URL
	///
	/// Local URLs resolve to the row they route to, remote URLs are fetched
	/// and returned as a [`VirtualInstance`]. `host` is the host of the
	/// current request, used to classify the URL.
	pub async fn get(&self, record: &Record, host: Option<&str>) -> LooseFkResult<LooseValue> {
		match self.raw(record)? {
			LooseValue::Url(url) => {
				let remote = get_model(&self.remote_model)?;
				let resolved = self.loader()?.resolve(&url, &remote, host).await?;
				tracing::debug!(
					field = self.field.name(),
					url = %url,
					local = resolved.is_local(),
					"resolved loose fk"
				);
				Ok(resolved.into())
			}
			value => Ok(value),
		}
	}

	/// Write `value`, clearing the other column
	///
	/// # Errors
	///
	/// [`LooseFkError::InvalidUrl`] for a string that is not an http(s) URL or
	/// a virtual instance without URL, [`LooseFkError::InvariantViolation`]
	/// for [`LooseValue::Absent`] on a non-nullable field.
	pub fn set(&self, record: &mut Record, value: impl Into<LooseValue>) -> LooseFkResult<()> {
		self.check_model(record)?;

		match value.into() {
			LooseValue::Local(related) => {
				self.check_related(&related)?;
				record.set(self.field.fk_field(), related)?;
				record.set(self.field.url_field(), "")
			}
			LooseValue::Url(url) => self.set_url(record, &url),
			LooseValue::Virtual(instance) => {
				let url = instance.url().ok_or_else(|| {
					LooseFkError::InvalidUrl(format!(
						"{} instance without url",
						instance.virtual_type().name()
					))
				})?;
				self.set_url(record, url)
			}
			LooseValue::Absent => {
				if !self.field.is_nullable() {
					return Err(LooseFkError::InvariantViolation(format!(
						"{} may not be empty",
						self.field.name()
					)));
				}
				record.set(self.field.fk_field(), Value::Null)?;
				record.set(self.field.url_field(), "")
			}
		}
	}

	fn check_related(&self, related: &Record) -> LooseFkResult<()> {
		if related.model().name() != self.remote_model {
			return Err(LooseFkError::TypeMismatch(format!(
				"{} expects a {} instance, got {}",
				self.field.name(),
				self.remote_model,
				related.model().name()
			)));
		}
		if related.pk().is_none() {
			return Err(LooseFkError::TypeMismatch(format!(
				"unsaved {} instance cannot be assigned to {}",
				related.model().name(),
				self.field.name()
			)));
		}
		Ok(())
	}

	fn set_url(&self, record: &mut Record, url: &str) -> LooseFkResult<()> {
		if !is_url(url) {
			return Err(LooseFkError::InvalidUrl(url.to_string()));
		}
		if let Some(max_length) = self.field.max_length(&self.model)
			&& url.chars().count() > max_length
		{
			return Err(LooseFkError::InvalidUrl(format!(
				"{} is longer than {} characters",
				url, max_length
			)));
		}
		record.set(self.field.url_field(), url)?;
		record.set(self.field.fk_field(), Value::Null)
	}

	/// Write a dynamically typed value
	///
	/// Strings are URLs, related records are local rows and null clears the
	/// field. Any other value is a [`LooseFkError::TypeMismatch`].
	pub fn set_value(&self, record: &mut Record, value: Value) -> LooseFkResult<()> {
		match value {
			Value::Text(url) => self.set(record, url),
			Value::Related(related) => self.set(record, related),
			Value::Null => self.set(record, LooseValue::Absent),
			other => Err(LooseFkError::TypeMismatch(format!(
				"{} accepts a record or a URL, not {}",
				self.field.name(),
				other.type_name()
			))),
		}
	}

	/// Serialized form of the value, always a URL
	///
	/// Remote values return the stored URL without fetching it; local rows
	/// are turned into their detail URL by `reverse`.
	pub fn to_representation<F>(&self, record: &Record, reverse: F) -> LooseFkResult<Option<String>>
	where
		F: FnOnce(&Record) -> Option<String>,
	{
		match self.raw(record)? {
			LooseValue::Local(related) => Ok(reverse(&related)),
			LooseValue::Url(url) => Ok(Some(url)),
			LooseValue::Virtual(instance) => Ok(instance.url().map(str::to_string)),
			LooseValue::Absent => Ok(None),
		}
	}
}
