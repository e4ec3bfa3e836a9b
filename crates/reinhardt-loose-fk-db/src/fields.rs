//! The loose foreign key field
//!
//! A [`LooseFkField`] does not own a column. It combines a foreign key field and
//! a URL field of the same model and is read and written through a
//! [`LooseFkDescriptor`](crate::descriptor::LooseFkDescriptor).

use crate::constraints::LooseFkConstraint;
use crate::errors::{LooseFkError, LooseFkResult};
use crate::loaders::Loader;
use crate::model::{FieldKind, FieldMeta, ModelMeta};
use reinhardt_loose_fk_conf::CheckMessage;
use std::fmt;
use std::sync::Arc;

/// Relation stored either as a local foreign key or as a remote URL
#[derive(Clone)]
pub struct LooseFkField {
	name: String,
	fk_field: String,
	url_field: String,
	nullable: bool,
	loader: Option<Arc<Loader>>,
}

impl LooseFkField {
	/// Declare a loose foreign key `name` over `fk_field` and `url_field`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_db::{FieldMeta, LooseFkField, ModelMeta};
	///
	/// let zaak = ModelMeta::new("Zaak", "testapp_zaak")
	///     .field(FieldMeta::foreign_key("_zaaktype", "ZaakType").null(true))
	///     .field(FieldMeta::url("extern_zaaktype").blank(true))
	///     .loose_fk(LooseFkField::new("zaaktype", "_zaaktype", "extern_zaaktype"));
	///
	/// assert_eq!(zaak.constraints().len(), 1);
	/// assert!(zaak.check().is_empty());
	/// ```
	pub fn new(
		name: impl Into<String>,
		fk_field: impl Into<String>,
		url_field: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			fk_field: fk_field.into(),
			url_field: url_field.into(),
			nullable: false,
			loader: None,
		}
	}

	/// Allow both columns to be empty at the same time
	pub fn nullable(mut self, nullable: bool) -> Self {
		self.nullable = nullable;
		self
	}

	/// Resolve remote URLs with `loader` instead of the default loader
	pub fn with_loader(mut self, loader: Arc<Loader>) -> Self {
		self.loader = Some(loader);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn fk_field(&self) -> &str {
		&self.fk_field
	}

	pub fn url_field(&self) -> &str {
		&self.url_field
	}

	pub fn is_nullable(&self) -> bool {
		self.nullable
	}

	pub fn loader(&self) -> Option<&Arc<Loader>> {
		self.loader.as_ref()
	}

	/// Register the field and its constraint on the model
	///
	/// Re-declaring a field whose constraint predicate is already present
	/// leaves the constraints untouched.
	pub(crate) fn contribute_to(self, meta: &mut ModelMeta) {
		let constraint = self.constraint(meta);
		if !meta.add_constraint(constraint) {
			tracing::debug!(
				model = meta.name(),
				field = %self.name,
				"loose fk constraint already present"
			);
		}
		meta.push_loose_field(self);
	}

	/// The CHECK constraint generated for this field on `meta`
	pub fn constraint(&self, meta: &ModelMeta) -> LooseFkConstraint {
		LooseFkConstraint::new(
			meta.table(),
			&self.fk_field,
			&self.url_field,
			self.fk_column(meta),
			self.url_column(meta),
			self.nullable,
		)
	}

	pub fn fk_column(&self, meta: &ModelMeta) -> String {
		meta.get_field(&self.fk_field)
			.map(FieldMeta::column)
			.unwrap_or_else(|| format!("{}_id", self.fk_field))
	}

	pub fn url_column(&self, meta: &ModelMeta) -> String {
		meta.get_field(&self.url_field)
			.map(FieldMeta::column)
			.unwrap_or_else(|| self.url_field.clone())
	}

	/// Name of the model the foreign key points to
	pub fn remote_model(&self, meta: &ModelMeta) -> LooseFkResult<String> {
		match meta.get_field(&self.fk_field).map(|f| &f.kind) {
			Some(FieldKind::ForeignKey { to }) => Ok(to.clone()),
			_ => Err(LooseFkError::UnknownField {
				model: meta.name().to_string(),
				field: self.fk_field.clone(),
			}),
		}
	}

	/// Maximum length of a stored URL
	pub fn max_length(&self, meta: &ModelMeta) -> Option<usize> {
		match meta.get_field(&self.url_field).map(|f| &f.kind) {
			Some(FieldKind::Url { max_length }) => Some(*max_length),
			_ => None,
		}
	}

	/// Validate the declaration against the model
	pub fn check(&self, meta: &ModelMeta) -> Vec<CheckMessage> {
		let obj = format!("{}.{}", meta.name(), self.name);
		let mut errors = Vec::new();

		if !matches!(
			meta.get_field(&self.fk_field).map(|f| &f.kind),
			Some(FieldKind::ForeignKey { .. })
		) {
			errors.push(
				CheckMessage::error(
					"The field passed to 'fk_field' should be a ForeignKey",
					"fk_or_url_field.E001",
				)
				.with_obj(obj.clone()),
			);
		}

		match meta.get_field(&self.url_field) {
			Some(field) if matches!(field.kind, FieldKind::Url { .. }) => {
				if field.null {
					errors.push(
						CheckMessage::error(
							format!("The URLField '{}' may not be nullable", self.url_field),
							"fk_or_url_field.E003",
						)
						.with_obj(obj),
					);
				}
			}
			_ => errors.push(
				CheckMessage::error(
					"The field passed to 'url_field' should be a URLField",
					"fk_or_url_field.E002",
				)
				.with_obj(obj),
			),
		}

		errors
	}
}

impl fmt::Debug for LooseFkField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LooseFkField")
			.field("name", &self.name)
			.field("fk_field", &self.fk_field)
			.field("url_field", &self.url_field)
			.field("nullable", &self.nullable)
			.field("loader", &self.loader.as_ref().map(|l| l.id()))
			.finish()
	}
}
