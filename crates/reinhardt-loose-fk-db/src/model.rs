//! Model metadata and loaded records
//!
//! The loose foreign key machinery works on a runtime description of entity
//! types ([`ModelMeta`]) and on rows loaded into memory ([`Record`]). Storage
//! itself is not handled here: callers load and save records with their own
//! database layer and hand them over with related rows already attached.

use crate::constraints::LooseFkConstraint;
use crate::errors::{LooseFkError, LooseFkResult};
use crate::fields::LooseFkField;
use dashmap::DashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use reinhardt_loose_fk_conf::CheckMessage;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Semantic type of a model field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
	/// Auto-created integer primary key
	AutoPk,
	Char { max_length: usize },
	Text,
	Integer,
	Float,
	Boolean,
	Url { max_length: usize },
	Json,
	/// Relation to a single row of the named model
	ForeignKey { to: String },
	/// Relation to several rows of the named model
	ManyToMany { to: String },
}

impl FieldKind {
	pub fn is_relation(&self) -> bool {
		matches!(self, FieldKind::ForeignKey { .. } | FieldKind::ManyToMany { .. })
	}

	/// Name of the related model, for relation fields
	pub fn related_model(&self) -> Option<&str> {
		match self {
			FieldKind::ForeignKey { to } | FieldKind::ManyToMany { to } => Some(to),
			_ => None,
		}
	}
}

/// A concrete field of a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
	pub name: String,
	pub kind: FieldKind,
	pub null: bool,
	pub blank: bool,
}

impl FieldMeta {
	pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
		Self {
			name: name.into(),
			kind,
			null: false,
			blank: false,
		}
	}

	pub fn auto(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::AutoPk)
	}

	pub fn char(name: impl Into<String>, max_length: usize) -> Self {
		Self::new(name, FieldKind::Char { max_length })
	}

	pub fn url(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Url { max_length: 200 })
	}

	pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
		Self::new(name, FieldKind::ForeignKey { to: to.into() })
	}

	pub fn many_to_many(name: impl Into<String>, to: impl Into<String>) -> Self {
		Self::new(name, FieldKind::ManyToMany { to: to.into() })
	}

	pub fn null(mut self, null: bool) -> Self {
		self.null = null;
		self
	}

	pub fn blank(mut self, blank: bool) -> Self {
		self.blank = blank;
		self
	}

	/// Database column backing the field
	pub fn column(&self) -> String {
		match self.kind {
			FieldKind::ForeignKey { .. } => format!("{}_id", self.name),
			_ => self.name.clone(),
		}
	}

	pub fn is_auto_created(&self) -> bool {
		matches!(self.kind, FieldKind::AutoPk)
	}

	/// Value a freshly created record holds for this field
	fn initial_value(&self) -> Value {
		match self.kind {
			FieldKind::Char { .. } | FieldKind::Text | FieldKind::Url { .. } if !self.null => {
				Value::Text(String::new())
			}
			_ => Value::Null,
		}
	}

	/// Convert a raw JSON value into this field's semantic type
	///
	/// Relation fields are returned as raw JSON, their handlers resolve them.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_db::{FieldMeta, FieldKind, Value};
	/// use serde_json::json;
	///
	/// let field = FieldMeta::new("count", FieldKind::Integer);
	/// assert_eq!(field.to_value(&json!("12")).unwrap(), Value::Int(12));
	/// assert!(field.to_value(&json!("twelve")).is_err());
	/// ```
	pub fn to_value(&self, raw: &JsonValue) -> LooseFkResult<Value> {
		if raw.is_null() {
			return Ok(Value::Null);
		}

		let invalid = |reason: String| LooseFkError::Coercion {
			field: self.name.clone(),
			reason,
		};

		match &self.kind {
			FieldKind::Char { .. } | FieldKind::Text | FieldKind::Url { .. } => match raw {
				JsonValue::String(s) => Ok(Value::Text(s.clone())),
				JsonValue::Number(n) => Ok(Value::Text(n.to_string())),
				JsonValue::Bool(b) => Ok(Value::Text(b.to_string())),
				other => Err(invalid(format!("expected a string, got {}", other))),
			},
			FieldKind::AutoPk | FieldKind::Integer => match raw {
				JsonValue::Number(n) => n
					.as_i64()
					.map(Value::Int)
					.ok_or_else(|| invalid(format!("'{}' is not an integer", n))),
				JsonValue::String(s) => s
					.trim()
					.parse::<i64>()
					.map(Value::Int)
					.map_err(|_| invalid(format!("'{}' is not an integer", s))),
				other => Err(invalid(format!("expected an integer, got {}", other))),
			},
			FieldKind::Float => match raw {
				JsonValue::Number(n) => n
					.as_f64()
					.map(Value::Float)
					.ok_or_else(|| invalid(format!("'{}' is not a number", n))),
				JsonValue::String(s) => s
					.trim()
					.parse::<f64>()
					.map(Value::Float)
					.map_err(|_| invalid(format!("'{}' is not a number", s))),
				other => Err(invalid(format!("expected a number, got {}", other))),
			},
			FieldKind::Boolean => match raw {
				JsonValue::Bool(b) => Ok(Value::Bool(*b)),
				JsonValue::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
				JsonValue::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
				JsonValue::String(s) => match s.to_lowercase().as_str() {
					"true" | "t" | "1" => Ok(Value::Bool(true)),
					"false" | "f" | "0" => Ok(Value::Bool(false)),
					_ => Err(invalid(format!("'{}' is not a boolean", s))),
				},
				other => Err(invalid(format!("expected a boolean, got {}", other))),
			},
			FieldKind::Json | FieldKind::ForeignKey { .. } | FieldKind::ManyToMany { .. } => {
				Ok(Value::Json(raw.clone()))
			}
		}
	}
}

/// Runtime description of an entity type
#[derive(Debug, Clone)]
pub struct ModelMeta {
	name: String,
	table: String,
	pk: String,
	fields: Vec<FieldMeta>,
	loose_fields: Vec<LooseFkField>,
	constraints: Vec<LooseFkConstraint>,
}

impl ModelMeta {
	/// Describe a model stored in `table`, with an auto-created `id` primary key
	pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			table: table.into(),
			pk: "id".to_string(),
			fields: vec![FieldMeta::auto("id")],
			loose_fields: Vec::new(),
			constraints: Vec::new(),
		}
	}

	/// Use another field as primary key
	pub fn with_pk(mut self, field: FieldMeta) -> Self {
		self.fields.retain(|f| !f.is_auto_created());
		self.pk = field.name.clone();
		self.fields.insert(0, field);
		self
	}

	pub fn field(mut self, field: FieldMeta) -> Self {
		self.fields.retain(|f| f.name != field.name);
		self.fields.push(field);
		self
	}

	/// Declare a loose foreign key over two previously declared fields
	///
	/// The field's CHECK constraint is registered on the model.
	pub fn loose_fk(mut self, field: LooseFkField) -> Self {
		field.contribute_to(&mut self);
		self
	}

	/// Add a constraint unless one with the same predicate already exists
	///
	/// Returns `false` when the constraint was already present.
	pub fn add_constraint(&mut self, constraint: LooseFkConstraint) -> bool {
		if self
			.constraints
			.iter()
			.any(|existing| existing.check_sql() == constraint.check_sql())
		{
			return false;
		}
		self.constraints.push(constraint);
		true
	}

	pub(crate) fn push_loose_field(&mut self, field: LooseFkField) {
		self.loose_fields.retain(|f| f.name() != field.name());
		self.loose_fields.push(field);
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn pk_name(&self) -> &str {
		&self.pk
	}

	pub fn fields(&self) -> &[FieldMeta] {
		&self.fields
	}

	pub fn get_field(&self, name: &str) -> Option<&FieldMeta> {
		self.fields.iter().find(|f| f.name == name)
	}

	pub fn loose_fields(&self) -> &[LooseFkField] {
		&self.loose_fields
	}

	pub fn get_loose_field(&self, name: &str) -> Option<&LooseFkField> {
		self.loose_fields.iter().find(|f| f.name() == name)
	}

	pub fn constraints(&self) -> &[LooseFkConstraint] {
		&self.constraints
	}

	/// Run the system checks of every loose field
	pub fn check(&self) -> Vec<CheckMessage> {
		self.loose_fields
			.iter()
			.flat_map(|field| field.check(self))
			.collect()
	}
}

/// A field value of a loaded record
#[derive(Debug, Clone)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
	Json(JsonValue),
	/// A loaded related row, held by a foreign key field
	Related(Arc<Record>),
}

impl Value {
	/// Name of the variant, used in type errors
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Text(_) => "str",
			Value::Json(_) => "json",
			Value::Related(_) => "record",
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_record(&self) -> Option<&Arc<Record>> {
		match self {
			Value::Related(record) => Some(record),
			_ => None,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			(Value::Text(a), Value::Text(b)) => a == b,
			(Value::Json(a), Value::Json(b)) => a == b,
			(Value::Related(a), Value::Related(b)) => a == b,
			_ => false,
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Text(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Int(i64::from(value))
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<Arc<Record>> for Value {
	fn from(value: Arc<Record>) -> Self {
		Value::Related(value)
	}
}

/// A row loaded into memory
#[derive(Clone)]
pub struct Record {
	meta: Arc<ModelMeta>,
	values: IndexMap<String, Value>,
}

impl Record {
	/// Create an unsaved record with every field at its initial value
	pub fn new(meta: Arc<ModelMeta>) -> Self {
		let values = meta
			.fields()
			.iter()
			.map(|field| (field.name.clone(), field.initial_value()))
			.collect();
		Self { meta, values }
	}

	/// Builder style [`Record::set`]
	///
	/// # Examples
	///
	/// ```
	/// use std::sync::Arc;
	/// use reinhardt_loose_fk_db::{FieldMeta, ModelMeta, Record, Value};
	///
	/// let meta = Arc::new(ModelMeta::new("ZaakType", "testapp_zaaktype").field(FieldMeta::char("name", 50)));
	/// let record = Record::new(meta).with("id", 1).unwrap().with("name", "aanvraag").unwrap();
	/// assert_eq!(record.pk(), Some(&Value::Int(1)));
	/// ```
	pub fn with(mut self, field: &str, value: impl Into<Value>) -> LooseFkResult<Self> {
		self.set(field, value)?;
		Ok(self)
	}

	pub fn model(&self) -> &Arc<ModelMeta> {
		&self.meta
	}

	pub fn get(&self, field: &str) -> Option<&Value> {
		self.values.get(field)
	}

	/// Set a concrete field
	pub fn set(&mut self, field: &str, value: impl Into<Value>) -> LooseFkResult<()> {
		match self.values.get_mut(field) {
			Some(slot) => {
				*slot = value.into();
				Ok(())
			}
			None => Err(LooseFkError::UnknownField {
				model: self.meta.name().to_string(),
				field: field.to_string(),
			}),
		}
	}

	/// Primary key, `None` while the record is unsaved
	pub fn pk(&self) -> Option<&Value> {
		self.values
			.get(self.meta.pk_name())
			.filter(|value| !value.is_null())
	}

	/// Value as stored in the field's column: related rows collapse to their key
	pub fn column_value(&self, field: &str) -> Option<Value> {
		match self.values.get(field)? {
			Value::Related(record) => Some(record.pk().cloned().unwrap_or(Value::Null)),
			other => Some(other.clone()),
		}
	}

	pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Evaluate every model constraint against the in-memory values
	pub fn validate_constraints(&self) -> LooseFkResult<()> {
		self.meta
			.constraints()
			.iter()
			.try_for_each(|constraint| constraint.validate(self))
	}
}

impl fmt::Debug for Record {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Record")
			.field("model", &self.meta.name())
			.field("values", &self.values)
			.finish()
	}
}

impl PartialEq for Record {
	/// Saved records are equal when model and primary key match; unsaved
	/// records are only equal to themselves.
	fn eq(&self, other: &Self) -> bool {
		if std::ptr::eq(self, other) {
			return true;
		}
		match (self.pk(), other.pk()) {
			(Some(a), Some(b)) => self.meta.name() == other.meta.name() && a == b,
			_ => false,
		}
	}
}

static MODELS: Lazy<DashMap<String, Arc<ModelMeta>>> = Lazy::new(DashMap::new);

/// Register a model so relations can refer to it by name
///
/// Registering a name twice keeps the first registration.
pub fn register_model(meta: ModelMeta) -> Arc<ModelMeta> {
	MODELS
		.entry(meta.name().to_string())
		.or_insert_with(|| {
			tracing::debug!(model = meta.name(), table = meta.table(), "registered model");
			Arc::new(meta)
		})
		.value()
		.clone()
}

/// Look up a registered model
pub fn get_model(name: &str) -> LooseFkResult<Arc<ModelMeta>> {
	MODELS
		.get(name)
		.map(|entry| Arc::clone(entry.value()))
		.ok_or_else(|| LooseFkError::UnknownModel(name.to_string()))
}
