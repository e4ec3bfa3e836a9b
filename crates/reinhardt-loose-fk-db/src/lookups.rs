//! Query translation for loose foreign keys
//!
//! A loose foreign key is stored in two columns, so a predicate over the field
//! has to be split: URLs are matched against the URL column, local rows and
//! primary keys against the foreign key column. The resulting
//! [`SqlFragment`]s use `?` placeholders and can be executed directly or
//! embedded into a SeaQuery statement with [`SqlFragment::into_expr`].

use crate::constraints::quote_ident;
use crate::descriptor::LooseValue;
use crate::errors::{LooseFkError, LooseFkResult};
use crate::loaders::{Loader, default_loader};
use crate::model::{ModelMeta, Record, Value};
use crate::virtual_models::{Resolved, VirtualInstance};
use sea_query::{Expr, SimpleExpr};
use std::fmt;
use std::sync::Arc;

/// A bound parameter of a fragment
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Text(String),
}

impl From<SqlParam> for sea_query::Value {
	fn from(param: SqlParam) -> Self {
		match param {
			SqlParam::Null => sea_query::Value::Int(None),
			SqlParam::Bool(b) => b.into(),
			SqlParam::Int(i) => i.into(),
			SqlParam::Float(f) => f.into(),
			SqlParam::Text(s) => s.into(),
		}
	}
}

impl fmt::Display for SqlParam {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SqlParam::Null => write!(f, "NULL"),
			SqlParam::Bool(b) => write!(f, "{}", b),
			SqlParam::Int(i) => write!(f, "{}", i),
			SqlParam::Float(v) => write!(f, "{}", v),
			SqlParam::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
		}
	}
}

/// SQL text with positional `?` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
	sql: String,
	params: Vec<SqlParam>,
}

impl SqlFragment {
	pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
		Self {
			sql: sql.into(),
			params,
		}
	}

	pub fn sql(&self) -> &str {
		&self.sql
	}

	pub fn params(&self) -> &[SqlParam] {
		&self.params
	}

	pub fn into_parts(self) -> (String, Vec<SqlParam>) {
		(self.sql, self.params)
	}

	/// Wrap the fragment in a custom SeaQuery expression
	pub fn into_expr(self) -> SimpleExpr {
		Expr::cust_with_values(self.sql, self.params)
	}
}

/// Result of a membership translation
#[derive(Debug, Clone, PartialEq)]
pub enum LookupSql {
	Sql(SqlFragment),
	/// Nothing can match: the query returns no rows without being executed
	Empty,
}

impl LookupSql {
	pub fn is_empty(&self) -> bool {
		matches!(self, LookupSql::Empty)
	}

	pub fn fragment(&self) -> Option<&SqlFragment> {
		match self {
			LookupSql::Sql(fragment) => Some(fragment),
			LookupSql::Empty => None,
		}
	}

	/// SeaQuery expression; the empty signal becomes an always-false predicate
	pub fn into_expr(self) -> SimpleExpr {
		match self {
			LookupSql::Sql(fragment) => fragment.into_expr(),
			LookupSql::Empty => Expr::cust("1 = 0"),
		}
	}
}

/// Right hand side of a lookup
#[derive(Debug, Clone)]
pub enum LookupValue {
	Local(Arc<Record>),
	Virtual(VirtualInstance),
	Raw(Value),
	/// A query selecting primary keys of the related model
	Subquery(SqlFragment),
}

impl From<Arc<Record>> for LookupValue {
	fn from(value: Arc<Record>) -> Self {
		LookupValue::Local(value)
	}
}

impl From<VirtualInstance> for LookupValue {
	fn from(value: VirtualInstance) -> Self {
		LookupValue::Virtual(value)
	}
}

impl From<Value> for LookupValue {
	fn from(value: Value) -> Self {
		LookupValue::Raw(value)
	}
}

impl From<&str> for LookupValue {
	fn from(value: &str) -> Self {
		LookupValue::Raw(Value::Text(value.to_string()))
	}
}

impl From<String> for LookupValue {
	fn from(value: String) -> Self {
		LookupValue::Raw(Value::Text(value))
	}
}

impl From<i64> for LookupValue {
	fn from(value: i64) -> Self {
		LookupValue::Raw(Value::Int(value))
	}
}

impl From<i32> for LookupValue {
	fn from(value: i32) -> Self {
		LookupValue::Raw(Value::Int(i64::from(value)))
	}
}

impl From<SqlFragment> for LookupValue {
	fn from(value: SqlFragment) -> Self {
		LookupValue::Subquery(value)
	}
}

impl From<Resolved> for LookupValue {
	fn from(value: Resolved) -> Self {
		match value {
			Resolved::Local(record) => LookupValue::Local(record),
			Resolved::Virtual(instance) => LookupValue::Virtual(instance),
		}
	}
}

impl From<LooseValue> for LookupValue {
	fn from(value: LooseValue) -> Self {
		match value {
			LooseValue::Local(record) => LookupValue::Local(record),
			LooseValue::Url(url) => LookupValue::Raw(Value::Text(url)),
			LooseValue::Virtual(instance) => LookupValue::Virtual(instance),
			LooseValue::Absent => LookupValue::Raw(Value::Null),
		}
	}
}

/// A right hand side reduced to what is compared against a column
#[derive(Debug, Clone, PartialEq)]
enum Normalized {
	Url(String),
	Key(SqlParam),
	Null,
	Subquery(SqlFragment),
}

fn key_param(value: &Value) -> LooseFkResult<Normalized> {
	match value {
		Value::Null => Ok(Normalized::Null),
		Value::Bool(b) => Ok(Normalized::Key(SqlParam::Bool(*b))),
		Value::Int(i) => Ok(Normalized::Key(SqlParam::Int(*i))),
		Value::Float(f) => Ok(Normalized::Key(SqlParam::Float(*f))),
		Value::Text(s) => Ok(Normalized::Key(SqlParam::Text(s.clone()))),
		Value::Related(record) => record_key(record),
		Value::Json(_) => Err(LooseFkError::TypeMismatch(
			"json values cannot be compared to a loose fk".to_string(),
		)),
	}
}

/// Primary key of a local row; unsaved rows cannot be compared
fn record_key(record: &Record) -> LooseFkResult<Normalized> {
	match record.pk() {
		Some(Value::Int(i)) => Ok(Normalized::Key(SqlParam::Int(*i))),
		Some(Value::Text(s)) => Ok(Normalized::Key(SqlParam::Text(s.clone()))),
		Some(Value::Float(f)) => Ok(Normalized::Key(SqlParam::Float(*f))),
		Some(Value::Bool(b)) => Ok(Normalized::Key(SqlParam::Bool(*b))),
		Some(other) => Err(LooseFkError::TypeMismatch(format!(
			"{} primary key of type {} cannot be compared to a loose fk",
			record.model().name(),
			other.type_name()
		))),
		None => Err(LooseFkError::TypeMismatch(format!(
			"unsaved {} instance cannot be used in a loose fk lookup",
			record.model().name()
		))),
	}
}

/// Virtual instances become their URL, local rows their primary key; bare
/// strings are URLs, anything else a key
fn normalize(value: LookupValue) -> LooseFkResult<Normalized> {
	match value {
		LookupValue::Local(record) => record_key(&record),
		LookupValue::Virtual(instance) => instance
			.url()
			.map(|url| Normalized::Url(url.to_string()))
			.ok_or_else(|| {
				LooseFkError::InvalidUrl(format!(
					"{} instance without url",
					instance.virtual_type().name()
				))
			}),
		LookupValue::Raw(Value::Text(url)) => Ok(Normalized::Url(url)),
		LookupValue::Raw(value) => key_param(&value),
		LookupValue::Subquery(fragment) => Ok(Normalized::Subquery(fragment)),
	}
}

/// Lookups over the two columns of a loose foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LooseFkLookup {
	table: String,
	fk_column: String,
	url_column: String,
}

impl LooseFkLookup {
	pub fn new(
		table: impl Into<String>,
		fk_column: impl Into<String>,
		url_column: impl Into<String>,
	) -> Self {
		Self {
			table: table.into(),
			fk_column: fk_column.into(),
			url_column: url_column.into(),
		}
	}

	/// Lookup for the loose field `name` of `model`
	pub fn for_field(model: &ModelMeta, name: &str) -> LooseFkResult<Self> {
		let field = model
			.get_loose_field(name)
			.ok_or_else(|| LooseFkError::UnknownField {
				model: model.name().to_string(),
				field: name.to_string(),
			})?;
		Ok(Self::new(
			model.table(),
			field.fk_column(model),
			field.url_column(model),
		))
	}

	fn fk_col(&self) -> String {
		format!("{}.{}", quote_ident(&self.table), quote_ident(&self.fk_column))
	}

	fn url_col(&self) -> String {
		format!("{}.{}", quote_ident(&self.table), quote_ident(&self.url_column))
	}

	/// Translate `field = rhs`
	///
	/// A null right hand side matches rows where neither column is filled.
	/// Unsaved local rows are rejected with [`LooseFkError::TypeMismatch`].
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_db::lookups::{LooseFkLookup, SqlParam};
	///
	/// let lookup = LooseFkLookup::new("testapp_zaak", "_zaaktype_id", "extern_zaaktype");
	///
	/// let remote = lookup.exact("https://example.com/zaaktypen/1").unwrap();
	/// assert_eq!(remote.sql(), r#""testapp_zaak"."extern_zaaktype" = ?"#);
	///
	/// let local = lookup.exact(1).unwrap();
	/// assert_eq!(local.sql(), r#""testapp_zaak"."_zaaktype_id" = ?"#);
	/// assert_eq!(local.params(), &[SqlParam::Int(1)]);
	/// ```
	pub fn exact(&self, rhs: impl Into<LookupValue>) -> LooseFkResult<SqlFragment> {
		Ok(match normalize(rhs.into())? {
			Normalized::Url(url) => {
				SqlFragment::new(format!("{} = ?", self.url_col()), vec![SqlParam::Text(url)])
			}
			Normalized::Key(key) => SqlFragment::new(format!("{} = ?", self.fk_col()), vec![key]),
			Normalized::Null => SqlFragment::new(
				format!("({} IS NULL AND {} = '')", self.fk_col(), self.url_col()),
				Vec::new(),
			),
			Normalized::Subquery(sub) => {
				let (sql, params) = sub.into_parts();
				SqlFragment::new(format!("{} = ({})", self.fk_col(), sql), params)
			}
		})
	}

	/// Translate `field IN (values...)`
	///
	/// URLs and keys are matched against their own column and the two
	/// predicates are OR-ed, URL parameters first. Nulls and duplicates are
	/// dropped; when nothing remains the result is [`LookupSql::Empty`].
	/// Unsaved local rows are rejected like in [`LooseFkLookup::exact`].
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_db::lookups::{LookupSql, LookupValue, LooseFkLookup};
	///
	/// let lookup = LooseFkLookup::new("testapp_zaak", "_zaaktype_id", "extern_zaaktype");
	///
	/// let both = lookup
	///     .is_in([LookupValue::from("https://example.com/zaaktypen/1"), LookupValue::from(2)])
	///     .unwrap();
	/// assert_eq!(
	///     both.fragment().unwrap().sql(),
	///     r#"("testapp_zaak"."extern_zaaktype" IN (?) OR "testapp_zaak"."_zaaktype_id" IN (?))"#
	/// );
	///
	/// assert_eq!(lookup.is_in(Vec::<LookupValue>::new()).unwrap(), LookupSql::Empty);
	/// ```
	pub fn is_in<I, V>(&self, values: I) -> LooseFkResult<LookupSql>
	where
		I: IntoIterator<Item = V>,
		V: Into<LookupValue>,
	{
		let mut urls: Vec<SqlParam> = Vec::new();
		let mut keys: Vec<SqlParam> = Vec::new();

		for value in values {
			match normalize(value.into())? {
				Normalized::Url(url) => {
					let param = SqlParam::Text(url);
					if !urls.contains(&param) {
						urls.push(param);
					}
				}
				Normalized::Key(key) => {
					if !keys.contains(&key) {
						keys.push(key);
					}
				}
				Normalized::Null => {}
				Normalized::Subquery(_) => {
					return Err(LooseFkError::TypeMismatch(
						"a subquery cannot be part of a value list".to_string(),
					));
				}
			}
		}

		let url_sql = (!urls.is_empty()).then(|| in_clause(&self.url_col(), urls.len()));
		let fk_sql = (!keys.is_empty()).then(|| in_clause(&self.fk_col(), keys.len()));

		Ok(match (url_sql, fk_sql) {
			(None, None) => LookupSql::Empty,
			(Some(url_sql), None) => LookupSql::Sql(SqlFragment::new(url_sql, urls)),
			(None, Some(fk_sql)) => LookupSql::Sql(SqlFragment::new(fk_sql, keys)),
			(Some(url_sql), Some(fk_sql)) => {
				urls.extend(keys);
				LookupSql::Sql(SqlFragment::new(format!("({} OR {})", url_sql, fk_sql), urls))
			}
		})
	}

	/// Translate `field IN (subquery)`; a subquery only yields local keys
	pub fn in_subquery(&self, subquery: SqlFragment) -> SqlFragment {
		let (sql, params) = subquery.into_parts();
		SqlFragment::new(format!("{} IN ({})", self.fk_col(), sql), params)
	}
}

fn in_clause(column: &str, count: usize) -> String {
	let placeholders = vec!["?"; count].join(", ");
	format!("{} IN ({})", column, placeholders)
}

/// Filter values coming in as URLs, e.g. from a query string
///
/// Local URLs are resolved to their row so that they match the foreign key
/// column; all other URLs are matched against the URL column.
#[derive(Debug, Clone)]
pub struct LooseFkFilter {
	lookup: LooseFkLookup,
	loader: Arc<Loader>,
}

impl LooseFkFilter {
	/// Filter on the loose field `name` of `model`, with the field's loader
	/// or the default one
	pub fn for_field(model: &Arc<ModelMeta>, name: &str) -> LooseFkResult<Self> {
		let lookup = LooseFkLookup::for_field(model, name)?;
		let loader = match model.get_loose_field(name).and_then(|f| f.loader()) {
			Some(loader) => Arc::clone(loader),
			None => default_loader()?,
		};
		Ok(Self { lookup, loader })
	}

	pub fn new(lookup: LooseFkLookup, loader: Arc<Loader>) -> Self {
		Self { lookup, loader }
	}

	pub fn lookup(&self) -> &LooseFkLookup {
		&self.lookup
	}

	/// Resolve local URLs to rows, keep remote ones as URLs
	pub async fn values<S: AsRef<str>>(
		&self,
		host: Option<&str>,
		urls: &[S],
	) -> LooseFkResult<Vec<LookupValue>> {
		let mut values = Vec::with_capacity(urls.len());
		for url in urls {
			let url = url.as_ref();
			if self.loader.is_local_url(url, host) {
				let record = self.loader.load_local(url).await?;
				tracing::debug!(url, "filtering on local object");
				values.push(LookupValue::Local(record));
			} else {
				values.push(LookupValue::from(url));
			}
		}
		Ok(values)
	}

	pub async fn filter_in<S: AsRef<str>>(
		&self,
		host: Option<&str>,
		urls: &[S],
	) -> LooseFkResult<LookupSql> {
		let values = self.values(host, urls).await?;
		self.lookup.is_in(values)
	}

	pub async fn filter_exact(&self, host: Option<&str>, url: &str) -> LooseFkResult<SqlFragment> {
		let mut values = self.values(host, std::slice::from_ref(&url)).await?;
		match values.pop() {
			Some(value) => self.lookup.exact(value),
			None => Err(LooseFkError::InvalidUrl(url.to_string())),
		}
	}
}
