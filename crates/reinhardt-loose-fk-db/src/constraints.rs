/// CHECK constraint keeping the two columns of a loose foreign key exclusive
use crate::errors::{LooseFkError, LooseFkResult};
use crate::model::{Record, Value};
use serde::{Deserialize, Serialize};

/// Mutual exclusivity constraint of a loose foreign key
///
/// Exactly one of the foreign key column and the URL column must be filled. A
/// nullable loose foreign key additionally allows both to be empty, but never
/// both to be filled. An empty URL is the empty string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LooseFkConstraint {
	name: String,
	fk_field: String,
	url_field: String,
	fk_column: String,
	url_column: String,
	nullable: bool,
}

impl LooseFkConstraint {
	/// Create the constraint for the given fields of the model stored in `owner`
	///
	/// The name is derived from the owner and field names so that declaring
	/// the same field twice yields the same constraint.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_loose_fk_db::constraints::LooseFkConstraint;
	///
	/// let constraint = LooseFkConstraint::new(
	///     "testapp_zaak", "_zaaktype", "extern_zaaktype", "_zaaktype_id", "extern_zaaktype", false,
	/// );
	/// assert_eq!(constraint.name(), "testapp_zaak__zaaktype_or_extern_zaaktype_filled");
	/// assert_eq!(
	///     constraint.check_sql(),
	///     r#"("_zaaktype_id" IS NOT NULL AND "extern_zaaktype" = '') OR ("_zaaktype_id" IS NULL AND "extern_zaaktype" <> '')"#
	/// );
	/// ```
	pub fn new(
		owner: &str,
		fk_field: impl Into<String>,
		url_field: impl Into<String>,
		fk_column: impl Into<String>,
		url_column: impl Into<String>,
		nullable: bool,
	) -> Self {
		let fk_field = fk_field.into();
		let url_field = url_field.into();
		let name = format!("{}_{}_or_{}_filled", owner, fk_field, url_field);
		Self {
			name,
			fk_field,
			url_field,
			fk_column: fk_column.into(),
			url_column: url_column.into(),
			nullable,
		}
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

	/// The boolean predicate enforced by the constraint
	pub fn check_sql(&self) -> String {
		let fk = quote_ident(&self.fk_column);
		let url = quote_ident(&self.url_column);
		if self.nullable {
			format!("{fk} IS NULL OR {url} = ''")
		} else {
			format!("({fk} IS NOT NULL AND {url} = '') OR ({fk} IS NULL AND {url} <> '')")
		}
	}

	/// Constraint clause for a `CREATE TABLE` statement
	pub fn constraint_sql(&self) -> String {
		format!("CONSTRAINT {} CHECK ({})", self.name, self.check_sql())
	}

	/// Statement adding the constraint to an existing table
	pub fn create_sql(&self, table: &str) -> String {
		format!(
			"ALTER TABLE {} ADD {}",
			quote_ident(table),
			self.constraint_sql()
		)
	}

	/// Statement dropping the constraint
	pub fn remove_sql(&self, table: &str) -> String {
		format!(
			"ALTER TABLE {} DROP CONSTRAINT {}",
			quote_ident(table),
			self.name
		)
	}

	/// Evaluate the constraint against an in-memory record
	pub fn validate(&self, record: &Record) -> LooseFkResult<()> {
		let fk_filled = record
			.column_value(&self.fk_field)
			.is_some_and(|value| !value.is_null());
		let url_filled = matches!(
			record.get(&self.url_field),
			Some(Value::Text(url)) if !url.is_empty()
		);

		let valid = match (fk_filled, url_filled) {
			(true, false) | (false, true) => true,
			(false, false) => self.nullable,
			(true, true) => false,
		};

		if valid {
			Ok(())
		} else {
			Err(LooseFkError::InvariantViolation(format!(
				"Constraint \"{}\" is violated.",
				self.name
			)))
		}
	}
}

impl PartialEq for LooseFkConstraint {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
	}
}

impl Eq for LooseFkConstraint {}

/// Quote an SQL identifier with double quotes
pub(crate) fn quote_ident(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}
