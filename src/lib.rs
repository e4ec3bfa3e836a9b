//! # Reinhardt Loose FK
//!
//! Relations that point either at a row of the local database or at a
//! resource hosted by another service, addressed by its URL.
//!
//! A loose foreign key is stored in two columns: a regular foreign key and a
//! URL. Exactly one of them is filled. Reading the field returns the local row
//! or a read-only virtual instance built from the remote JSON document, and
//! filtering on it splits every predicate over both columns.
//!
//! ## Crates
//!
//! - [`conf`]: settings (`DEFAULT_LOOSE_FK_LOADER`, local base URLs, allowed
//!   hosts, script prefix) and system checks
//! - [`urls`]: local/remote URL classification and resolution of local URLs
//!   through registered resource routes
//! - [`db`]: the field, its constraint, the descriptor, loaders, virtual
//!   models, lookups and validators
//!
//! ## Feature Flags
//!
//! - `minimal` - model layer, lookups and virtual models
//! - `http-loader` - the `default` fetcher, backed by `reqwest`
//! - `full` (default) - everything above
//!
//! ## Quick Example
//!
//! ```
//! use reinhardt_loose_fk::prelude::*;
//!
//! register_model(ModelMeta::new("ZaakType", "catalogi_zaaktype").field(FieldMeta::char("name", 50)));
//! let zaak = register_model(
//! 	ModelMeta::new("Zaak", "zaken_zaak")
//! 		.field(FieldMeta::foreign_key("_zaaktype", "ZaakType").null(true).blank(true))
//! 		.field(FieldMeta::url("extern_zaaktype").blank(true))
//! 		.loose_fk(LooseFkField::new("zaaktype", "_zaaktype", "extern_zaaktype")),
//! );
//!
//! assert_eq!(
//! 	zaak.constraints()[0].name(),
//! 	"zaken_zaak__zaaktype_or_extern_zaaktype_filled"
//! );
//!
//! let lookup = LooseFkLookup::for_field(&zaak, "zaaktype").unwrap();
//! let sql = lookup.is_in(["https://example.com/zaaktypen/1"]).unwrap();
//! assert!(!sql.is_empty());
//! ```

pub use reinhardt_loose_fk_conf as conf;
pub use reinhardt_loose_fk_db as db;
pub use reinhardt_loose_fk_urls as urls;

/// Commonly used types
pub mod prelude {
	pub use crate::conf::{LooseFkSettings, reconfigure, settings};
	pub use crate::db::{
		FieldMeta, LookupSql, LookupValue, Loader, LooseFkDescriptor, LooseFkError,
		LooseFkField, LooseFkFilter, LooseFkLookup, LooseFkResult, LooseFkValidator, LooseValue,
		ModelMeta, QueryList, Record, Relation, Resolved, Value, VirtualInstance,
		default_loader, register_model, virtual_model_factory,
	};
	pub use crate::urls::{ResourceHandler, ResourceRouter, UrlClassifier};
}
