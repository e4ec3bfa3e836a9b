//! # Reinhardt Loose FK Database
//!
//! Relations that point either at a row of the local database or at a
//! resource hosted by another service.
//!
//! A loose foreign key combines a foreign key column and a URL column of the
//! same table. Exactly one of them is filled, which is enforced by a generated
//! CHECK constraint. Reading the field yields the local row, or the remote
//! resource fetched and materialized as a read-only virtual instance.
//!
//! ## Module Organization
//!
//! - [`model`]: runtime model metadata and loaded records
//! - [`fields`]: the [`LooseFkField`] declaration and its system checks
//! - [`constraints`]: the mutual exclusivity CHECK constraint
//! - [`descriptor`]: reading and writing the field on a record
//! - [`loaders`]: fetching remote resources and resolving local URLs
//! - [`virtual_models`]: read-only instances of remote resources
//! - [`handlers`]: lazy relations of virtual instances
//! - [`query_list`]: in-memory lists of resolved relations
//! - [`lookups`]: splitting `=` and `IN` predicates over both columns
//! - [`validators`]: validating submitted URLs
//!
//! ## Feature Flags
//!
//! - `http-loader` (default): the `default` fetcher, backed by `reqwest`

pub mod constraints;
pub mod descriptor;
pub mod errors;
pub mod fields;
pub mod handlers;
pub mod loaders;
pub mod lookups;
pub mod model;
pub mod query_list;
pub mod validators;
pub mod virtual_models;

pub use constraints::LooseFkConstraint;
pub use descriptor::{LooseFkDescriptor, LooseValue};
pub use errors::{LooseFkError, LooseFkResult};
pub use fields::LooseFkField;
pub use handlers::{Relation, RelationHandler};
#[cfg(feature = "http-loader")]
pub use loaders::ReqwestFetcher;
pub use loaders::{
	Fetch, FetcherRegistry, JsonObject, Loader, default_loader, install_router,
	reset_default_loader,
};
pub use lookups::{LookupSql, LookupValue, LooseFkFilter, LooseFkLookup, SqlFragment, SqlParam};
pub use model::{FieldKind, FieldMeta, ModelMeta, Record, Value, get_model, register_model};
pub use query_list::{QueryList, is_url};
pub use validators::{FieldValidationError, LooseFkValidator, ReferenceResolver, ValidatorError};
pub use virtual_models::{
	LooseFkData, Resolved, VirtualInstance, VirtualType, virtual_model_factory,
};
