//! # Reinhardt Loose FK URLs
//!
//! Everything a loose foreign key needs to know about URLs of *this* service:
//!
//! - [`classifier`]: decide whether a URL is local or remote
//! - [`pattern`]: `{param}` path patterns
//! - [`router`]: detail routes mapped to [`ResourceHandler`]s
//! - [`locator`]: resolve a local path to the entity it names
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use reinhardt_loose_fk_urls::{LocatorError, ResourceHandler, ResourceLocator, ResourceRouter};
//!
//! struct ZaakTypes;
//!
//! #[async_trait]
//! impl ResourceHandler<String> for ZaakTypes {
//!     async fn query(&self, _field: &str, value: &str) -> Result<Vec<String>, LocatorError> {
//!         Ok(vec![format!("zaaktype {}", value)])
//!     }
//! }
//!
//! let mut router = ResourceRouter::new();
//! router.register("zaaktypen", ZaakTypes).unwrap();
//! let locator = ResourceLocator::new(Arc::new(router)).with_script_prefix("/api");
//! assert_eq!(locator.strip_script_prefix("/api/zaaktypen/1/"), "/zaaktypen/1/");
//! ```

pub mod classifier;
pub mod locator;
pub mod pattern;
pub mod router;

pub use classifier::{UrlClassifier, is_local};
pub use locator::{LocatorError, ResourceLocator};
pub use pattern::PathPattern;
pub use router::{ResourceHandler, ResourceRouter, RouteMatch};
