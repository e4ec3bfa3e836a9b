//! Resource routing table
//!
//! The router maps detail paths (`/{prefix}/{lookup}/`) to the resource
//! handlers that own them. It only knows how to find *one* object per path,
//! which is all a loose foreign key needs to turn a local URL into a row.

use crate::locator::LocatorError;
use crate::pattern::PathPattern;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Query capability of a routed resource
///
/// `E` is the entity type returned by the resource, typically a loaded record.
#[async_trait]
pub trait ResourceHandler<E>: Send + Sync {
	/// Field the detail lookup filters on
	fn lookup_field(&self) -> &str {
		"pk"
	}

	/// Return every entity whose `field` equals `value`
	async fn query(&self, field: &str, value: &str) -> Result<Vec<E>, LocatorError>;
}

struct ResourceRoute<E> {
	name: String,
	pattern: PathPattern,
	lookup_param: String,
	handler: Arc<dyn ResourceHandler<E>>,
}

/// Result of routing a path
pub struct RouteMatch<E> {
	pub name: String,
	pub handler: Arc<dyn ResourceHandler<E>>,
	pub lookup_field: String,
	pub lookup_value: String,
}

impl<E> Clone for RouteMatch<E> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			handler: Arc::clone(&self.handler),
			lookup_field: self.lookup_field.clone(),
			lookup_value: self.lookup_value.clone(),
		}
	}
}

impl<E> fmt::Debug for RouteMatch<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RouteMatch")
			.field("name", &self.name)
			.field("lookup_field", &self.lookup_field)
			.field("lookup_value", &self.lookup_value)
			.finish()
	}
}

/// Routing table of detail endpoints
pub struct ResourceRouter<E> {
	routes: Vec<ResourceRoute<E>>,
}

impl<E> Default for ResourceRouter<E> {
	fn default() -> Self {
		Self { routes: Vec::new() }
	}
}

impl<E> fmt::Debug for ResourceRouter<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list()
			.entries(self.routes.iter().map(|r| r.pattern.pattern()))
			.finish()
	}
}

impl<E> ResourceRouter<E> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register the detail route of a resource under `prefix`
	///
	/// The route is named `{prefix}-detail` and its pattern is
	/// `/{prefix}/{lookup}/`, the lookup placeholder being named after the
	/// handler's lookup field.
	pub fn register<H>(&mut self, prefix: &str, handler: H) -> Result<&mut Self, LocatorError>
	where
		H: ResourceHandler<E> + 'static,
	{
		let prefix = prefix.trim_matches('/');
		let lookup = handler.lookup_field().to_string();
		let pattern = format!("/{}/{{{}}}/", prefix, lookup);
		self.register_pattern(&format!("{}-detail", prefix), &pattern, handler)
	}

	/// Register a handler under an explicit pattern
	///
	/// The pattern must contain a placeholder named after the handler's
	/// lookup field.
	pub fn register_pattern<H>(
		&mut self,
		name: &str,
		pattern: &str,
		handler: H,
	) -> Result<&mut Self, LocatorError>
	where
		H: ResourceHandler<E> + 'static,
	{
		let compiled = PathPattern::new(pattern)?;
		let lookup_param = handler.lookup_field().to_string();
		if !compiled.param_names().contains(&lookup_param) {
			return Err(LocatorError::InvalidPattern(format!(
				"pattern '{}' has no '{{{}}}' placeholder",
				pattern, lookup_param
			)));
		}

		tracing::debug!(route = name, pattern, "registered resource route");
		self.routes.push(ResourceRoute {
			name: name.to_string(),
			pattern: compiled,
			lookup_param,
			handler: Arc::new(handler),
		});
		Ok(self)
	}

	/// Find the route owning `path`
	pub fn route(&self, path: &str) -> Option<RouteMatch<E>> {
		self.routes.iter().find_map(|route| {
			let params = route.pattern.matches(path)?;
			let lookup_value = params.get(&route.lookup_param)?.clone();
			Some(RouteMatch {
				name: route.name.clone(),
				handler: Arc::clone(&route.handler),
				lookup_field: route.handler.lookup_field().to_string(),
				lookup_value,
			})
		})
	}

	/// Build the detail path of a named route
	///
	/// # Examples
	///
	/// ```
	/// use async_trait::async_trait;
	/// use reinhardt_loose_fk_urls::{LocatorError, ResourceHandler, ResourceRouter};
	///
	/// struct Names;
	///
	/// #[async_trait]
	/// impl ResourceHandler<String> for Names {
	///     async fn query(&self, _field: &str, value: &str) -> Result<Vec<String>, LocatorError> {
	///         Ok(vec![value.to_string()])
	///     }
	/// }
	///
	/// let mut router = ResourceRouter::new();
	/// router.register("zaaktypen", Names).unwrap();
	/// assert_eq!(router.reverse("zaaktypen-detail", "3").as_deref(), Some("/zaaktypen/3/"));
	/// ```
	pub fn reverse(&self, name: &str, lookup_value: &str) -> Option<String> {
		let route = self.routes.iter().find(|route| route.name == name)?;
		let params = HashMap::from([(route.lookup_param.clone(), lookup_value.to_string())]);
		route.pattern.reverse(&params)
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}
}
