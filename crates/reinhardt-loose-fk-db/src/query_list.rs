//! In-memory result lists of collection relations

use crate::errors::{LooseFkError, LooseFkResult};
use crate::virtual_models::Resolved;
use url::Url;

/// Check that `value` is an absolute http(s) URL with a host
///
/// # Examples
///
/// ```
/// use reinhardt_loose_fk_db::is_url;
///
/// assert!(is_url("https://example.com/zaaktypen/1"));
/// assert!(!is_url("ftp://example.com/zaaktypen/1"));
/// assert!(!is_url("/zaaktypen/1"));
/// ```
pub fn is_url(value: &str) -> bool {
	match Url::parse(value) {
		Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
		Err(_) => false,
	}
}

/// Resolved items of a many-to-many relation on a virtual instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryList {
	items: Vec<Resolved>,
}

impl QueryList {
	pub fn new(items: Vec<Resolved>) -> Self {
		Self { items }
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Resolved> {
		self.items.iter()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn count(&self) -> usize {
		self.len()
	}

	pub fn all(&self) -> &Self {
		self
	}

	/// The only item of the list
	///
	/// # Errors
	///
	/// [`LooseFkError::NotFound`] for an empty list and
	/// [`LooseFkError::MultipleObjectsReturned`] for more than one item.
	pub fn get(&self) -> LooseFkResult<&Resolved> {
		match self.items.as_slice() {
			[item] => Ok(item),
			[] => Err(LooseFkError::NotFound("query list is empty".to_string())),
			items => Err(LooseFkError::MultipleObjectsReturned {
				path: "query list".to_string(),
				count: items.len(),
			}),
		}
	}

	pub fn first(&self) -> Option<&Resolved> {
		self.items.first()
	}

	/// Whether an item fetched from `url` is part of the list
	///
	/// Values that are not URLs never match.
	pub fn contains_url(&self, url: &str) -> bool {
		is_url(url) && self.items.iter().any(|item| item.url() == Some(url))
	}

	pub fn contains(&self, item: &Resolved) -> bool {
		self.items.contains(item)
	}

	pub fn into_vec(self) -> Vec<Resolved> {
		self.items
	}
}

impl IntoIterator for QueryList {
	type Item = Resolved;
	type IntoIter = std::vec::IntoIter<Resolved>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.into_iter()
	}
}

impl<'a> IntoIterator for &'a QueryList {
	type Item = &'a Resolved;
	type IntoIter = std::slice::Iter<'a, Resolved>;

	fn into_iter(self) -> Self::IntoIter {
		self.items.iter()
	}
}

impl FromIterator<Resolved> for QueryList {
	fn from_iter<I: IntoIterator<Item = Resolved>>(iter: I) -> Self {
		Self::new(iter.into_iter().collect())
	}
}
