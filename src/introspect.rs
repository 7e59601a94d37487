//! Read-only constraint queries over a live collection.
//!
//! These are the only inputs to the rebuild decision: a collection
//! satisfies a requirement when every required unique field is already
//! enforced. Nothing here is cached; each call reads the collection as it
//! is now.

use crate::collection::Collection;

/// One or more field names.
///
/// A single name converts into a one-element set, so every query accepts
/// either form:
///
/// ```rust
/// use strictdb::introspect::FieldNames;
///
/// assert_eq!(FieldNames::from("slug").len(), 1);
/// assert_eq!(FieldNames::from(["slug", "title"]).len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldNames(Vec<String>);

impl FieldNames {
    /// Returns the names in their original order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no names.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Consumes the set, returning the names.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for FieldNames {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for FieldNames {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for FieldNames {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for FieldNames {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for FieldNames {
    fn from(names: &[String]) -> Self {
        Self(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for FieldNames {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&FieldNames> for FieldNames {
    fn from(names: &FieldNames) -> Self {
        names.clone()
    }
}

/// Field names currently carrying a lookup index, empty if none.
pub fn indexed_field_names(collection: &Collection) -> Vec<String> {
    collection.indexed_field_names().to_vec()
}

/// Field names currently enforced as unique, empty if none.
pub fn unique_field_names(collection: &Collection) -> Vec<String> {
    collection.unique_field_names().to_vec()
}

/// Returns true if every name in `names` is enforced as unique.
///
/// Order-insensitive. The requirement must be a subset of the enforced
/// set; overlapping is not enough. An empty requirement is always met.
pub fn has_unique_field_names(collection: &Collection, names: impl Into<FieldNames>) -> bool {
    let names: FieldNames = names.into();
    let enforced = collection.unique_field_names();
    names.as_slice().iter().all(|name| enforced.contains(name))
}
