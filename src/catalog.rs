//! Collections exposed over HTTP and the rules attached to each of them.

use crate::query::{Record, field_selector};
use std::collections::HashMap;

/// Collection holding one record per registered (or placeholder) user.
pub const USERS: &str = "users";
/// Collection holding work requests that may be assigned to a user by email.
pub const REQUESTS: &str = "requests";

/// Rules for a single exposed collection.
#[derive(Debug, Clone)]
pub struct CollectionSpec {
    /// Collection id in the document store.
    pub name: &'static str,
    /// Fields searched by `search_term`.
    pub search_fields: &'static [&'static str],
    /// Fields that must be present and non-blank on create.
    pub required_fields: &'static [&'static str],
    /// Fields whose value may appear at most once in the collection.
    pub unique_fields: &'static [&'static str],
    /// Whether reading the collection requires an identity token.
    pub protected_reads: bool,
}

impl CollectionSpec {
    /// Selectors used by the query pipeline for this collection.
    pub fn selectors(&self) -> Vec<impl Fn(&Record) -> String + Send + Sync + use<>> {
        self.search_fields
            .iter()
            .map(|field| field_selector(*field))
            .collect()
    }
}

/// Lookup table from collection name to its [`CollectionSpec`].
#[derive(Debug, Clone)]
pub struct Catalog {
    collections: HashMap<&'static str, CollectionSpec>,
}

impl Catalog {
    /// Empty catalog; use [`Catalog::register`] to add collections.
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Add or replace a collection.
    pub fn register(&mut self, spec: CollectionSpec) {
        self.collections.insert(spec.name, spec);
    }

    /// Find a collection by name.
    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.get(name)
    }

    /// Names of every registered collection, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.collections.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let mut catalog = Self::new();
        catalog.register(CollectionSpec {
            name: USERS,
            search_fields: &["name", "email"],
            required_fields: &["email"],
            unique_fields: &["email"],
            protected_reads: false,
        });
        catalog.register(CollectionSpec {
            name: REQUESTS,
            search_fields: &["title", "description", "status", "assigned_email"],
            required_fields: &["title"],
            unique_fields: &[],
            protected_reads: true,
        });
        catalog
    }
}
