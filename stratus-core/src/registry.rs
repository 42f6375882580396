//! Registry - Name to factory tables
//!
//! Providers publish their resource types and data sources as registries
//! keyed by type name. Every name must be unique; a duplicate is a
//! programming error and aborts initialization instead of silently replacing
//! the earlier entry.

use std::collections::BTreeMap;

/// Error returned by [`Registry::try_register`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate {kind} registration: {name}")]
    Duplicate { kind: &'static str, name: String },
}

/// Ordered mapping from type name to an entry (usually a factory function)
#[derive(Debug, Clone)]
pub struct Registry<T> {
    kind: &'static str,
    entries: BTreeMap<String, T>,
}

impl<T> Registry<T> {
    /// Create an empty registry. `kind` names the entries in error messages
    /// (e.g., "resource", "data source").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Build a registry from a static table, aborting on the first duplicate
    pub fn from_entries<N, I>(kind: &'static str, entries: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, T)>,
    {
        let mut registry = Self::new(kind);
        for (name, entry) in entries {
            registry.register(name, entry);
        }
        registry
    }

    /// Register an entry, returning an error if the name is already taken
    pub fn try_register(&mut self, name: impl Into<String>, entry: T) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate {
                kind: self.kind,
                name,
            });
        }
        log::trace!("registered {} {}", self.kind, name);
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Register an entry.
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered.
    pub fn register(&mut self, name: impl Into<String>, entry: T) -> &mut Self {
        if let Err(e) = self.try_register(name, entry) {
            panic!("{}", e);
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Registry<fn() -> T> {
    /// Look up a factory by name and call it
    pub fn build(&self, name: &str) -> Option<T> {
        self.get(name).map(|factory| factory())
    }
}
