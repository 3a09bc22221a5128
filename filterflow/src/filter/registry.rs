//! Registry mapping type tags to filter factories.

use super::Filter;
use crate::errors::{ConfigurationError, ContractErrorInfo};
use std::collections::BTreeMap;

/// Factory function type for creating filters.
pub type FilterFactory = Box<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Registry of filter factories, keyed by type tag.
#[derive(Default)]
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl FilterRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every stock filter.
    #[must_use]
    pub fn with_stock_filters() -> Self {
        let mut registry = Self::new();
        crate::stock::register_all(&mut registry);
        registry
    }

    /// Registers a factory, replacing any previous one for the tag.
    pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Filter> + Send + Sync + 'static,
    {
        self.factories.insert(type_tag.into(), Box::new(factory));
    }

    /// Constructs a new filter of the given type.
    pub fn create(&self, type_tag: &str) -> Result<Box<dyn Filter>, ConfigurationError> {
        self.factories.get(type_tag).map(|factory| factory()).ok_or_else(|| {
            ConfigurationError::new(format!("No filter registered for type '{type_tag}'"))
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONFIG-UNKNOWN_TYPE",
                        format!("unknown type '{type_tag}'"),
                    )
                    .with_context_entry("type_tag", type_tag),
                )
        })
    }

    /// Checks if a type tag is registered.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }

    /// Lists registered type tags, sorted.
    #[must_use]
    pub fn type_tags(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("type_tags", &self.type_tags())
            .finish()
    }
}
