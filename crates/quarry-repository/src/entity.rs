//! Entity descriptions

use quarry_parser::SearchableFields;

use crate::cache::CacheTags;

/// Static description of the entity a repository serves
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    /// Entity name, used for cache keys, cache tags and events
    pub name: String,
    pub table: String,
    pub primary_key: String,
    /// Fields request search may target, with their default operators
    pub searchable: SearchableFields,
    /// Extra fields request filters may target
    pub filterable: Vec<String>,
}

impl EntityDescriptor {
    /// Descriptor with an `id` primary key and no searchable fields
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            searchable: SearchableFields::new(),
            filterable: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_searchable(mut self, searchable: SearchableFields) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn with_filterable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filterable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn cache_tags(&self) -> CacheTags {
        CacheTags::for_entity(&self.name)
    }
}
