//! Parsed representation of free-text search input

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::filter::Boolean;

/// Key under which the global (all fields) term is stored
pub const GLOBAL_TERM: &str = "*";

/// Whether the search names its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// One term matched against every searchable field
    Global,
    /// `field:term` pairs, optionally with a global fallback term
    PerField,
}

/// Search terms after parsing, before any query is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub mode: SearchMode,
    /// Field name (or `*`) to raw term, quotes and fuzzy suffix removed
    pub terms: BTreeMap<String, String>,
    /// Fields whose term was quoted
    pub phrases: BTreeSet<String>,
    /// Fields whose term carried a `~N` suffix
    pub fuzzy: BTreeMap<String, u32>,
    /// How field clauses after the first are joined
    pub combinator: Boolean,
}

impl SearchSpec {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            terms: BTreeMap::new(),
            phrases: BTreeSet::new(),
            fuzzy: BTreeMap::new(),
            combinator: Boolean::Or,
        }
    }

    /// An empty spec applies no clause at all
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Term for `field`: its own term, else the global term
    pub fn term_for(&self, field: &str) -> Option<&str> {
        self.terms
            .get(field)
            .or_else(|| self.terms.get(GLOBAL_TERM))
            .map(String::as_str)
    }

    /// Key the term for `field` is stored under
    fn key_for<'a>(&'a self, field: &'a str) -> &'a str {
        if self.terms.contains_key(field) {
            field
        } else {
            GLOBAL_TERM
        }
    }

    pub fn is_phrase(&self, field: &str) -> bool {
        self.phrases.contains(self.key_for(field))
    }

    pub fn fuzzy_distance(&self, field: &str) -> Option<u32> {
        self.fuzzy.get(self.key_for(field)).copied()
    }
}
