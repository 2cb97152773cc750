//! Search parameter parsing
//!
//! Supported shapes:
//! - `search=john` matches every searchable field
//! - `search=name:john;email:john@x.com` or `search[name]=john` names fields
//! - `search=john;email:john@x.com` mixes a fallback term with field terms
//! - `search="john doe"` is a phrase, `search=jon~1` a fuzzy term
//! - `searchFields=name:like;email:=` narrows or extends the field set
//! - `searchJoin=and` requires every field to match

use quarry_core::condition::GLOBAL_TERM;
use quarry_core::{Boolean, Operator, SearchMode, SearchSpec};
use serde::{Deserialize, Serialize};

use crate::config::ParamNames;
use crate::error::{ParseError, Result};
use crate::params::{ParamValue, Params};

/// Edit distance used for a bare `~` suffix
pub const DEFAULT_FUZZY_DISTANCE: u32 = 2;

/// Ordered field-path to default-operator mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableFields(Vec<(String, Operator)>);

impl SearchableFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field and its default operator
    pub fn field(mut self, path: impl Into<String>, operator: Operator) -> Self {
        self.insert(path.into(), operator);
        self
    }

    pub fn insert(&mut self, path: String, operator: Operator) {
        match self.0.iter_mut().find(|(f, _)| *f == path) {
            Some(entry) => entry.1 = operator,
            None => self.0.push((path, operator)),
        }
    }

    pub fn get(&self, path: &str) -> Option<Operator> {
        self.0.iter().find(|(f, _)| f == path).map(|(_, op)| *op)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Operator)> {
        self.0.iter().map(|(f, op)| (f.as_str(), *op))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Operator)> for SearchableFields {
    fn from_iter<I: IntoIterator<Item = (S, Operator)>>(iter: I) -> Self {
        let mut fields = SearchableFields::new();
        for (path, op) in iter {
            fields.insert(path.into(), op);
        }
        fields
    }
}

/// A single search term after quote and fuzzy-suffix handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub text: String,
    pub phrase: bool,
    pub fuzzy: Option<u32>,
}

impl Term {
    /// Parse `"phrase"`, `word~N`, `word~` or a plain word
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();

        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            let inner = &trimmed[1..trimmed.len() - 1];
            return (!inner.is_empty()).then(|| Term {
                text: inner.to_string(),
                phrase: true,
                fuzzy: None,
            });
        }

        if let Some((base, suffix)) = trimmed.rsplit_once('~') {
            let base = base.trim();
            let distance = if suffix.is_empty() {
                Some(DEFAULT_FUZZY_DISTANCE)
            } else if suffix.chars().all(|c| c.is_ascii_digit()) {
                suffix.parse::<u32>().ok()
            } else {
                None
            };
            if let (Some(distance), false) = (distance, base.is_empty()) {
                return Some(Term {
                    text: base.to_string(),
                    phrase: false,
                    fuzzy: Some(distance),
                });
            }
        }

        (!trimmed.is_empty()).then(|| Term {
            text: trimmed.to_string(),
            phrase: false,
            fuzzy: None,
        })
    }
}

/// Parses `search`, `searchFields` and `searchJoin`
#[derive(Debug, Clone)]
pub struct SearchParser<'a> {
    names: &'a ParamNames,
    accepted: &'a [Operator],
    searchable: &'a SearchableFields,
}

impl<'a> SearchParser<'a> {
    pub fn new(
        names: &'a ParamNames,
        accepted: &'a [Operator],
        searchable: &'a SearchableFields,
    ) -> Self {
        Self {
            names,
            accepted,
            searchable,
        }
    }

    /// Active field set after applying any `searchFields` override
    ///
    /// Fails with `InvalidSearchFields` when an override is present but none
    /// of its entries resolves to a field.
    pub fn fields(&self, params: &Params) -> Result<SearchableFields> {
        let entries = match params.get(&self.names.search_fields) {
            Some(ParamValue::Scalar(raw)) => raw
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>(),
            Some(list @ ParamValue::List(_)) => list.scalars(),
            _ => Vec::new(),
        };

        if entries.is_empty() {
            return Ok(self.searchable.clone());
        }

        let mut authorized = SearchableFields::new();
        let mut named = Vec::new();
        for entry in &entries {
            let (field, operator) = match entry.split_once(':') {
                Some((field, op)) => (field.trim(), Some(op.trim())),
                None => (entry.as_str(), None),
            };
            named.push(field.to_string());

            let accepted = operator
                .and_then(|op| op.parse::<Operator>().ok())
                .filter(|op| self.accepted.contains(op));
            match accepted {
                Some(op) => authorized.insert(field.to_string(), op),
                None => {
                    if let Some(op) = operator {
                        log::debug!("searchFields operator '{}' for '{}' not accepted", op, field);
                    }
                }
            }
        }

        // Declared fields keep their declared order; authorized extras follow
        let mut fields = SearchableFields::new();
        for (field, default_op) in self.searchable.iter() {
            if named.iter().any(|n| n == field) {
                fields.insert(field.to_string(), authorized.get(field).unwrap_or(default_op));
            }
        }
        for (field, op) in authorized.iter() {
            if !fields.contains(field) {
                fields.insert(field.to_string(), op);
            }
        }

        if fields.is_empty() {
            return Err(ParseError::InvalidSearchFields {
                fields: entries.join(";"),
                accepted: self
                    .accepted
                    .iter()
                    .map(Operator::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        Ok(fields)
    }

    /// Parse the search terms against the active field set
    ///
    /// Returns `None` when there is nothing to search for.
    pub fn spec(&self, params: &Params, fields: &SearchableFields) -> Option<SearchSpec> {
        let mut spec = match params.get(&self.names.search)? {
            ParamValue::Scalar(raw) => parse_search_string(raw)?,
            map @ ParamValue::Map(_) => parse_search_map(map),
            ParamValue::List(_) => return None,
        };

        if let Some(join) = params
            .scalar(&self.names.search_join)
            .and_then(Boolean::parse)
        {
            spec.combinator = join;
        }

        let dropped: Vec<String> = spec
            .terms
            .keys()
            .filter(|k| k.as_str() != GLOBAL_TERM && !fields.contains(k))
            .cloned()
            .collect();
        for key in dropped {
            log::debug!("Ignoring search term for non-searchable field '{}'", key);
            spec.terms.remove(&key);
            spec.phrases.remove(&key);
            spec.fuzzy.remove(&key);
        }

        (!spec.is_empty()).then_some(spec)
    }
}

fn parse_search_string(raw: &str) -> Option<SearchSpec> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if !raw.contains(':') {
        let mut spec = SearchSpec::new(SearchMode::Global);
        add_term(&mut spec, GLOBAL_TERM, raw);
        return Some(spec);
    }

    let mut spec = SearchSpec::new(SearchMode::PerField);
    for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        match segment.split_once(':') {
            Some((field, term)) => {
                let field = field.trim();
                if field.is_empty() {
                    log::debug!("Ignoring search pair without a field: {}", segment);
                    continue;
                }
                add_term(&mut spec, field, term);
            }
            None => {
                if !spec.terms.contains_key(GLOBAL_TERM) {
                    add_term(&mut spec, GLOBAL_TERM, segment);
                }
            }
        }
    }
    Some(spec)
}

fn parse_search_map(map: &ParamValue) -> SearchSpec {
    let mut spec = SearchSpec::new(SearchMode::PerField);
    if let ParamValue::Map(entries) = map {
        for (field, value) in entries {
            if let Some(term) = value.as_scalar() {
                add_term(&mut spec, field, term);
            }
        }
    }
    spec
}

fn add_term(spec: &mut SearchSpec, key: &str, raw: &str) {
    let Some(term) = Term::parse(raw) else {
        return;
    };
    if term.phrase {
        spec.phrases.insert(key.to_string());
    }
    if let Some(distance) = term.fuzzy {
        spec.fuzzy.insert(key.to_string(), distance);
    }
    spec.terms.insert(key.to_string(), term.text);
}
