//! Whole-request parsing

use quarry_core::{FilterCondition, Operator, OrderSpec, SearchSpec};
use serde::{Deserialize, Serialize};

use crate::config::ParserConfig;
use crate::error::Result;
use crate::filter::FilterParser;
use crate::ordering::{parse_order, parse_with};
use crate::params::{ParamValue, Params};
use crate::search::{SearchParser, SearchableFields};

/// Everything a request asks of a read, normalized and validated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRequest {
    pub search: Option<SearchSpec>,
    /// Active search fields with their operators
    pub search_fields: SearchableFields,
    pub filters: Vec<FilterCondition>,
    pub or_groups: Vec<Vec<FilterCondition>>,
    pub order: Vec<OrderSpec>,
    pub with: Vec<String>,
    /// Per-request cache bypass; `None` when the parameter is absent
    pub skip_cache: Option<bool>,
}

impl ParsedRequest {
    /// True when the request adds nothing to a query
    pub fn is_noop(&self) -> bool {
        self.search.is_none()
            && self.filters.is_empty()
            && self.or_groups.is_empty()
            && self.order.is_empty()
            && self.with.is_empty()
    }
}

/// Parses request parameters against one entity's searchable fields
#[derive(Debug, Clone)]
pub struct RequestParser {
    config: ParserConfig,
    accepted: Vec<Operator>,
    searchable: SearchableFields,
    filterable: Vec<String>,
}

impl RequestParser {
    /// Create a parser; fails when the configured operator list has an
    /// unknown spelling
    pub fn new(config: ParserConfig, searchable: SearchableFields) -> Result<Self> {
        let accepted = config.accepted()?;
        Ok(Self {
            config,
            accepted,
            searchable,
            filterable: Vec::new(),
        })
    }

    /// Fields that may be filtered on without being searchable
    pub fn with_filterable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filterable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn searchable(&self) -> &SearchableFields {
        &self.searchable
    }

    /// Parse `params`
    ///
    /// Malformed clauses are dropped; only an unusable `searchFields`
    /// override fails the whole request, and only when there is a search
    /// term for it to apply to.
    pub fn parse(&self, params: &Params) -> Result<ParsedRequest> {
        let names = &self.config.params;
        let search = SearchParser::new(names, &self.accepted, &self.searchable);

        let search_fields = match search.fields(params) {
            Ok(fields) => fields,
            Err(err) if !has_search_term(params.get(&names.search)) => {
                log::debug!("Ignoring searchFields without a search term: {}", err);
                self.searchable.clone()
            }
            Err(err) => return Err(err),
        };
        let spec = search.spec(params, &search_fields);

        let filters = params
            .get(&names.filter)
            .map(|filter| {
                FilterParser::new(&self.searchable)
                    .with_filterable(&self.filterable)
                    .parse(filter)
            })
            .unwrap_or_default();

        let request = ParsedRequest {
            search: spec,
            search_fields,
            filters: filters.conditions,
            or_groups: filters.or_groups,
            order: parse_order(params.get(&names.order_by), params.get(&names.sorted_by)),
            with: parse_with(params.get(&names.with)),
            skip_cache: params.scalar(&names.skip_cache).and_then(parse_flag),
        };

        log::debug!(
            "Parsed request: search={}, filters={}, or_groups={}, order={}, with={}",
            request.search.is_some(),
            request.filters.len(),
            request.or_groups.len(),
            request.order.len(),
            request.with.len()
        );

        Ok(request)
    }
}

fn has_search_term(search: Option<&ParamValue>) -> bool {
    match search {
        Some(ParamValue::Scalar(raw)) => !raw.trim().is_empty(),
        Some(value) => value.items().into_iter().any(|item| has_search_term(Some(item))),
        None => false,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    fn parser() -> RequestParser {
        let searchable = SearchableFields::new()
            .field("name", Operator::Like)
            .field("email", Operator::Like)
            .field("status", Operator::Eq);
        RequestParser::new(ParserConfig::default(), searchable).unwrap()
    }

    #[test]
    fn test_empty_params_is_noop() {
        let request = parser().parse(&Params::new()).unwrap();
        assert!(request.is_noop());
        assert_eq!(request.skip_cache, None);
        assert_eq!(request.search_fields.len(), 3);
    }

    #[test]
    fn test_skip_cache_flag() {
        let parse = |q: &str| parser().parse(&Params::from_query_string(q)).unwrap().skip_cache;
        assert_eq!(parse("skipCache=true"), Some(true));
        assert_eq!(parse("skipCache=1"), Some(true));
        assert_eq!(parse("skipCache=false"), Some(false));
        assert_eq!(parse("skipCache=maybe"), None);
    }

    #[test]
    fn test_invalid_config_operator() {
        let config = ParserConfig::default().with_accepted_operators(["like", "approx"]);
        assert!(RequestParser::new(config, SearchableFields::new()).is_err());
    }

    #[test]
    fn test_filterable_fields() {
        let parser = parser().with_filterable(["tenant_id"]);
        let request = parser
            .parse(&Params::from_query_string("filter[tenant_id]=3&filter[secret]=x"))
            .unwrap();
        assert_eq!(request.filters.len(), 1);
        assert_eq!(request.filters[0].path, "tenant_id");
    }

    #[test]
    fn test_search_fields_checked_only_with_search_term() {
        let parse = |q: &str| parser().parse(&Params::from_query_string(q));

        let request = parse("searchFields=bogus&filter[status]=active").unwrap();
        assert_eq!(request.filters.len(), 1);
        assert!(request.search.is_none());
        assert!(parse("search=&searchFields=bogus").is_ok());

        assert!(matches!(
            parse("search=bob&searchFields=bogus"),
            Err(ParseError::InvalidSearchFields { .. })
        ));
    }

    #[test]
    fn test_custom_param_names() {
        let mut config = ParserConfig::default();
        config.params.search = "q".to_string();
        let parser = RequestParser::new(config, SearchableFields::new().field("name", Operator::Like)).unwrap();

        let request = parser.parse(&Params::from_query_string("q=bob&search=ignored")).unwrap();
        assert_eq!(request.search.unwrap().term_for("name"), Some("bob"));
    }
}
