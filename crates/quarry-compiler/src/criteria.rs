//! Request-driven criterion

use quarry_core::{Criterion, QueryBuilder};
use quarry_parser::{ParsedRequest, Params, RequestParser};
use tracing::debug;

use crate::compiler::{CompilerOptions, FilterQueryCompiler};
use crate::error::Result;

/// Criterion applying a request's search, filters, ordering and includes
///
/// Parameters are parsed once, when the criterion is built, so an unusable
/// `searchFields` override fails here rather than on the first read.
#[derive(Debug, Clone)]
pub struct RequestCriteria {
    request: ParsedRequest,
    compiler: FilterQueryCompiler,
}

impl RequestCriteria {
    /// Parse `params` with `parser`
    pub fn new(parser: &RequestParser, params: &Params) -> Result<Self> {
        let request = parser.parse(params)?;
        Ok(Self::from_parsed(request))
    }

    pub fn from_parsed(request: ParsedRequest) -> Self {
        Self {
            request,
            compiler: FilterQueryCompiler::new(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.compiler = FilterQueryCompiler::with_options(options);
        self
    }

    pub fn request(&self) -> &ParsedRequest {
        &self.request
    }

    /// Cache bypass requested through the parameters
    pub fn skip_cache(&self) -> bool {
        self.request.skip_cache.unwrap_or(false)
    }
}

impl Criterion for RequestCriteria {
    fn apply(&self, query: QueryBuilder) -> quarry_core::Result<QueryBuilder> {
        if self.request.is_noop() {
            debug!("Request criterion adds no clauses");
            return Ok(query);
        }
        Ok(self.compiler.compile(&self.request, query)?)
    }

    fn name(&self) -> &str {
        "request"
    }

    fn bypasses_cache(&self) -> bool {
        self.skip_cache()
    }

    fn fingerprint(&self) -> serde_json::Value {
        // The cache bypass flag does not change the query
        let request = ParsedRequest {
            skip_cache: None,
            ..self.request.clone()
        };
        serde_json::json!({
            "request": request,
            "options": self.compiler.options(),
        })
    }
}
