//! Quarry Parser - request parameters to query model
//!
//! This crate is the untrusted half of request handling: it turns loosely
//! structured request parameters (query strings or JSON bodies) into the
//! normalized `SearchSpec` and `FilterCondition` values of `quarry-core`.
//! Nothing here touches a query builder.
//!
//! ```
//! use quarry_parser::{Params, ParserConfig, RequestParser, SearchableFields};
//! use quarry_core::Operator;
//!
//! let searchable = SearchableFields::new()
//!     .field("name", Operator::Like)
//!     .field("email", Operator::Like);
//! let parser = RequestParser::new(ParserConfig::default(), searchable).unwrap();
//!
//! let params = Params::from_query_string("search=john&orderBy=name&sortedBy=desc");
//! let request = parser.parse(&params).unwrap();
//! assert!(request.search.is_some());
//! assert_eq!(request.order.len(), 1);
//! ```

pub mod coerce;
pub mod config;
pub mod error;
pub mod filter;
pub mod ordering;
pub mod params;
pub mod request;
pub mod search;

// Re-export main parser types
pub use config::{ParamNames, ParserConfig};
pub use error::{ParseError, Result};
pub use filter::{FilterParser, FilterSet};
pub use params::{ParamValue, Params};
pub use request::{ParsedRequest, RequestParser};
pub use search::{SearchParser, SearchableFields};
