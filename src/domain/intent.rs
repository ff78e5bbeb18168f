use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    command::ValidationError,
    price::Money,
    site::{SiteId, SiteRegistry},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueryType {
    ProductSearch,
    PriceComparison,
    FlightSearch,
    Unrecognized(String),
}

impl QueryType {
    pub fn as_str(&self) -> &str {
        match self {
            QueryType::ProductSearch => "product_search",
            QueryType::PriceComparison => "price_comparison",
            QueryType::FlightSearch => "flight_search",
            QueryType::Unrecognized(label) => label,
        }
    }
}

impl From<String> for QueryType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "product_search" => QueryType::ProductSearch,
            "price_comparison" => QueryType::PriceComparison,
            "flight_search" => QueryType::FlightSearch,
            _ => QueryType::Unrecognized(value),
        }
    }
}

impl From<QueryType> for String {
    fn from(value: QueryType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub budget_max: Option<Money>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl SearchParams {
    pub fn keyword(&self) -> Option<&str> {
        non_blank(self.keyword.as_deref())
    }

    pub fn origin(&self) -> Option<&str> {
        non_blank(self.origin.as_deref())
    }

    pub fn destination(&self) -> Option<&str> {
        non_blank(self.destination.as_deref())
    }

    pub fn date(&self) -> Option<&str> {
        non_blank(self.date.as_deref())
    }

    /// Keyword followed by the extra products, de-duplicated case-insensitively.
    pub fn comparison_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = vec![];
        let candidates = self
            .keyword()
            .into_iter()
            .chain(self.products.iter().filter_map(|p| non_blank(Some(p.as_str()))));

        for term in candidates {
            if !terms.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                terms.push(term.to_string());
            }
        }
        terms
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Error, PartialEq)]
#[error("{query_type} intent is missing required field `{field}`")]
pub struct IntentIncompleteError {
    pub query_type: QueryType,
    pub field: &'static str,
}

/// Structured form of one user query. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryIntent {
    query_type: QueryType,
    target_sites: Vec<SiteId>,
    search_params: SearchParams,
    unsupported_sites: Vec<SiteId>,
}

impl QueryIntent {
    /// Keeps the requested sites the registry knows, in request order and without
    /// duplicates. The rest end up in [`QueryIntent::unsupported_sites`].
    pub fn new(
        query_type: QueryType,
        requested_sites: Vec<SiteId>,
        search_params: SearchParams,
        registry: &SiteRegistry,
    ) -> Result<Self, ValidationError> {
        let mut target_sites: Vec<SiteId> = vec![];
        let mut unsupported_sites: Vec<SiteId> = vec![];

        for site in requested_sites {
            if target_sites.contains(&site) || unsupported_sites.contains(&site) {
                continue;
            }
            match registry.contains(&site) {
                true => target_sites.push(site),
                false => unsupported_sites.push(site),
            }
        }

        if target_sites.is_empty() {
            return Err(ValidationError::NoTargetSites);
        }

        Ok(QueryIntent {
            query_type,
            target_sites,
            search_params,
            unsupported_sites,
        })
    }

    pub fn query_type(&self) -> &QueryType {
        &self.query_type
    }

    pub fn target_sites(&self) -> &[SiteId] {
        &self.target_sites
    }

    pub fn search_params(&self) -> &SearchParams {
        &self.search_params
    }

    pub fn unsupported_sites(&self) -> &[SiteId] {
        &self.unsupported_sites
    }
}

/// Intent as accepted over HTTP, before sites are checked against the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentRequest {
    pub query_type: QueryType,
    pub target_sites: Vec<SiteId>,
    #[serde(default)]
    pub search_params: SearchParams,
}

impl IntentRequest {
    pub fn into_intent(self, registry: &SiteRegistry) -> Result<QueryIntent, ValidationError> {
        QueryIntent::new(
            self.query_type,
            self.target_sites,
            self.search_params,
            registry,
        )
    }
}
