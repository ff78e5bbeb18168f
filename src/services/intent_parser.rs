use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
    command::ValidationError,
    intent::{QueryIntent, QueryType, SearchParams},
    price::{Currency, Money},
    site::{SiteId, SiteRegistry},
};

#[derive(Debug, Error)]
pub enum IntentParseError {
    /// The model answered, but not with a usable intent.
    #[error("could not parse intent: {0}")]
    Parse(String),
    /// The model could not be reached or refused the request.
    #[error("intent provider failed: {0}")]
    Provider(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// A chat model that answers one prompt with one block of text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, IntentParseError>;
}

#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(&self, query: &str) -> Result<QueryIntent, IntentParseError>;
}

/// Turns a free-text query into a [`QueryIntent`] by asking a language model
/// for JSON.
pub struct LlmIntentParser {
    provider: Arc<dyn CompletionProvider>,
    registry: Arc<SiteRegistry>,
    attempts: u32,
    base_backoff: Duration,
}

impl LlmIntentParser {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        registry: Arc<SiteRegistry>,
        attempts: u32,
    ) -> Self {
        LlmIntentParser {
            provider,
            registry,
            attempts: attempts.max(1),
            base_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    fn prompt(&self, query: &str) -> String {
        let sites = self
            .registry
            .ids()
            .map(SiteId::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"Analyze this user query: "{query}"
Return a JSON object with:
- query_type (product_search, price_comparison, flight_search)
- target_websites (list of sites, chosen from: {sites})
- search_params (object with category, specific_product, budget, products, origin, destination, date)
Only return the JSON object.
Example response:
{{
    "query_type": "product_search",
    "target_websites": ["amazon", "flipkart"],
    "search_params": {{"category": "trimmers", "budget": "₹1000", "specific_product": null}}
}}"#
        )
    }

    /// Doubles per attempt, up to 64 times the base.
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1_u32 << attempt.min(6))
    }

    async fn complete_with_retries(&self, prompt: &str) -> Result<String, IntentParseError> {
        let mut attempt = 0;
        loop {
            match self.provider.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(IntentParseError::Provider(message)) if attempt + 1 < self.attempts => {
                    let backoff = self.backoff(attempt);
                    let jitter = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 4);
                    log::warn!(
                        "Intent provider attempt {}/{} failed: {}",
                        attempt + 1,
                        self.attempts,
                        message
                    );
                    tokio::time::sleep(backoff + Duration::from_millis(jitter)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl IntentParser for LlmIntentParser {
    async fn parse(&self, query: &str) -> Result<QueryIntent, IntentParseError> {
        log::info!("Parsing query: {}", query);
        let answer = self.complete_with_retries(&self.prompt(query)).await?;

        let raw = RawIntent::from_answer(&answer)?;
        let intent = raw.into_intent(&self.registry)?;
        log::info!(
            "Query parsed as {} for {:?}",
            intent.query_type(),
            intent.target_sites()
        );
        Ok(intent)
    }
}

/// Shape of the model's answer. Every field is optional because models leave
/// things out.
#[derive(Debug, Default, Deserialize)]
struct RawIntent {
    #[serde(default)]
    query_type: Option<String>,
    #[serde(default, alias = "target_sites")]
    target_websites: Vec<String>,
    #[serde(default)]
    search_params: RawSearchParams,
}

#[derive(Debug, Default, Deserialize)]
struct RawSearchParams {
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "keyword")]
    specific_product: Option<String>,
    #[serde(default, alias = "budget_max")]
    budget: Option<serde_json::Value>,
    #[serde(default)]
    products: Vec<String>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl RawIntent {
    /// Models sometimes wrap the object in prose or a code fence, so only the
    /// outermost braces are decoded.
    fn from_answer(answer: &str) -> Result<Self, IntentParseError> {
        let start = answer.find('{');
        let end = answer.rfind('}');
        let body = match (start, end) {
            (Some(start), Some(end)) if start < end => &answer[start..=end],
            _ => {
                return Err(IntentParseError::Parse(format!(
                    "no JSON object in answer: {}",
                    answer
                )))
            }
        };
        serde_json::from_str(body).map_err(|e| IntentParseError::Parse(e.to_string()))
    }

    fn into_intent(self, registry: &SiteRegistry) -> Result<QueryIntent, IntentParseError> {
        let query_type = self
            .query_type
            .map(QueryType::from)
            .ok_or_else(|| IntentParseError::Parse("answer has no query_type".to_string()))?;
        let sites = self
            .target_websites
            .iter()
            .map(|site| SiteId::new(site))
            .collect();

        let params = self.search_params;
        let keyword = params
            .specific_product
            .filter(|p| !p.trim().is_empty())
            .or(params.category);
        let budget_max = params.budget.as_ref().and_then(budget_from_json);

        let search_params = SearchParams {
            keyword,
            products: params.products,
            budget_max,
            origin: params.origin,
            destination: params.destination,
            date: params.date,
        };

        Ok(QueryIntent::new(query_type, sites, search_params, registry)?)
    }
}

/// Budgets come back as `"₹1000"`, `"1,000"` or a bare number. Bare numbers are
/// read as rupees, the currency of the default sites.
fn budget_from_json(value: &serde_json::Value) -> Option<Money> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(|amount| Money::new(amount, Currency::Inr)),
        serde_json::Value::String(label) => Money::parse_label(label, Currency::Inr),
        _ => None,
    }
}
