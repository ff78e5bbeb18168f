use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    price::{Currency, Money},
    site::SiteId,
};

/// One listing scraped from a results page. Missing values stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordRow", from = "RecordRow")]
pub struct ExtractedRecord {
    pub site: SiteId,
    pub title: Option<String>,
    pub price: Option<Money>,
    /// Price text as shown on the page, kept when it could not be normalized.
    pub raw_price: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ExtractedRecord {
    pub fn title_contains(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title
            .as_ref()
            .is_some_and(|title| title.to_lowercase().contains(&term))
    }
}

#[derive(Serialize, Deserialize)]
struct RecordRow {
    site: SiteId,
    title: Option<String>,
    price: Option<f64>,
    currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_price: Option<String>,
    timestamp: DateTime<Utc>,
}

impl From<ExtractedRecord> for RecordRow {
    fn from(value: ExtractedRecord) -> Self {
        RecordRow {
            site: value.site,
            title: value.title,
            price: value.price.map(|p| p.amount),
            currency: value.price.map(|p| p.currency),
            raw_price: value.raw_price,
            timestamp: value.scraped_at,
        }
    }
}

impl From<RecordRow> for ExtractedRecord {
    fn from(value: RecordRow) -> Self {
        let price = match (value.price, value.currency) {
            (Some(amount), Some(currency)) => Some(Money::new(amount, currency)),
            _ => None,
        };

        ExtractedRecord {
            site: value.site,
            title: value.title,
            price,
            raw_price: value.raw_price,
            scraped_at: value.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::domain::{
        price::{Currency, Money},
        site::SiteId,
    };

    use super::ExtractedRecord;

    #[test]
    fn serializes_as_flat_row() {
        let record = ExtractedRecord {
            site: SiteId::new("flipkart"),
            title: Some("Philips BT1232 Trimmer".to_string()),
            price: Some(Money::new(899.0, Currency::Inr)),
            raw_price: None,
            scraped_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
        };

        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "site": "flipkart",
                "title": "Philips BT1232 Trimmer",
                "price": 899.0,
                "currency": "INR",
                "timestamp": "2024-05-01T10:30:00Z"
            })
        );
    }

    #[test]
    fn title_match_ignores_case() {
        let record = ExtractedRecord {
            site: SiteId::new("amazon"),
            title: Some("Beard TRIMMER for men".to_string()),
            price: None,
            raw_price: Some("N/A".to_string()),
            scraped_at: Utc::now(),
        };

        assert!(record.title_contains("trimmer"));
        assert!(!record.title_contains("laptop"));
    }
}
