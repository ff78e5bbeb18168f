use std::sync::Arc;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::domain::{
    price::Currency,
    record::ExtractedRecord,
    site::{SiteId, SiteRegistry},
    workflow::PageSnapshot,
};

#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("no selector rules for site {0}")]
    UnknownSite(SiteId),
    #[error("invalid {which} selector `{selector}` for {site}: {reason}")]
    InvalidSelector {
        site: SiteId,
        which: &'static str,
        selector: String,
        reason: String,
    },
    #[error("no page was captured for {0}")]
    PageUnavailable(SiteId),
}

/// Pulls listings out of a results page using the site's selector rules.
pub struct Extractor {
    registry: Arc<SiteRegistry>,
}

struct CompiledRules {
    container: Selector,
    title: Selector,
    price: Selector,
    currency: Currency,
    max_results: usize,
}

impl Extractor {
    pub fn new(registry: Arc<SiteRegistry>) -> Self {
        Extractor { registry }
    }

    /// One pass over the containers present in `document`. No containers means
    /// an empty iterator. Containers holding neither a title nor a price are
    /// layout filler and are passed over.
    pub fn extract<'a>(
        &self,
        site: &SiteId,
        document: &'a Html,
    ) -> Result<impl Iterator<Item = ExtractedRecord> + 'a, ExtractionError> {
        let rules = self.compile(site)?;
        let site = site.clone();
        let scraped_at = Utc::now();

        let containers: Vec<ElementRef<'a>> = document.select(&rules.container).collect();
        let limit = rules.max_results;

        Ok(containers
            .into_iter()
            .filter_map(move |container| read_container(&site, container, &rules, scraped_at))
            .take(limit))
    }

    /// Parses the captured page and collects its records.
    pub fn harvest(
        &self,
        site: &SiteId,
        page: Option<&PageSnapshot>,
    ) -> Result<Vec<ExtractedRecord>, ExtractionError> {
        let page = page.ok_or_else(|| ExtractionError::PageUnavailable(site.clone()))?;
        let document = Html::parse_document(&page.html);
        let records = self.extract(site, &document)?.collect();
        Ok(records)
    }

    fn compile(&self, site: &SiteId) -> Result<CompiledRules, ExtractionError> {
        let profile = self
            .registry
            .get(site)
            .ok_or_else(|| ExtractionError::UnknownSite(site.clone()))?;
        let parse = |which: &'static str, selector: &str| {
            Selector::parse(selector).map_err(|e| ExtractionError::InvalidSelector {
                site: site.clone(),
                which,
                selector: selector.to_string(),
                reason: format!("{:?}", e),
            })
        };

        Ok(CompiledRules {
            container: parse("container", &profile.selectors.container)?,
            title: parse("title", &profile.selectors.title)?,
            price: parse("price", &profile.selectors.price)?,
            currency: profile.currency,
            max_results: profile.max_results,
        })
    }
}

fn read_container(
    site: &SiteId,
    container: ElementRef,
    rules: &CompiledRules,
    scraped_at: DateTime<Utc>,
) -> Option<ExtractedRecord> {
    let title = first_text(container, &rules.title);
    let raw_price = first_text(container, &rules.price);
    if title.is_none() && raw_price.is_none() {
        return None;
    }

    let price = raw_price
        .as_deref()
        .and_then(|raw| rules.currency.normalizer().normalize(raw));
    let raw_price = match price {
        Some(_) => None,
        None => raw_price,
    };

    Some(ExtractedRecord {
        site: site.clone(),
        title,
        price,
        raw_price,
        scraped_at,
    })
}

fn first_text(container: ElementRef, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scraper::Html;

    use crate::domain::{
        price::{Currency, Money},
        site::{SelectorRules, SiteId, SiteProfile, SiteRegistry},
        workflow::PageSnapshot,
    };

    use super::{ExtractionError, Extractor};

    const FLIPKART_PAGE: &str = r#"
        <html><body>
          <div class="_1AtVbE">
            <a class="s1Q9rs" href="/p/1">Philips BT1232   Trimmer</a>
            <div class="_30jeq3">₹1,149</div>
          </div>
          <div class="_1AtVbE">
            <a class="s1Q9rs" href="/p/2">Mi Beard Trimmer 2C</a>
            <div class="_30jeq3">₹899</div>
          </div>
          <div class="_1AtVbE">
            <a class="s1Q9rs" href="/p/3">Nova Prime Series Trimmer</a>
          </div>
          <div class="_1AtVbE"><span>sponsored</span></div>
        </body></html>
    "#;

    fn extractor() -> Extractor {
        Extractor::new(Arc::new(SiteRegistry::builtin()))
    }

    #[test]
    fn reads_listing_cards_in_page_order() {
        let document = Html::parse_document(FLIPKART_PAGE);
        let records: Vec<_> = extractor()
            .extract(&SiteId::new("flipkart"), &document)
            .unwrap()
            .collect();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title.as_deref(), Some("Philips BT1232 Trimmer"));
        assert_eq!(records[0].price, Some(Money::new(1149.0, Currency::Inr)));
        assert_eq!(records[1].price, Some(Money::new(899.0, Currency::Inr)));
        assert!(records.iter().all(|r| r.site == SiteId::new("flipkart")));
    }

    #[test]
    fn missing_fields_stay_absent() {
        let document = Html::parse_document(FLIPKART_PAGE);
        let records: Vec<_> = extractor()
            .extract(&SiteId::new("flipkart"), &document)
            .unwrap()
            .collect();

        assert_eq!(records[2].title.as_deref(), Some("Nova Prime Series Trimmer"));
        assert_eq!(records[2].price, None);
        assert_eq!(records[2].raw_price, None);
    }

    #[test]
    fn unparsable_price_keeps_raw_text() {
        let document = Html::parse_document(
            r#"<li class="s-item"><div class="s-item__title">Pixel 8</div>
               <span class="s-item__price">See price</span></li>"#,
        );
        let records: Vec<_> = extractor()
            .extract(&SiteId::new("ebay"), &document)
            .unwrap()
            .collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, None);
        assert_eq!(records[0].raw_price.as_deref(), Some("See price"));
    }

    #[test]
    fn page_without_containers_yields_nothing() {
        let document = Html::parse_document("<html><body><p>No results</p></body></html>");
        let mut records = extractor()
            .extract(&SiteId::new("amazon"), &document)
            .unwrap();

        assert!(records.next().is_none());
    }

    #[test]
    fn results_are_capped_per_site() {
        let cards = (0..8)
            .map(|i| format!(r#"<div class="s-result-item"><h2>Trimmer {}</h2></div>"#, i))
            .collect::<String>();
        let document = Html::parse_document(&cards);

        let count = extractor()
            .extract(&SiteId::new("amazon"), &document)
            .unwrap()
            .count();

        assert_eq!(count, 5);
    }

    #[test]
    fn broken_selector_is_an_extraction_error() {
        let registry = SiteRegistry::builtin().with_extra(vec![SiteProfile {
            id: SiteId::new("broken"),
            display_name: "Broken".to_string(),
            base_url: "https://broken.example".to_string(),
            search_url: Some("https://broken.example/?q={query}".to_string()),
            search_box: None,
            flight_form: None,
            selectors: SelectorRules {
                container: "div[[".to_string(),
                title: "h2".to_string(),
                price: ".price".to_string(),
            },
            currency: Currency::Usd,
            max_results: 5,
        }]);
        let extractor = Extractor::new(Arc::new(registry));
        let document = Html::parse_document("<div></div>");

        let result = extractor.extract(&SiteId::new("broken"), &document);

        assert!(matches!(
            result.err(),
            Some(ExtractionError::InvalidSelector { which: "container", .. })
        ));
    }

    #[test]
    fn missing_page_is_an_extraction_error() {
        let site = SiteId::new("amazon");

        assert_eq!(
            extractor().harvest(&site, None),
            Err(ExtractionError::PageUnavailable(site.clone()))
        );
        assert_eq!(
            extractor()
                .harvest(&site, Some(&PageSnapshot::new("<p></p>")))
                .unwrap(),
            vec![]
        );
    }
}
