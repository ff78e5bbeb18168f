use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use super::price::Currency;

const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SiteId(String);

impl SiteId {
    pub fn new(id: &str) -> Self {
        SiteId(id.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SiteId {
    fn from(value: String) -> Self {
        SiteId::new(&value)
    }
}

impl From<SiteId> for String {
    fn from(value: SiteId) -> Self {
        value.0
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorRules {
    pub container: String,
    pub title: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightForm {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

/// Static description of one target site. Adding a site means adding one of
/// these, either to [`SiteRegistry::builtin`] or to the `sites` configuration
/// section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub id: SiteId,
    pub display_name: String,
    pub base_url: String,
    /// Search page URL with a `{query}` placeholder.
    #[serde(default)]
    pub search_url: Option<String>,
    /// Present when the site only applies a query after it is typed and submitted.
    #[serde(default)]
    pub search_box: Option<String>,
    #[serde(default)]
    pub flight_form: Option<FlightForm>,
    pub selectors: SelectorRules,
    pub currency: Currency,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl SiteProfile {
    pub fn search_url_for(&self, terms: &str) -> Option<String> {
        let encoded: String = form_urlencoded::byte_serialize(terms.as_bytes()).collect();
        self.search_url
            .as_ref()
            .map(|template| template.replace("{query}", &encoded))
    }
}

#[derive(Debug, Clone)]
pub struct SiteRegistry {
    profiles: Vec<SiteProfile>,
}

impl SiteRegistry {
    pub fn new(profiles: Vec<SiteProfile>) -> Self {
        SiteRegistry { profiles }
    }

    pub fn builtin() -> Self {
        SiteRegistry::new(vec![
            SiteProfile {
                id: SiteId::new("amazon"),
                display_name: "Amazon".to_string(),
                base_url: "https://www.amazon.in".to_string(),
                search_url: Some("https://www.amazon.in/s?k={query}".to_string()),
                search_box: None,
                flight_form: None,
                selectors: SelectorRules {
                    container: ".s-result-item".to_string(),
                    title: "h2".to_string(),
                    price: ".a-price .a-offscreen".to_string(),
                },
                currency: Currency::Inr,
                max_results: DEFAULT_MAX_RESULTS,
            },
            SiteProfile {
                id: SiteId::new("flipkart"),
                display_name: "Flipkart".to_string(),
                base_url: "https://www.flipkart.com".to_string(),
                search_url: Some("https://www.flipkart.com/search?q={query}".to_string()),
                search_box: Some("input[name='q']".to_string()),
                flight_form: None,
                selectors: SelectorRules {
                    container: "div._1AtVbE".to_string(),
                    title: "a.s1Q9rs".to_string(),
                    price: "div._30jeq3".to_string(),
                },
                currency: Currency::Inr,
                max_results: DEFAULT_MAX_RESULTS,
            },
            SiteProfile {
                id: SiteId::new("ebay"),
                display_name: "eBay".to_string(),
                base_url: "https://www.ebay.com".to_string(),
                search_url: Some("https://www.ebay.com/sch/i.html?_nkw={query}".to_string()),
                search_box: None,
                flight_form: None,
                selectors: SelectorRules {
                    container: "li.s-item".to_string(),
                    title: ".s-item__title".to_string(),
                    price: ".s-item__price".to_string(),
                },
                currency: Currency::Usd,
                max_results: DEFAULT_MAX_RESULTS,
            },
            SiteProfile {
                id: SiteId::new("makemytrip"),
                display_name: "MakeMyTrip".to_string(),
                base_url: "https://www.makemytrip.com/flights/".to_string(),
                search_url: None,
                search_box: None,
                flight_form: Some(FlightForm {
                    origin: "input#fromCity".to_string(),
                    destination: "input#toCity".to_string(),
                    date: "input#departure".to_string(),
                }),
                selectors: SelectorRules {
                    container: "div.listingCard".to_string(),
                    title: ".airlineName".to_string(),
                    price: ".clusterViewPrice".to_string(),
                },
                currency: Currency::Inr,
                max_results: DEFAULT_MAX_RESULTS,
            },
        ])
    }

    /// Adds `extra` profiles, replacing any builtin with the same id.
    pub fn with_extra(mut self, extra: Vec<SiteProfile>) -> Self {
        for profile in extra {
            match self.profiles.iter_mut().find(|p| p.id == profile.id) {
                Some(existing) => *existing = profile,
                None => self.profiles.push(profile),
            }
        }
        self
    }

    pub fn get(&self, site: &SiteId) -> Option<&SiteProfile> {
        self.profiles.iter().find(|p| &p.id == site)
    }

    pub fn contains(&self, site: &SiteId) -> bool {
        self.get(site).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SiteId> {
        self.profiles.iter().map(|p| &p.id)
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        SiteRegistry::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::{SiteId, SiteRegistry};

    #[test]
    fn site_ids_are_case_insensitive() {
        assert_eq!(SiteId::new(" Amazon "), SiteId::new("amazon"));
    }

    #[test]
    fn search_url_encodes_terms() {
        let registry = SiteRegistry::builtin();
        let amazon = registry.get(&SiteId::new("amazon")).unwrap();

        assert_eq!(
            amazon.search_url_for("beard trimmer").as_deref(),
            Some("https://www.amazon.in/s?k=beard+trimmer")
        );
    }

    #[test]
    fn extra_profiles_override_builtins() {
        let mut ebay = SiteRegistry::builtin()
            .get(&SiteId::new("ebay"))
            .cloned()
            .unwrap();
        ebay.max_results = 20;

        let registry = SiteRegistry::builtin().with_extra(vec![ebay]);
        let count = registry.ids().filter(|id| id.as_str() == "ebay").count();

        assert_eq!(count, 1);
        assert_eq!(registry.get(&SiteId::new("ebay")).unwrap().max_results, 20);
    }
}
