use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Inr,
    Usd,
    Eur,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
            Currency::Eur => "€",
        }
    }

    /// Detects the currency a price label is written in, if it carries a marker.
    pub fn detect(label: &str) -> Option<Currency> {
        let upper = label.to_uppercase();
        if label.contains('₹') || upper.contains("INR") || upper.trim_start().starts_with("RS") {
            Some(Currency::Inr)
        } else if label.contains('€') || upper.contains("EUR") {
            Some(Currency::Eur)
        } else if label.contains('$') || upper.contains("USD") {
            Some(Currency::Usd)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: f64, currency: Currency) -> Self {
        Money { amount, currency }
    }

    /// Parses a free-form budget such as `"₹1000"`, `"$250"` or `"1,500"`.
    /// Labels without a currency marker are read in `fallback`.
    pub fn parse_label(label: &str, fallback: Currency) -> Option<Money> {
        let currency = Currency::detect(label).unwrap_or(fallback);
        currency.normalizer().normalize(label)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.amount)
    }
}

/// Locale-specific price parsing for one site.
pub trait PriceNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> Option<Money>;
}

/// `₹1,00,000` and `Rs. 45,999.00`. Lakh grouping puts commas at uneven
/// positions, so they are dropped rather than validated.
pub struct IndianRupee;

/// `$1,299.99`, ranges like `$10.00 to $20.00` resolve to the lower bound.
pub struct UsDollar;

/// `1.299,99 €`: dot groups thousands, comma marks decimals.
pub struct Euro;

impl PriceNormalizer for IndianRupee {
    fn normalize(&self, raw: &str) -> Option<Money> {
        let token = first_numeric_token(raw)?;
        let amount = token.replace(',', "").parse().ok()?;
        Some(Money::new(amount, Currency::Inr))
    }
}

impl PriceNormalizer for UsDollar {
    fn normalize(&self, raw: &str) -> Option<Money> {
        let token = first_numeric_token(raw)?;
        let amount = token.replace(',', "").parse().ok()?;
        Some(Money::new(amount, Currency::Usd))
    }
}

impl PriceNormalizer for Euro {
    fn normalize(&self, raw: &str) -> Option<Money> {
        let token = first_numeric_token(raw)?;
        let amount = token.replace('.', "").replace(',', ".").parse().ok()?;
        Some(Money::new(amount, Currency::Eur))
    }
}

impl Currency {
    pub fn normalizer(&self) -> &'static dyn PriceNormalizer {
        match self {
            Currency::Inr => &IndianRupee,
            Currency::Usd => &UsDollar,
            Currency::Eur => &Euro,
        }
    }
}

fn first_numeric_token(raw: &str) -> Option<&str> {
    let start = raw.find(|c: char| c.is_ascii_digit())?;
    let rest = &raw[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(rest.len());

    let token = rest[..end].trim_end_matches([',', '.']);
    match token.is_empty() {
        true => None,
        false => Some(token),
    }
}
