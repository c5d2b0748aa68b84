use harvester_core::error::AppError;
use harvester_core::traits::CurrencyConverter;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Usd,
    Uzs,
}

/// Asking price as written on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub amount: i64,
    pub currency: Currency,
}

impl Price {
    /// Amount in whole US dollars.
    pub async fn to_usd<C: CurrencyConverter>(&self, converter: &C) -> Result<i64, AppError> {
        match self.currency {
            Currency::Usd => Ok(self.amount),
            Currency::Uzs => {
                let usd = converter.uzs_to_usd(self.amount).await?;
                tracing::debug!(uzs = self.amount, usd, "Converted price");
                Ok(usd)
            }
        }
    }
}

/// Finds the asking price in page text.
///
/// `у.е.` (conventional units) is checked first, then `$` or `сум`.
pub struct PriceParser {
    conventional: Regex,
    explicit: Regex,
}

impl PriceParser {
    pub fn new() -> Result<Self, AppError> {
        let compile = |pattern: &str| Regex::new(pattern).map_err(|e| AppError::Generic(e.to_string()));
        Ok(Self {
            conventional: compile(r"(\d[\d ]*)\s*у\.е\.")?,
            explicit: compile(r"(\d[\d ]*)\s*(\$|сум)")?,
        })
    }

    pub fn parse(&self, text: &str) -> Result<Price, AppError> {
        let text = crate::text::normalize_whitespace(text);

        if let Some(caps) = self.conventional.captures(&text) {
            return Ok(Price {
                amount: amount(&caps[1])?,
                currency: Currency::Usd,
            });
        }

        if let Some(caps) = self.explicit.captures(&text) {
            let currency = if &caps[2] == "сум" {
                Currency::Uzs
            } else {
                Currency::Usd
            };
            return Ok(Price {
                amount: amount(&caps[1])?,
                currency,
            });
        }

        Err(AppError::StructuralParse("price not found".into()))
    }
}

fn amount(digits: &str) -> Result<i64, AppError> {
    let compact: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .parse()
        .map_err(|_| AppError::StructuralParse(format!("price is not an integer: '{digits}'")))
}
