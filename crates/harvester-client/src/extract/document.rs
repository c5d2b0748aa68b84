use std::collections::HashMap;

use harvester_core::error::AppError;
use scraper::{Html, Selector};

use super::css;
use super::header::{HeaderFacts, HeaderParser, element_text};

/// `Label: value` pairs listed on a page, keyed by label.
///
/// The first occurrence of a label wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: HashMap<String, String>,
}

impl Attributes {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut attributes = Self::default();
        for (label, value) in pairs {
            attributes.insert(label.into(), value.into());
        }
        attributes
    }

    fn insert(&mut self, label: String, value: String) {
        self.values.entry(label).or_insert(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn text(&self, label: &str) -> Option<&str> {
        self.values.get(label).map(String::as_str)
    }

    /// Numeric value of an optional field. Unparseable values are logged and
    /// treated as absent.
    pub fn number(&self, label: &str) -> Option<f64> {
        let raw = self.text(label)?;
        let parsed = leading_number(raw);
        if parsed.is_none() {
            tracing::warn!(%label, value = %raw, "Field is not a number, leaving it unset");
        }
        parsed
    }

    pub fn required_number(&self, label: &str) -> Result<f64, AppError> {
        let raw = self
            .text(label)
            .ok_or_else(|| AppError::StructuralParse(format!("field '{label}' not found")))?;
        leading_number(raw).ok_or_else(|| {
            AppError::StructuralParse(format!("field '{label}' is not a number: '{raw}'"))
        })
    }
}

/// Parse the number a value starts with: `"1 250.5 м²"` → `1250.5`.
/// Spaces act as thousands separators and a comma as the decimal point.
pub fn leading_number(value: &str) -> Option<f64> {
    let prefix: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ' ' || *c == '.' || *c == ',')
        .filter(|c| *c != ' ')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    let prefix = prefix.trim_end_matches('.');
    if prefix.is_empty() {
        return None;
    }
    prefix.parse().ok()
}

/// Everything the extractors need from one page, detached from the DOM.
#[derive(Debug, Clone)]
pub struct PageFacts {
    pub header: HeaderFacts,
    pub attributes: Attributes,
    /// Text of the price block, or of the whole body when the block is missing.
    pub price_text: String,
}

/// Parses a raw document into [`PageFacts`].
///
/// The parsed DOM lives only inside [`PageParser::parse`]; nothing borrowed
/// from it escapes.
pub struct PageParser {
    header: HeaderParser,
    attribute_items: Selector,
    price_container: Selector,
    body: Selector,
}

impl PageParser {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            header: HeaderParser::new()?,
            attribute_items: css("p, li")?,
            price_container: css(r#"[data-testid="ad-price-container"]"#)?,
            body: css("body")?,
        })
    }

    pub fn parse(&self, html: &str) -> Result<PageFacts, AppError> {
        let doc = Html::parse_document(html);

        let header = self.header.parse(&doc)?;
        let attributes = self.attributes(&doc);
        let price_text = self.price_text(&doc);

        Ok(PageFacts {
            header,
            attributes,
            price_text,
        })
    }

    fn attributes(&self, doc: &Html) -> Attributes {
        let mut attributes = Attributes::default();
        for el in doc.select(&self.attribute_items) {
            let text = element_text(&el);
            if let Some((label, value)) = text.split_once(": ") {
                let (label, value) = (label.trim(), value.trim());
                if !label.is_empty() && !value.is_empty() {
                    attributes.insert(label.to_string(), value.to_string());
                }
            }
        }
        attributes
    }

    fn price_text(&self, doc: &Html) -> String {
        doc.select(&self.price_container)
            .next()
            .or_else(|| doc.select(&self.body).next())
            .map(|el| element_text(&el))
            .unwrap_or_default()
    }
}
