use harvester_core::error::AppError;
use harvester_core::models::{TypeOfProperty, TypeOfService};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::css;
use crate::text::normalize_whitespace;

const SITE_ORIGIN: &str = "https://www.olx.uz";
const DESCRIPTION_HEADING: &str = "Описание";
const ID_MARKER: &str = "ID:";

/// Fields every listing page carries, whatever the property type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFacts {
    pub type_of_property: TypeOfProperty,
    pub type_of_service: TypeOfService,
    pub organization_url: String,
    pub title: String,
    pub description: String,
    pub external_id: String,
}

/// Reads [`HeaderFacts`] out of a parsed listing page.
pub struct HeaderParser {
    breadcrumbs: Selector,
    breadcrumb_items: Selector,
    user_ads: Selector,
    title: Selector,
    digits: Regex,
}

impl HeaderParser {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            breadcrumbs: css(r#"ol[data-testid="breadcrumbs"]"#)?,
            breadcrumb_items: css(r#"li[data-testid="breadcrumb-item"]"#)?,
            user_ads: css(r#"a[name="user_ads"]"#)?,
            title: css("title")?,
            digits: Regex::new(r"\d+").map_err(|e| AppError::Generic(e.to_string()))?,
        })
    }

    pub fn parse(&self, doc: &Html) -> Result<HeaderFacts, AppError> {
        let (type_of_property, type_of_service) = self.property_and_service(doc)?;
        Ok(HeaderFacts {
            type_of_property,
            type_of_service,
            organization_url: self.organization_url(doc)?,
            title: self.title(doc)?,
            description: self.description(doc)?,
            external_id: self.external_id(doc)?,
        })
    }

    fn property_and_service(
        &self,
        doc: &Html,
    ) -> Result<(TypeOfProperty, TypeOfService), AppError> {
        let breadcrumbs = doc
            .select(&self.breadcrumbs)
            .next()
            .ok_or_else(|| AppError::StructuralParse("breadcrumbs not found".into()))?;

        let items: Vec<String> = breadcrumbs
            .select(&self.breadcrumb_items)
            .map(|li| element_text(&li).to_lowercase())
            .collect();
        if items.len() < 4 {
            return Err(AppError::StructuralParse(format!(
                "too few breadcrumb items: {}",
                items.len()
            )));
        }

        let service = match items[3].as_str() {
            "продажа" | "обмен" => TypeOfService::Sale,
            "аренда долгосрочная" => TypeOfService::Rent,
            other => {
                return Err(AppError::StructuralParse(format!(
                    "unrecognized service type '{other}'"
                )));
            }
        };

        let property = match items[2].as_str() {
            "квартиры" => TypeOfProperty::Apartment,
            "коммерческие помещения" => TypeOfProperty::Commerce,
            "дома" => TypeOfProperty::House,
            other => return Err(AppError::UnknownPropertyType(other.to_string())),
        };

        Ok((property, service))
    }

    fn organization_url(&self, doc: &Html) -> Result<String, AppError> {
        let href = doc
            .select(&self.user_ads)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::StructuralParse("organization link not found".into()))?;

        if href.starts_with('/') {
            Ok(format!("{SITE_ORIGIN}{href}"))
        } else if let Some(rest) = href.strip_prefix("http://") {
            Ok(format!("https://{rest}"))
        } else {
            Ok(href.to_string())
        }
    }

    fn title(&self, doc: &Html) -> Result<String, AppError> {
        doc.select(&self.title)
            .next()
            .map(|t| element_text(&t))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::StructuralParse("title not found".into()))
    }

    /// The first `div` inside the block that holds the "Описание" heading.
    fn description(&self, doc: &Html) -> Result<String, AppError> {
        let heading = doc
            .root_element()
            .descendants()
            .find(|node| {
                node.value()
                    .as_text()
                    .is_some_and(|t| t.trim() == DESCRIPTION_HEADING)
            })
            .ok_or_else(|| AppError::StructuralParse("description heading not found".into()))?;

        heading
            .parent()
            .and_then(|heading_el| heading_el.parent())
            .and_then(ElementRef::wrap)
            .and_then(|block| {
                block
                    .descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "div")
            })
            .map(|div| element_text(&div))
            .ok_or_else(|| AppError::StructuralParse("description block not found".into()))
    }

    fn external_id(&self, doc: &Html) -> Result<String, AppError> {
        let marker = doc
            .root_element()
            .descendants()
            .find(|node| {
                node.value()
                    .as_text()
                    .is_some_and(|t| t.trim_start().starts_with(ID_MARKER))
            })
            .ok_or_else(|| AppError::StructuralParse("ID marker not found".into()))?;

        let text = marker
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| element_text(&el))
            .unwrap_or_default();

        self.digits
            .find(&text)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| AppError::StructuralParse(format!("no digits in ID marker '{text}'")))
    }
}

pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}
