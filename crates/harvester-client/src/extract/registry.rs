use std::collections::HashMap;
use std::sync::Arc;

use harvester_core::error::AppError;
use harvester_core::models::{
    Enrichment, Listing, ListingHeader, Source, TypeOfProperty, compute_hash,
};
use harvester_core::traits::{CurrencyConverter, Enricher, ListingExtractor};

use super::document::{PageFacts, PageParser};
use super::price::PriceParser;
use super::{ApartmentExtractor, CommerceExtractor, HouseExtractor, PropertyExtractor};
use crate::text::clean_text;

/// Dispatches a listing page to the variant registered for its property type.
///
/// The table is built once at startup and shared by clones.
#[derive(Clone)]
pub struct ExtractorRegistry<En, C> {
    variants: Arc<HashMap<TypeOfProperty, Arc<dyn PropertyExtractor>>>,
    pages: Arc<PageParser>,
    prices: Arc<PriceParser>,
    enricher: En,
    converter: C,
}

impl<En, C> ExtractorRegistry<En, C>
where
    En: Enricher,
    C: CurrencyConverter,
{
    /// Registry with no variants; every page fails with `UnknownPropertyType`.
    pub fn new(enricher: En, converter: C) -> Result<Self, AppError> {
        Ok(Self {
            variants: Arc::new(HashMap::new()),
            pages: Arc::new(PageParser::new()?),
            prices: Arc::new(PriceParser::new()?),
            enricher,
            converter,
        })
    }

    /// Registry with the apartment, commerce and house variants.
    pub fn with_default_variants(enricher: En, converter: C) -> Result<Self, AppError> {
        Ok(Self::new(enricher, converter)?
            .register(ApartmentExtractor)
            .register(CommerceExtractor)
            .register(HouseExtractor))
    }

    pub fn register<X: PropertyExtractor + 'static>(mut self, extractor: X) -> Self {
        Arc::make_mut(&mut self.variants).insert(extractor.property_type(), Arc::new(extractor));
        self
    }

    pub fn registered(&self) -> Vec<TypeOfProperty> {
        let mut types: Vec<_> = self.variants.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    async fn enrichment(&self, url: &str, page: &PageFacts) -> Enrichment {
        let text = clean_text(&format!(
            "{} - {}",
            page.header.title, page.header.description
        ));
        match self.enricher.enrich(&text).await {
            Ok(Some(enrichment)) => enrichment,
            Ok(None) => Enrichment::default(),
            Err(e) => {
                tracing::error!(%url, error = %e, kind = e.kind(), "Enrichment failed, continuing without it");
                Enrichment::default()
            }
        }
    }
}

impl<En, C> ListingExtractor for ExtractorRegistry<En, C>
where
    En: Enricher,
    C: CurrencyConverter,
{
    async fn extract(&self, url: &str, html: &str) -> Result<Listing, AppError> {
        let page = self.pages.parse(html)?;

        let property_type = page.header.type_of_property;
        let variant = self
            .variants
            .get(&property_type)
            .cloned()
            .ok_or_else(|| AppError::UnknownPropertyType(property_type.to_string()))?;

        let enrichment = self.enrichment(url, &page).await;
        let details = variant.extract(&page.attributes)?;
        let price = self.prices.parse(&page.price_text)?;
        let total_price_usd = price.to_usd(&self.converter).await?;

        let PageFacts { header, .. } = page;
        Ok(Listing {
            header: ListingHeader {
                type_of_property: header.type_of_property,
                type_of_service: header.type_of_service,
                source: Source::Olx,
                external_id: header.external_id,
                organization_url: header.organization_url,
                title: header.title,
                description: header.description,
                url: url.to_string(),
                polygon_id: enrichment.polygon_id,
                polygon_keyword: enrichment.keyword,
            },
            total_price_usd,
            details,
            content_hash: compute_hash(html),
        })
    }
}
