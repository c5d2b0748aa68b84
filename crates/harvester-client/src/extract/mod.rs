//! Listing extraction: one shared header pass, then a per-property-type variant.

pub mod apartment;
pub mod commerce;
pub mod document;
pub mod header;
pub mod house;
pub mod labels;
pub mod price;
pub mod registry;

use harvester_core::error::AppError;
use harvester_core::models::{PropertyDetails, TypeOfProperty};
use scraper::Selector;

pub use apartment::ApartmentExtractor;
pub use commerce::CommerceExtractor;
pub use document::{Attributes, PageFacts, PageParser};
pub use house::HouseExtractor;
pub use registry::ExtractorRegistry;

/// Type-specific half of extraction.
///
/// Mandatory fields missing from `attributes` fail with
/// [`AppError::StructuralParse`]; optional ones are left unset.
pub trait PropertyExtractor: Send + Sync {
    fn property_type(&self) -> TypeOfProperty;

    fn extract(&self, attributes: &Attributes) -> Result<PropertyDetails, AppError>;
}

pub(crate) fn css(selector: &str) -> Result<Selector, AppError> {
    Selector::parse(selector)
        .map_err(|e| AppError::Generic(format!("invalid selector {selector:?}: {e:?}")))
}
