use harvester_core::error::AppError;
use harvester_core::models::{CommerceDetails, PropertyDetails, TypeOfProperty};

use super::PropertyExtractor;
use super::document::Attributes;
use super::labels::{self, land_area_sqm, optional_category, small_int};

/// Commercial premises: every field except the price is optional.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommerceExtractor;

impl PropertyExtractor for CommerceExtractor {
    fn property_type(&self) -> TypeOfProperty {
        TypeOfProperty::Commerce
    }

    fn extract(&self, attributes: &Attributes) -> Result<PropertyDetails, AppError> {
        let floor = attributes
            .number(labels::FLOOR)
            .map(|v| small_int(labels::FLOOR, v))
            .transpose()?;
        let total_floor = attributes
            .number(labels::TOTAL_FLOOR)
            .map(|v| small_int(labels::TOTAL_FLOOR, v))
            .transpose()?;

        Ok(PropertyDetails::Commerce(CommerceDetails {
            floor,
            total_floor,
            total_area_sqm: attributes
                .number(labels::TOTAL_AREA)
                .map(|v| v.round() as i64),
            land_area_sqm: land_area_sqm(attributes, labels::COMMERCE_LAND_AREA),
            repair: optional_category(attributes, labels::REPAIR, labels::repair)?,
            purpose: optional_category(attributes, labels::PURPOSE, labels::purpose)?,
        }))
    }
}
