use harvester_core::error::AppError;
use harvester_core::models::{ApartmentDetails, PropertyDetails, TypeOfProperty};

use super::PropertyExtractor;
use super::document::Attributes;
use super::labels::{self, optional_category, small_int};

/// Apartments: room count, floors, area and furnishing are mandatory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApartmentExtractor;

impl PropertyExtractor for ApartmentExtractor {
    fn property_type(&self) -> TypeOfProperty {
        TypeOfProperty::Apartment
    }

    fn extract(&self, attributes: &Attributes) -> Result<PropertyDetails, AppError> {
        let rooms = small_int(labels::ROOMS, attributes.required_number(labels::ROOMS)?)?;
        let floor = small_int(labels::FLOOR, attributes.required_number(labels::FLOOR)?)?;
        let total_floor = small_int(
            labels::TOTAL_FLOOR,
            attributes.required_number(labels::TOTAL_FLOOR)?,
        )?;
        let total_area_sqm = attributes.required_number(labels::TOTAL_AREA)?.round() as i64;

        let repair = optional_category(attributes, labels::REPAIR, labels::repair)?;
        let building_material = optional_category(
            attributes,
            labels::BUILDING_MATERIAL,
            labels::building_material,
        )?;

        let is_new_building = match attributes.text(labels::HOUSING_MARKET) {
            Some(market) => market != labels::SECONDARY_MARKET,
            None => {
                tracing::warn!(label = labels::HOUSING_MARKET, "Optional field not found");
                false
            }
        };

        let has_furniture = attributes
            .text(labels::FURNISHED)
            .map(|v| v == labels::YES)
            .ok_or_else(|| {
                AppError::StructuralParse(format!("field '{}' not found", labels::FURNISHED))
            })?;

        Ok(PropertyDetails::Apartment(ApartmentDetails {
            rooms,
            floor,
            total_floor,
            total_area_sqm,
            is_new_building,
            has_furniture,
            repair,
            building_material,
        }))
    }
}
