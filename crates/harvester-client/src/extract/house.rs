use harvester_core::error::AppError;
use harvester_core::models::{HouseDetails, PropertyDetails, Repair, TypeOfProperty};

use super::PropertyExtractor;
use super::document::Attributes;
use super::labels::{self, land_area_sqm, optional_category, small_int};

/// Houses: all optional; renovation is matched loosely.
#[derive(Debug, Default, Clone, Copy)]
pub struct HouseExtractor;

impl HouseExtractor {
    /// `Состояние дома` takes precedence over `Ремонт` when both are present.
    fn repair(attributes: &Attributes) -> Option<Repair> {
        let mut repair = None;
        for label in [labels::REPAIR, labels::HOUSE_CONDITION] {
            let Some(text) = attributes.text(label) else {
                continue;
            };
            match labels::repair_fuzzy(text) {
                Some(found) => repair = Some(found),
                None => tracing::warn!(%label, value = %text, "Unrecognized house condition"),
            }
        }
        repair
    }
}

impl PropertyExtractor for HouseExtractor {
    fn property_type(&self) -> TypeOfProperty {
        TypeOfProperty::House
    }

    fn extract(&self, attributes: &Attributes) -> Result<PropertyDetails, AppError> {
        let rooms = attributes
            .number(labels::ROOMS)
            .map(|v| small_int(labels::ROOMS, v))
            .transpose()?;
        let total_floor = attributes
            .number(labels::TOTAL_FLOOR)
            .map(|v| small_int(labels::TOTAL_FLOOR, v))
            .transpose()?;

        Ok(PropertyDetails::House(HouseDetails {
            rooms,
            total_floor,
            total_area_sqm: attributes
                .number(labels::TOTAL_AREA)
                .map(|v| v.round() as i64),
            land_area_sqm: land_area_sqm(attributes, labels::HOUSE_LAND_AREA),
            repair: Self::repair(attributes),
            building_material: optional_category(
                attributes,
                labels::BUILDING_MATERIAL,
                labels::building_material,
            )?,
            house_type: optional_category(attributes, labels::HOUSE_TYPE, labels::house_type)?,
            has_furniture: attributes.text(labels::FURNISHED).map(|v| v == labels::YES),
        }))
    }
}
