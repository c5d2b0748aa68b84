use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of real estate a listing describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeOfProperty {
    Apartment,
    Commerce,
    House,
}

impl TypeOfProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeOfProperty::Apartment => "apartment",
            TypeOfProperty::Commerce => "commerce",
            TypeOfProperty::House => "house",
        }
    }
}

impl fmt::Display for TypeOfProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the listing offers a sale or a long-term rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeOfService {
    Sale,
    Rent,
}

impl TypeOfService {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeOfService::Sale => "sale",
            TypeOfService::Rent => "rent",
        }
    }
}

impl fmt::Display for TypeOfService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform a listing (and its publishing organization) comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Olx,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Olx => "olx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    Designer,
    Euro,
    Average,
    NeedsRepair,
    RoughFinish,
    PreFinish,
}

impl Repair {
    pub fn as_str(&self) -> &'static str {
        match self {
            Repair::Designer => "designer",
            Repair::Euro => "euro",
            Repair::Average => "average",
            Repair::NeedsRepair => "needs_repair",
            Repair::RoughFinish => "rough_finish",
            Repair::PreFinish => "pre_finish",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingMaterial {
    Brick,
    Panel,
    Monolith,
    Block,
    Wood,
}

impl BuildingMaterial {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingMaterial::Brick => "brick",
            BuildingMaterial::Panel => "panel",
            BuildingMaterial::Monolith => "monolith",
            BuildingMaterial::Block => "block",
            BuildingMaterial::Wood => "wood",
        }
    }
}

/// Intended use of a commercial property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Shop,
    RecreationBase,
    Salon,
    Industrial,
    RestaurantCafeBar,
    FreePurpose,
    Office,
    SmallArchitecturalForm,
    Warehouse,
    PartOfBuilding,
    StandaloneBuilding,
    Uninhabitable,
    Other,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Shop => "shop",
            Purpose::RecreationBase => "recreation_base",
            Purpose::Salon => "salon",
            Purpose::Industrial => "industrial",
            Purpose::RestaurantCafeBar => "restaurant_cafe_bar",
            Purpose::FreePurpose => "free_purpose",
            Purpose::Office => "office",
            Purpose::SmallArchitecturalForm => "small_architectural_form",
            Purpose::Warehouse => "warehouse",
            Purpose::PartOfBuilding => "part_of_building",
            Purpose::StandaloneBuilding => "standalone_building",
            Purpose::Uninhabitable => "uninhabitable",
            Purpose::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseType {
    House,
    Wing,
    Cottage,
    PartOfHouse,
    Dacha,
    Townhouse,
}

impl HouseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HouseType::House => "house",
            HouseType::Wing => "wing",
            HouseType::Cottage => "cottage",
            HouseType::PartOfHouse => "part_of_house",
            HouseType::Dacha => "dacha",
            HouseType::Townhouse => "townhouse",
        }
    }
}

/// Fields shared by every listing regardless of property type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingHeader {
    pub type_of_property: TypeOfProperty,
    pub type_of_service: TypeOfService,
    pub source: Source,
    /// Natural key on the source platform (dedup key together with `source`).
    pub external_id: String,
    pub organization_url: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub polygon_id: Option<i64>,
    pub polygon_keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApartmentDetails {
    pub rooms: i16,
    pub floor: i16,
    pub total_floor: i16,
    pub total_area_sqm: i64,
    pub is_new_building: bool,
    pub has_furniture: bool,
    pub repair: Option<Repair>,
    pub building_material: Option<BuildingMaterial>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommerceDetails {
    pub floor: Option<i16>,
    pub total_floor: Option<i16>,
    pub total_area_sqm: Option<i64>,
    pub land_area_sqm: Option<i64>,
    pub repair: Option<Repair>,
    pub purpose: Option<Purpose>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HouseDetails {
    pub rooms: Option<i16>,
    pub total_floor: Option<i16>,
    pub total_area_sqm: Option<i64>,
    pub land_area_sqm: Option<i64>,
    pub repair: Option<Repair>,
    pub building_material: Option<BuildingMaterial>,
    pub house_type: Option<HouseType>,
    pub has_furniture: Option<bool>,
}

/// Type-specific payload of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PropertyDetails {
    Apartment(ApartmentDetails),
    Commerce(CommerceDetails),
    House(HouseDetails),
}

impl PropertyDetails {
    pub fn property_type(&self) -> TypeOfProperty {
        match self {
            PropertyDetails::Apartment(_) => TypeOfProperty::Apartment,
            PropertyDetails::Commerce(_) => TypeOfProperty::Commerce,
            PropertyDetails::House(_) => TypeOfProperty::House,
        }
    }

    pub fn total_area_sqm(&self) -> Option<i64> {
        match self {
            PropertyDetails::Apartment(d) => Some(d.total_area_sqm),
            PropertyDetails::Commerce(d) => d.total_area_sqm,
            PropertyDetails::House(d) => d.total_area_sqm,
        }
    }
}

/// Structured record extracted from one listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub header: ListingHeader,
    pub total_price_usd: i64,
    pub details: PropertyDetails,
    /// SHA-256 of the raw document the record was extracted from.
    pub content_hash: String,
}

impl Listing {
    /// Price per square metre, rounded to cents. `None` without a usable area.
    pub fn price_per_sqm(&self) -> Option<f64> {
        let area = self.details.total_area_sqm().filter(|a| *a > 0)?;
        let raw = self.total_price_usd as f64 / area as f64;
        Some((raw * 100.0).round() / 100.0)
    }
}

/// Result of an idempotent store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Created,
    AlreadyExists,
}

impl StoreOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOutcome::Created => "created",
            StoreOutcome::AlreadyExists => "already_exists",
        }
    }
}

/// Categorical tag returned by the enrichment service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub polygon_id: Option<i64>,
    pub keyword: Option<String>,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
