//! Site labels for categorical fields.

use harvester_core::error::AppError;
use harvester_core::models::{BuildingMaterial, HouseType, Purpose, Repair};

use super::document::Attributes;

pub const ROOMS: &str = "Количество комнат";
pub const FLOOR: &str = "Этаж";
pub const TOTAL_FLOOR: &str = "Этажность дома";
pub const TOTAL_AREA: &str = "Общая площадь";
pub const REPAIR: &str = "Ремонт";
pub const HOUSE_CONDITION: &str = "Состояние дома";
pub const HOUSING_MARKET: &str = "Тип жилья";
pub const BUILDING_MATERIAL: &str = "Тип строения";
pub const FURNISHED: &str = "Меблирована";
pub const PURPOSE: &str = "Тип недвижимости";
pub const COMMERCE_LAND_AREA: &str = "Участок";
pub const HOUSE_LAND_AREA: &str = "Площадь участка";
pub const HOUSE_TYPE: &str = "Тип дома";

pub const SECONDARY_MARKET: &str = "Вторичный рынок";
pub const YES: &str = "Да";

pub fn repair(text: &str) -> Option<Repair> {
    match text {
        "Авторский проект" => Some(Repair::Designer),
        "Евроремонт" => Some(Repair::Euro),
        "Средний" => Some(Repair::Average),
        "Требует ремонта" => Some(Repair::NeedsRepair),
        "Черновая отделка" => Some(Repair::RoughFinish),
        "Предчистовая отделка" => Some(Repair::PreFinish),
        _ => None,
    }
}

/// House listings describe their state freely; match on keywords.
pub fn repair_fuzzy(text: &str) -> Option<Repair> {
    const KEYWORDS: &[(&str, Repair)] = &[
        ("авторский проект", Repair::Designer),
        ("евро", Repair::Euro),
        ("средний", Repair::Average),
        ("не достроен", Repair::NeedsRepair),
        ("под снос", Repair::NeedsRepair),
        ("требует ремонта", Repair::NeedsRepair),
        ("коробка", Repair::NeedsRepair),
        ("черновая отделка", Repair::RoughFinish),
        ("предчистовая отделка", Repair::PreFinish),
    ];
    let text = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, repair)| *repair)
}

pub fn building_material(text: &str) -> Option<BuildingMaterial> {
    match text {
        "Кирпичный" => Some(BuildingMaterial::Brick),
        "Панельный" => Some(BuildingMaterial::Panel),
        "Монолитный" => Some(BuildingMaterial::Monolith),
        "Блочный" => Some(BuildingMaterial::Block),
        "Деревянный" => Some(BuildingMaterial::Wood),
        _ => None,
    }
}

pub fn purpose(text: &str) -> Option<Purpose> {
    match text.to_lowercase().as_str() {
        "магазины/бутики" => Some(Purpose::Shop),
        "базы отдыха" => Some(Purpose::RecreationBase),
        "салоны" => Some(Purpose::Salon),
        "помещения промышленного назначения" => Some(Purpose::Industrial),
        "рестораны/кафе/бары" => Some(Purpose::RestaurantCafeBar),
        "помещения свободного назначения" => Some(Purpose::FreePurpose),
        "офисы" => Some(Purpose::Office),
        "маф (малая архитектурная форма)" => Some(Purpose::SmallArchitecturalForm),
        "склады" => Some(Purpose::Warehouse),
        "часть здания" => Some(Purpose::PartOfBuilding),
        "отдельно стоящие здания" => Some(Purpose::StandaloneBuilding),
        "нежилое помещение" => Some(Purpose::Uninhabitable),
        "другое" => Some(Purpose::Other),
        _ => None,
    }
}

pub fn house_type(text: &str) -> Option<HouseType> {
    match text.to_lowercase().as_str() {
        "дом" => Some(HouseType::House),
        "флигель" => Some(HouseType::Wing),
        "коттедж" => Some(HouseType::Cottage),
        "часть дома" => Some(HouseType::PartOfHouse),
        "дача" => Some(HouseType::Dacha),
        "таунхаус" => Some(HouseType::Townhouse),
        _ => None,
    }
}

/// Optional categorical field: absent → `None` with a warning, present but
/// unrecognized → structural error.
pub fn optional_category<T>(
    attributes: &Attributes,
    label: &str,
    map: fn(&str) -> Option<T>,
) -> Result<Option<T>, AppError> {
    let Some(text) = attributes.text(label) else {
        tracing::warn!(%label, "Optional field not found");
        return Ok(None);
    };
    map(text)
        .map(Some)
        .ok_or_else(|| AppError::StructuralParse(format!("unknown {label} value '{text}'")))
}

/// Land area is listed in sotka (hundreds of m²).
pub fn land_area_sqm(attributes: &Attributes, label: &str) -> Option<i64> {
    attributes
        .number(label)
        .map(|sotka| (sotka * 100.0).round() as i64)
}

pub fn small_int(label: &str, value: f64) -> Result<i16, AppError> {
    let rounded = value.round();
    if rounded < i16::MIN as f64 || rounded > i16::MAX as f64 {
        return Err(AppError::StructuralParse(format!(
            "field '{label}' is out of range: {value}"
        )));
    }
    Ok(rounded as i16)
}
