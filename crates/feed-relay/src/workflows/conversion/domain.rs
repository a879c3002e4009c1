use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Marketplace cap on photos per listing.
pub const MAX_IMAGES: usize = 40;
/// Marketplace cap on description length, counted in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 7500;

pub const DEFAULT_PHONE: &str = "+79999999999";
pub const DEFAULT_DESCRIPTION: &str = "Продается квартира";
pub const DEFAULT_PRICE: u64 = 1_000_000;
pub const DEFAULT_HOUSE_TYPE: &str = "Монолитный";
pub const DEFAULT_STATUS: &str = "Квартира";
pub const DEFAULT_FINISH_TYPE: &str = "Без отделки";

/// One offer as it appears in the source feed. Text fields are kept verbatim
/// and are `None` when the element is missing or has no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub internal_id: Option<String>,
    pub id: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub floor: Option<String>,
    pub floors_total: Option<String>,
    pub rooms: Option<String>,
    /// Every `image` element in feed order, including empty ones.
    pub images: Vec<String>,
    pub new_flat: Option<String>,
    pub building_name: Option<String>,
    pub development_name: Option<String>,
    pub district: Option<String>,
}

impl RawListing {
    pub fn is_new_construction(&self) -> bool {
        self.new_flat.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    NewDevelopment,
    Secondary,
}

impl MarketType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NewDevelopment => "Новостройка",
            Self::Secondary => "Вторичка",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyRights {
    Developer,
    Intermediary,
}

impl PropertyRights {
    pub const fn for_market(market: MarketType) -> Self {
        match market {
            MarketType::NewDevelopment => Self::Developer,
            MarketType::Secondary => Self::Intermediary,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Developer => "Застройщик",
            Self::Intermediary => "Посредник",
        }
    }
}

/// Room count in the marketplace's closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomDescriptor {
    Studio,
    /// Always in `1..=9`; build through [`RoomDescriptor::from_count`].
    Rooms(u8),
    TenOrMore,
}

impl RoomDescriptor {
    pub fn from_count(count: u64) -> Self {
        match count {
            0 => Self::Studio,
            1..=9 => Self::Rooms(count as u8),
            _ => Self::TenOrMore,
        }
    }
}

impl Default for RoomDescriptor {
    fn default() -> Self {
        Self::Rooms(1)
    }
}

impl fmt::Display for RoomDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Studio => f.write_str("Студия"),
            Self::Rooms(count) => write!(f, "{count}"),
            Self::TenOrMore => f.write_str("10 и более"),
        }
    }
}

/// Listing expressed in the target marketplace schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedListing {
    pub id: String,
    pub contact_phone: String,
    pub description: String,
    pub price: u64,
    pub property_rights: PropertyRights,
    pub date_begin: Option<NaiveDate>,
    pub square: Option<String>,
    pub floor: Option<String>,
    pub floors: Option<String>,
    pub rooms: Option<RoomDescriptor>,
    pub market_type: MarketType,
    pub house_type: Option<String>,
    pub status: Option<String>,
    pub images: Vec<String>,
    pub new_development_id: Option<String>,
    pub finish_type: Option<String>,
}

impl NormalizedListing {
    pub const CATEGORY: &'static str = "Квартиры";
    pub const OPERATION_TYPE: &'static str = "Продам";
}

/// Group-level rules persisted by the override store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOverride {
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_modifier: String,
    #[serde(default)]
    pub development_id: String,
    #[serde(default)]
    pub building_id: String,
}

impl GroupOverride {
    /// Folds a partial update into the stored record; absent fields keep their value.
    pub fn merge(mut self, patch: OverridePatch) -> Self {
        if let Some(photos) = patch.photos {
            self.photos = photos;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price_modifier) = patch.price_modifier {
            self.price_modifier = price_modifier;
        }
        if let Some(development_id) = patch.development_id {
            self.development_id = development_id;
        }
        if let Some(building_id) = patch.building_id {
            self.building_id = building_id;
        }
        self
    }
}

/// Partial override update as submitted from the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverridePatch {
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_modifier: Option<String>,
    #[serde(default)]
    pub development_id: Option<String>,
    #[serde(default)]
    pub building_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRunStats {
    pub total: usize,
    pub with_override_applied: usize,
    pub errors: usize,
    pub configured_groups_at_start: usize,
}
