use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use super::domain::{
    MarketType, NormalizedListing, PropertyRights, RawListing, RoomDescriptor, DEFAULT_DESCRIPTION,
    DEFAULT_HOUSE_TYPE, DEFAULT_PHONE, DEFAULT_PRICE, DEFAULT_STATUS, MAX_DESCRIPTION_CHARS,
    MAX_IMAGES,
};

const PLACEHOLDER_ID: &str = "apt_unknown";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    #[error("price '{value}' is not a non-negative number")]
    InvalidPrice { value: String },
}

/// Maps one source offer onto the target schema, filling documented defaults.
pub fn normalize_listing(
    raw: &RawListing,
    run_date: NaiveDate,
) -> Result<NormalizedListing, ListingError> {
    let id = raw
        .internal_id
        .clone()
        .or_else(|| raw.id.clone())
        .unwrap_or_else(|| PLACEHOLDER_ID.to_string());

    let price = match present(&raw.price) {
        Some(value) => parse_price(value)?,
        None => DEFAULT_PRICE,
    };

    let market_type = if raw.is_new_construction() {
        MarketType::NewDevelopment
    } else {
        MarketType::Secondary
    };

    let rooms = match present(&raw.rooms) {
        Some(value) => {
            let descriptor = room_descriptor(value);
            debug!(listing = %id, source = value, rooms = %descriptor, "mapped room descriptor");
            descriptor
        }
        None => {
            warn!(listing = %id, "rooms missing, defaulting to 1");
            RoomDescriptor::default()
        }
    };

    Ok(NormalizedListing {
        contact_phone: present(&raw.phone)
            .map(normalize_phone)
            .unwrap_or_else(|| DEFAULT_PHONE.to_string()),
        description: present(&raw.description)
            .map(clean_description)
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        price,
        property_rights: PropertyRights::for_market(market_type),
        date_begin: Some(run_date),
        square: present(&raw.area).map(str::to_string),
        floor: present(&raw.floor).map(str::to_string),
        floors: present(&raw.floors_total).map(str::to_string),
        rooms: Some(rooms),
        market_type,
        house_type: Some(DEFAULT_HOUSE_TYPE.to_string()),
        status: Some(DEFAULT_STATUS.to_string()),
        images: raw
            .images
            .iter()
            .take(MAX_IMAGES)
            .map(|url| url.trim())
            .filter(|url| is_image_url(url))
            .map(str::to_string)
            .collect(),
        new_development_id: None,
        finish_type: None,
        id,
    })
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn is_image_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Canonical `+7XXXXXXXXXX` form from the usual domestic notations.
pub fn normalize_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    let digits: String = cleaned.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return DEFAULT_PHONE.to_string();
    }

    if cleaned.starts_with('8') {
        format!("+7{}", &digits[1..])
    } else if cleaned.starts_with('7') || cleaned.starts_with("+7") {
        format!("+{digits}")
    } else {
        format!("+7{digits}")
    }
}

fn html_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern compiles"))
}

/// Strips markup, collapses whitespace, and enforces the length cap.
pub fn clean_description(description: &str) -> String {
    let stripped = html_tag().replace_all(description, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return DEFAULT_DESCRIPTION.to_string();
    }
    truncate_chars(&collapsed, MAX_DESCRIPTION_CHARS)
}

pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value.to_string(),
    }
}

/// Total mapping of free-form room values onto the marketplace vocabulary.
pub fn room_descriptor(value: &str) -> RoomDescriptor {
    let value = value.trim().to_lowercase();
    match value.as_str() {
        "studio" | "студия" | "0" => return RoomDescriptor::Studio,
        _ => {}
    }

    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let significant = value.trim_start_matches('0');
        return match significant.len() {
            0 => RoomDescriptor::Studio,
            1 => RoomDescriptor::from_count(u64::from(significant.as_bytes()[0] - b'0')),
            _ => RoomDescriptor::TenOrMore,
        };
    }

    match value.parse::<i64>() {
        Ok(count) if count >= 0 => RoomDescriptor::from_count(count.unsigned_abs()),
        _ => RoomDescriptor::default(),
    }
}

fn parse_price(value: &str) -> Result<u64, ListingError> {
    let invalid = || ListingError::InvalidPrice {
        value: value.to_string(),
    };
    let amount: f64 = value.parse().map_err(|_| invalid())?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(invalid());
    }
    Ok(amount.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 24).expect("valid date")
    }

    #[test]
    fn phone_normalization_covers_domestic_notations() {
        assert_eq!(normalize_phone("89991234567"), "+79991234567");
        assert_eq!(normalize_phone("+7 999 123 45 67"), "+79991234567");
        assert_eq!(normalize_phone("7 (999) 123-45-67"), "+79991234567");
        assert_eq!(normalize_phone("5551234567"), "+75551234567");
        assert_eq!(normalize_phone("+1 555 123"), "+71555123");
        assert_eq!(normalize_phone("call us"), DEFAULT_PHONE);
    }

    #[test]
    fn phone_normalization_is_idempotent() {
        for input in ["89991234567", "+7 999 123 45 67", "5551234567", "+44 20 7946"] {
            let once = normalize_phone(input);
            assert_eq!(normalize_phone(&once), once, "input {input}");
            assert!(once.starts_with("+7"));
            assert!(once[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn room_values_land_in_the_closed_vocabulary() {
        assert_eq!(room_descriptor("studio"), RoomDescriptor::Studio);
        assert_eq!(room_descriptor(" Студия "), RoomDescriptor::Studio);
        assert_eq!(room_descriptor("0"), RoomDescriptor::Studio);
        assert_eq!(room_descriptor("3"), RoomDescriptor::Rooms(3));
        assert_eq!(room_descriptor("03"), RoomDescriptor::Rooms(3));
        assert_eq!(room_descriptor("12"), RoomDescriptor::TenOrMore);
        assert_eq!(
            room_descriptor("99999999999999999999999"),
            RoomDescriptor::TenOrMore
        );
        assert_eq!(room_descriptor("+4"), RoomDescriptor::Rooms(4));
        assert_eq!(room_descriptor("-2"), RoomDescriptor::Rooms(1));
        assert_eq!(room_descriptor("abc"), RoomDescriptor::Rooms(1));
    }

    #[test]
    fn description_is_stripped_collapsed_and_capped() {
        assert_eq!(
            clean_description("<p>Светлая\n\n  квартира</p> <br/>у парка"),
            "Светлая квартира у парка"
        );
        assert_eq!(clean_description("<div></div>"), DEFAULT_DESCRIPTION);

        let long = "ж".repeat(MAX_DESCRIPTION_CHARS + 50);
        assert_eq!(
            clean_description(&long).chars().count(),
            MAX_DESCRIPTION_CHARS
        );
    }

    #[test]
    fn missing_fields_receive_defaults() {
        let listing = normalize_listing(&RawListing::default(), run_date()).expect("normalizes");
        assert_eq!(listing.id, PLACEHOLDER_ID);
        assert_eq!(listing.contact_phone, DEFAULT_PHONE);
        assert_eq!(listing.description, DEFAULT_DESCRIPTION);
        assert_eq!(listing.price, DEFAULT_PRICE);
        assert_eq!(listing.market_type, MarketType::Secondary);
        assert_eq!(listing.property_rights, PropertyRights::Intermediary);
        assert_eq!(listing.rooms, Some(RoomDescriptor::Rooms(1)));
        assert_eq!(listing.date_begin, Some(run_date()));
        assert_eq!(listing.house_type.as_deref(), Some(DEFAULT_HOUSE_TYPE));
        assert_eq!(listing.status.as_deref(), Some(DEFAULT_STATUS));
        assert!(listing.images.is_empty());
        assert!(listing.square.is_none());
    }

    #[test]
    fn new_construction_maps_to_developer_rights() {
        let raw = RawListing {
            internal_id: Some("A-1".to_string()),
            id: Some("ignored".to_string()),
            new_flat: Some("true".to_string()),
            price: Some(" 5400000.90 ".to_string()),
            area: Some("42.5".to_string()),
            ..RawListing::default()
        };
        let listing = normalize_listing(&raw, run_date()).expect("normalizes");
        assert_eq!(listing.id, "A-1");
        assert_eq!(listing.market_type, MarketType::NewDevelopment);
        assert_eq!(listing.property_rights, PropertyRights::Developer);
        assert_eq!(listing.price, 5_400_000);
        assert_eq!(listing.square.as_deref(), Some("42.5"));
    }

    #[test]
    fn unparseable_price_fails_the_listing() {
        for value in ["по запросу", "-10", "NaN"] {
            let raw = RawListing {
                price: Some(value.to_string()),
                ..RawListing::default()
            };
            assert_eq!(
                normalize_listing(&raw, run_date()),
                Err(ListingError::InvalidPrice {
                    value: value.to_string()
                })
            );
        }
    }

    #[test]
    fn only_the_first_forty_source_images_are_considered() {
        let mut images: Vec<String> = vec!["ftp://skip".to_string(), "  ".to_string()];
        images.extend((0..60).map(|n| format!(" https://cdn.example/{n}.jpg ")));
        let raw = RawListing {
            images,
            ..RawListing::default()
        };
        let listing = normalize_listing(&raw, run_date()).expect("normalizes");
        assert_eq!(listing.images.len(), MAX_IMAGES - 2);
        assert_eq!(listing.images[0], "https://cdn.example/0.jpg");
    }
}
