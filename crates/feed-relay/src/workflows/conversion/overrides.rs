use tracing::{debug, info, warn};

use super::domain::{
    GroupOverride, MarketType, NormalizedListing, PropertyRights, DEFAULT_FINISH_TYPE,
    DEFAULT_STATUS, MAX_DESCRIPTION_CHARS, MAX_IMAGES,
};
use super::normalizer::is_image_url;
use super::template::{self, TemplateValues};

const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModifierError {
    #[error("price modifier '{0}' is not a number")]
    NotNumeric(String),
}

/// Applies a group's rules in order: photos, description, price, identifiers.
/// Each step falls back to the incoming listing when its rule cannot be used.
pub fn apply_override(
    listing: NormalizedListing,
    group: &str,
    rule: &GroupOverride,
) -> NormalizedListing {
    let listing = apply_photos(listing, group, rule);
    let listing = apply_description(listing, group, rule);
    let listing = apply_price_modifier(listing, group, rule);
    resolve_identifier(listing, Some(rule), group)
}

pub fn apply_photos(
    mut listing: NormalizedListing,
    group: &str,
    rule: &GroupOverride,
) -> NormalizedListing {
    if rule.photos.is_empty() {
        return listing;
    }

    let photos: Vec<String> = rule
        .photos
        .iter()
        .map(|url| url.trim())
        .filter(|url| is_image_url(url))
        .take(MAX_IMAGES)
        .map(str::to_string)
        .collect();
    if photos.is_empty() {
        warn!(group, "override photos contain no http(s) urls, keeping feed images");
        return listing;
    }

    info!(group, photos = photos.len(), "replaced listing photos");
    listing.images = photos;
    listing
}

pub fn apply_description(
    mut listing: NormalizedListing,
    group: &str,
    rule: &GroupOverride,
) -> NormalizedListing {
    if rule.description.trim().is_empty() {
        return listing;
    }

    let values = TemplateValues {
        group: group.to_string(),
        rooms: listing.rooms.map(|rooms| rooms.to_string()).unwrap_or_default(),
        area: listing.square.clone().unwrap_or_default(),
        floor: listing.floor.clone().unwrap_or_default(),
        floors: listing.floors.clone().unwrap_or_default(),
        price: listing.price.to_string(),
    };

    match template::render(&rule.description, &values) {
        Ok(rendered) => {
            listing.description = cap_description(rendered);
            info!(group, listing = %listing.id, "rendered description template");
        }
        Err(err) => {
            warn!(group, listing = %listing.id, error = %err, "description template rejected");
        }
    }
    listing
}

fn cap_description(description: String) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_CHARS {
        return description;
    }
    let keep = MAX_DESCRIPTION_CHARS - TRUNCATION_MARKER.len();
    let mut capped: String = description.chars().take(keep).collect();
    capped.push_str(TRUNCATION_MARKER);
    capped
}

pub fn apply_price_modifier(
    mut listing: NormalizedListing,
    group: &str,
    rule: &GroupOverride,
) -> NormalizedListing {
    match adjust_price(listing.price, &rule.price_modifier) {
        Ok(Some(price)) => {
            info!(
                group,
                listing = %listing.id,
                from = listing.price,
                to = price,
                modifier = rule.price_modifier.trim(),
                "adjusted price"
            );
            listing.price = price;
        }
        Ok(None) => {}
        Err(err) => {
            warn!(group, listing = %listing.id, error = %err, "price modifier ignored");
        }
    }
    listing
}

/// `"+5%"`/`"-3.5%"` scale the price; `"+100000"`/`"-50000"` shift it.
/// Returns `None` when the modifier is blank or zero.
pub fn adjust_price(price: u64, modifier: &str) -> Result<Option<u64>, ModifierError> {
    let modifier = modifier.trim();
    if modifier.is_empty() {
        return Ok(None);
    }

    let not_numeric = || ModifierError::NotNumeric(modifier.to_string());
    let parse = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(not_numeric)
    };

    let adjusted = match modifier.strip_suffix('%') {
        Some(percent) => {
            let percent = parse(percent)?;
            if percent == 0.0 {
                return Ok(None);
            }
            price as f64 * (1.0 + percent / 100.0)
        }
        None => {
            let delta = parse(modifier.strip_prefix('+').unwrap_or(modifier))?;
            if delta == 0.0 {
                return Ok(None);
            }
            price as f64 + delta
        }
    };

    // Float-to-int `as` saturates, so only the sign needs handling.
    Ok(Some(adjusted.round().max(0.0) as u64))
}

/// Settles the new-development identifier for a listing. A new-development
/// listing keeps its market type only when a numeric building or development
/// id is configured; otherwise it is reclassified as secondary.
pub fn resolve_identifier(
    mut listing: NormalizedListing,
    rule: Option<&GroupOverride>,
    group: &str,
) -> NormalizedListing {
    if listing.market_type != MarketType::NewDevelopment {
        listing.new_development_id = None;
        return listing;
    }

    let building_id = rule
        .map(|rule| rule.building_id.trim())
        .filter(|id| is_numeric_id(id));
    let development_id = rule
        .map(|rule| rule.development_id.trim())
        .filter(|id| is_numeric_id(id));

    if let Some(id) = building_id {
        info!(group, listing = %listing.id, building_id = id, "using building id for new development");
        listing.new_development_id = Some(id.to_string());
        listing.property_rights = PropertyRights::Developer;
    } else if let Some(id) = development_id {
        info!(group, listing = %listing.id, development_id = id, "using development id for new development");
        listing.new_development_id = Some(id.to_string());
        listing.property_rights = PropertyRights::Developer;
    } else {
        warn!(group, listing = %listing.id, "no numeric development id, listing moved to secondary market");
        listing.market_type = MarketType::Secondary;
        listing.new_development_id = None;
    }

    if listing.new_development_id.is_some() {
        listing
            .finish_type
            .get_or_insert_with(|| DEFAULT_FINISH_TYPE.to_string());
        listing
            .status
            .get_or_insert_with(|| DEFAULT_STATUS.to_string());
        debug!(listing = %listing.id, "new development fields filled");
    }

    listing
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}
