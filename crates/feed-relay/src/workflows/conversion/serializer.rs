use super::domain::{MarketType, NormalizedListing, DEFAULT_FINISH_TYPE, MAX_IMAGES};

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Ads formatVersion="3" target="Avito.ru">"#;

/// Renders finalized listings into the marketplace's `Ads` document.
pub fn render_document(listings: &[NormalizedListing]) -> String {
    let mut lines: Vec<String> = vec![HEADER.to_string()];
    for listing in listings {
        render_listing(listing, &mut lines);
    }
    lines.push("</Ads>".to_string());
    lines.join("\n")
}

fn render_listing(listing: &NormalizedListing, lines: &mut Vec<String>) {
    lines.push("  <Ad>".to_string());

    let price = listing.price.to_string();
    let mandatory: [(&str, &str); 7] = [
        ("Id", listing.id.as_str()),
        ("Category", NormalizedListing::CATEGORY),
        ("OperationType", NormalizedListing::OPERATION_TYPE),
        ("ContactPhone", listing.contact_phone.as_str()),
        ("Description", listing.description.as_str()),
        ("Price", price.as_str()),
        ("PropertyRights", listing.property_rights.label()),
    ];
    for (name, value) in mandatory {
        lines.push(field(name, value));
    }

    let date_begin = listing
        .date_begin
        .map(|date| date.format("%Y-%m-%d").to_string());
    let rooms = listing.rooms.map(|rooms| rooms.to_string());
    let optional: [(&str, Option<&str>); 8] = [
        ("DateBegin", date_begin.as_deref()),
        ("Square", listing.square.as_deref()),
        ("Floor", listing.floor.as_deref()),
        ("Floors", listing.floors.as_deref()),
        ("Rooms", rooms.as_deref()),
        ("MarketType", Some(listing.market_type.label())),
        ("HouseType", listing.house_type.as_deref()),
        ("Status", listing.status.as_deref()),
    ];
    for (name, value) in optional {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            lines.push(field(name, value));
        }
    }

    if listing.market_type == MarketType::NewDevelopment {
        if let Some(id) = listing.new_development_id.as_deref() {
            lines.push(field("NewDevelopmentId", id));
            lines.push(field(
                "FinishType",
                listing.finish_type.as_deref().unwrap_or(DEFAULT_FINISH_TYPE),
            ));
        }
    }

    if !listing.images.is_empty() {
        lines.push("    <Images>".to_string());
        for url in listing.images.iter().take(MAX_IMAGES) {
            lines.push(format!(r#"      <Image url="{}"/>"#, escape(url)));
        }
        lines.push("    </Images>".to_string());
    }

    lines.push("  </Ad>".to_string());
}

fn field(name: &str, value: &str) -> String {
    format!("    <{name}>{}</{name}>", escape(value))
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
