use std::collections::HashMap;

use serde::Serialize;

use super::domain::RawListing;

/// Trims the name and drops the quote characters used for display in the
/// source feed so it can serve as a lookup key.
pub fn clean_group_name(value: &str) -> String {
    value.trim().replace(['"', '\''], "")
}

/// Building name, then development name, then a district-derived key.
pub fn resolve_group(raw: &RawListing) -> Option<String> {
    let named = [raw.building_name.as_deref(), raw.development_name.as_deref()]
        .into_iter()
        .flatten()
        .map(clean_group_name)
        .find(|name| !name.is_empty());
    if named.is_some() {
        return named;
    }

    raw.district
        .as_deref()
        .map(str::trim)
        .filter(|district| !district.is_empty())
        .map(|district| format!("Район {district}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub listings: usize,
}

/// Listing count per building name, busiest first.
pub fn group_census(listings: &[RawListing]) -> Vec<GroupCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in listings
        .iter()
        .filter_map(|raw| raw.building_name.as_deref())
        .map(clean_group_name)
        .filter(|name| !name.is_empty())
    {
        *counts.entry(name).or_default() += 1;
    }

    let mut census: Vec<GroupCount> = counts
        .into_iter()
        .map(|(name, listings)| GroupCount { name, listings })
        .collect();
    census.sort_by(|a, b| b.listings.cmp(&a.listings).then_with(|| a.name.cmp(&b.name)));
    census
}
