use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use super::domain::{ConversionRunStats, GroupOverride, NormalizedListing, RawListing};
use super::identity::resolve_group;
use super::ingest::{parse_listings, ParseError};
use super::normalizer::{normalize_listing, ListingError};
use super::overrides::{apply_override, resolve_identifier};
use super::serializer::render_document;

/// Result of a successful run: the target document and its counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub document: String,
    pub stats: ConversionRunStats,
}

/// Single-pass conversion of one feed against one override snapshot.
///
/// The converter holds no state beyond the run date stamped onto listings,
/// so equal inputs on the same date produce byte-identical documents.
#[derive(Debug, Clone, Copy)]
pub struct FeedConverter {
    run_date: NaiveDate,
}

impl FeedConverter {
    pub fn new(run_date: NaiveDate) -> Self {
        Self { run_date }
    }

    pub fn convert(
        &self,
        feed: &[u8],
        overrides: &BTreeMap<String, GroupOverride>,
    ) -> Result<ConversionOutcome, ParseError> {
        let raw_listings = parse_listings(feed)?;
        info!(listings = raw_listings.len(), "parsed source feed");

        let mut stats = ConversionRunStats {
            total: raw_listings.len(),
            configured_groups_at_start: overrides.len(),
            ..ConversionRunStats::default()
        };
        let mut finalized = Vec::with_capacity(raw_listings.len());

        for (position, raw) in raw_listings.iter().enumerate() {
            match self.finalize(raw, overrides) {
                Ok((listing, overridden)) => {
                    if overridden {
                        stats.with_override_applied += 1;
                    }
                    finalized.push(listing);
                }
                Err(err) => {
                    stats.errors += 1;
                    error!(position, error = %err, "listing skipped");
                }
            }
        }

        Ok(ConversionOutcome {
            document: render_document(&finalized),
            stats,
        })
    }

    /// Returns the finished listing and whether a group override was applied.
    fn finalize(
        &self,
        raw: &RawListing,
        overrides: &BTreeMap<String, GroupOverride>,
    ) -> Result<(NormalizedListing, bool), ListingError> {
        let group = resolve_group(raw);
        let listing = normalize_listing(raw, self.run_date)?;

        let Some(group) = group else {
            warn!(listing = %listing.id, "listing has no group identity");
            return Ok((resolve_identifier(listing, None, ""), false));
        };

        match overrides.get(&group) {
            Some(rule) => {
                info!(group = %group, listing = %listing.id, "applying group override");
                Ok((apply_override(listing, &group, rule), true))
            }
            None => {
                warn!(group = %group, listing = %listing.id, "no override configured for group");
                Ok((resolve_identifier(listing, None, &group), false))
            }
        }
    }
}
