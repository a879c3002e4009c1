//! Conversion of the developer's real-estate feed into the marketplace's
//! `Ads` document.
//!
//! A run parses the source feed, resolves each listing's group, normalizes
//! it, applies that group's override rule and the identifier policy, and
//! serializes the survivors. Listing-level failures are counted and skipped;
//! feed-level failures abort the run without touching the last artifact.

pub mod converter;
pub mod domain;
pub mod identity;
pub mod ingest;
pub mod normalizer;
pub mod overrides;
pub mod router;
pub mod serializer;
pub mod service;
pub mod source;
pub mod store;
pub mod template;

use std::path::PathBuf;

pub use converter::{ConversionOutcome, FeedConverter};
pub use domain::{
    ConversionRunStats, GroupOverride, MarketType, NormalizedListing, OverridePatch,
    PropertyRights, RawListing, RoomDescriptor,
};
pub use identity::{clean_group_name, group_census, resolve_group, GroupCount};
pub use ingest::{parse_listings, ParseError};
pub use normalizer::{normalize_listing, ListingError};
pub use overrides::{adjust_price, apply_override, resolve_identifier, ModifierError};
pub use router::conversion_router;
pub use serializer::render_document;
pub use service::{ConversionService, GroupSummary, RunLogEntry, RunLogLevel, RunTrigger};
pub use source::{feed_source, FeedSource, FetchError, FileFeedSource, HttpFeedSource};
pub use store::{JsonFileOverrideStore, MemoryOverrideStore, OverrideStore, StoreError};
pub use template::{render, TemplateError, TemplateValues};

/// Run-level failure; nothing is written when a run ends with one of these.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("feed source is not configured")]
    SourceNotConfigured,
    #[error("a conversion run is already in progress")]
    RunInProgress,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("source feed is malformed: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write feed artifact {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
