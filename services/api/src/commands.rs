use crate::infra::build_service;
use clap::Args;
use feed_relay::config::AppConfig;
use feed_relay::error::AppError;
use feed_relay::telemetry::{self, LogSink};
use feed_relay::workflows::conversion::{GroupSummary, RunTrigger};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct ConvertArgs {
    /// Feed URL or local file; defaults to FEED_SOURCE_URL
    #[arg(long)]
    pub(crate) source: Option<String>,
    /// Where to write the marketplace feed; defaults to FEED_OUTPUT_PATH
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Group override file; defaults to FEED_OVERRIDES_PATH
    #[arg(long)]
    pub(crate) overrides: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct GroupsArgs {
    /// Feed URL or local file; defaults to FEED_SOURCE_URL
    #[arg(long)]
    pub(crate) source: Option<String>,
    /// Group override file; defaults to FEED_OVERRIDES_PATH
    #[arg(long)]
    pub(crate) overrides: Option<PathBuf>,
}

pub(crate) fn run_convert(args: ConvertArgs) -> Result<(), AppError> {
    let ConvertArgs {
        source,
        output,
        overrides,
    } = args;

    let mut config = AppConfig::load()?;
    if source.is_some() {
        config.feed.source_url = source;
    }
    if let Some(output) = output {
        config.feed.output_path = output;
    }
    if let Some(overrides) = overrides {
        config.feed.overrides_path = overrides;
    }
    telemetry::init(&config.telemetry, LogSink::Stderr)?;

    let service = build_service(&config);
    let stats = service.run(RunTrigger::Manual)?;

    println!("Feed written to {}", service.output_path().display());
    println!(
        "- {} listings read | {} with group overrides | {} skipped",
        stats.total, stats.with_override_applied, stats.errors
    );
    println!("- {} groups configured", stats.configured_groups_at_start);
    Ok(())
}

pub(crate) fn run_groups(args: GroupsArgs) -> Result<(), AppError> {
    let GroupsArgs { source, overrides } = args;

    let mut config = AppConfig::load()?;
    if source.is_some() {
        config.feed.source_url = source;
    }
    if let Some(overrides) = overrides {
        config.feed.overrides_path = overrides;
    }
    telemetry::init(&config.telemetry, LogSink::Stderr)?;

    let groups = build_service(&config).group_summaries()?;
    let configured = groups.iter().filter(|group| group.configured).count();
    println!("{} groups ({} configured)", groups.len(), configured);
    for group in &groups {
        println!("  - {}", describe_group(group));
    }
    Ok(())
}

fn describe_group(group: &GroupSummary) -> String {
    let mut line = format!("{}: {} listings", group.name, group.listings);
    if !group.configured {
        line.push_str(" [not configured]");
        return line;
    }

    let coverage: Vec<&str> = [
        (group.has_photos, "photos"),
        (group.has_description, "description"),
        (group.has_building_id, "building id"),
        (group.has_development_id, "development id"),
    ]
    .into_iter()
    .filter_map(|(present, label)| present.then_some(label))
    .collect();
    if coverage.is_empty() {
        line.push_str(" [configured, empty]");
    } else {
        line.push_str(&format!(" [{}]", coverage.join(", ")));
    }
    line
}
