use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info};

use super::converter::FeedConverter;
use super::domain::{ConversionRunStats, GroupOverride, OverridePatch};
use super::identity::{clean_group_name, group_census};
use super::ingest::parse_listings;
use super::source::FeedSource;
use super::store::{staging_path, OverrideStore, StoreError};
use super::ConversionError;

const JOURNAL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

impl RunTrigger {
    pub fn label(self) -> &'static str {
        match self {
            RunTrigger::Manual => "manual",
            RunTrigger::Scheduled => "scheduled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogEntry {
    pub timestamp: DateTime<Local>,
    pub level: RunLogLevel,
    pub message: String,
}

/// One row of the group dashboard: census count plus override coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub listings: usize,
    pub configured: bool,
    pub has_photos: bool,
    pub has_description: bool,
    pub has_development_id: bool,
    pub has_building_id: bool,
}

/// Orchestrates conversion runs against a feed source and an override store.
pub struct ConversionService {
    source: Option<Arc<dyn FeedSource>>,
    store: Arc<dyn OverrideStore>,
    output_path: PathBuf,
    run_lock: Mutex<()>,
    override_lock: Mutex<()>,
    last_run: Mutex<Option<DateTime<Local>>>,
    journal: Mutex<VecDeque<RunLogEntry>>,
}

impl ConversionService {
    pub fn new(
        source: Option<Arc<dyn FeedSource>>,
        store: Arc<dyn OverrideStore>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            store,
            output_path: output_path.into(),
            run_lock: Mutex::new(()),
            override_lock: Mutex::new(()),
            last_run: Mutex::new(None),
            journal: Mutex::new(VecDeque::with_capacity(JOURNAL_CAPACITY)),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn is_source_configured(&self) -> bool {
        self.source.is_some()
    }

    /// Completion time of the most recent successful run.
    pub fn last_run(&self) -> Option<DateTime<Local>> {
        *relock(&self.last_run)
    }

    /// Newest journal entries, oldest first.
    pub fn recent_runs(&self, limit: usize) -> Vec<RunLogEntry> {
        let journal = relock(&self.journal);
        let skip = journal.len().saturating_sub(limit);
        journal.iter().skip(skip).cloned().collect()
    }

    /// Runs one conversion. Only one run may be active at a time; an
    /// overlapping request fails with [`ConversionError::RunInProgress`].
    pub fn run(&self, trigger: RunTrigger) -> Result<ConversionRunStats, ConversionError> {
        let _running = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                self.record(
                    RunLogLevel::Warning,
                    format!("{} run rejected: a conversion is already running", trigger.label()),
                );
                return Err(ConversionError::RunInProgress);
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        self.record(
            RunLogLevel::Info,
            format!("{} conversion started", trigger.label()),
        );
        let started = Local::now();

        match self.execute(started) {
            Ok(stats) => {
                *relock(&self.last_run) = Some(Local::now());
                info!(
                    trigger = trigger.label(),
                    total = stats.total,
                    overridden = stats.with_override_applied,
                    errors = stats.errors,
                    output = %self.output_path.display(),
                    "conversion finished"
                );
                self.record(
                    RunLogLevel::Success,
                    format!(
                        "converted {} listings ({} with overrides, {} errors, {} groups configured)",
                        stats.total,
                        stats.with_override_applied,
                        stats.errors,
                        stats.configured_groups_at_start
                    ),
                );
                Ok(stats)
            }
            Err(err) => {
                error!(trigger = trigger.label(), error = %err, "conversion failed");
                self.record(RunLogLevel::Error, format!("conversion failed: {err}"));
                Err(err)
            }
        }
    }

    fn execute(&self, started: DateTime<Local>) -> Result<ConversionRunStats, ConversionError> {
        let source = self
            .source
            .as_ref()
            .ok_or(ConversionError::SourceNotConfigured)?;
        let overrides = self.store.snapshot()?;

        info!(source = %source.describe(), groups = overrides.len(), "fetching source feed");
        let feed = source.fetch()?;

        let outcome = FeedConverter::new(started.date_naive()).convert(&feed, &overrides)?;
        self.write_artifact(&outcome.document)?;
        Ok(outcome.stats)
    }

    fn write_artifact(&self, document: &str) -> Result<(), ConversionError> {
        let artifact_error = |source| ConversionError::Artifact {
            path: self.output_path.clone(),
            source,
        };
        let staging = staging_path(&self.output_path);
        std::fs::write(&staging, document).map_err(artifact_error)?;
        std::fs::rename(&staging, &self.output_path).map_err(artifact_error)
    }

    /// Fetches the feed and counts listings per building name.
    pub fn group_summaries(&self) -> Result<Vec<GroupSummary>, ConversionError> {
        let source = self
            .source
            .as_ref()
            .ok_or(ConversionError::SourceNotConfigured)?;
        let listings = parse_listings(&source.fetch()?)?;
        let overrides = self.store.snapshot()?;

        let summaries = group_census(&listings)
            .into_iter()
            .map(|count| {
                let rule = overrides.get(&count.name);
                let has = |check: fn(&GroupOverride) -> bool| rule.is_some_and(check);
                GroupSummary {
                    configured: rule.is_some(),
                    has_photos: has(|rule| !rule.photos.is_empty()),
                    has_description: has(|rule| !rule.description.trim().is_empty()),
                    has_development_id: has(|rule| !rule.development_id.trim().is_empty()),
                    has_building_id: has(|rule| !rule.building_id.trim().is_empty()),
                    name: count.name,
                    listings: count.listings,
                }
            })
            .collect();
        Ok(summaries)
    }

    /// Stored rule for a group, or an empty rule when none is configured.
    pub fn group_override(&self, group: &str) -> Result<GroupOverride, StoreError> {
        let group = clean_group_name(group);
        Ok(self.store.get(&group)?.unwrap_or_default())
    }

    /// Merges a partial update into the stored rule and returns the result.
    pub fn update_override(
        &self,
        group: &str,
        patch: OverridePatch,
    ) -> Result<GroupOverride, StoreError> {
        let group = clean_group_name(group);
        let _updating = relock(&self.override_lock);

        let merged = self.store.get(&group)?.unwrap_or_default().merge(patch);
        self.store.put(&group, merged.clone())?;
        info!(group = %group, "group override saved");
        self.record(
            RunLogLevel::Info,
            format!("settings saved for group {group}"),
        );
        Ok(merged)
    }

    fn record(&self, level: RunLogLevel, message: String) {
        let mut journal = relock(&self.journal);
        if journal.len() == JOURNAL_CAPACITY {
            journal.pop_front();
        }
        journal.push_back(RunLogEntry {
            timestamp: Local::now(),
            level,
            message,
        });
    }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::conversion::source::FetchError;
    use crate::workflows::conversion::store::MemoryOverrideStore;
    use std::sync::mpsc;

    const FEED: &str = r#"<feed>
  <offer internal-id="1"><building-name>Парк</building-name><new-flat>true</new-flat></offer>
  <offer internal-id="2"><building-name>Парк</building-name></offer>
  <offer internal-id="3"><building-name>Река</building-name></offer>
</feed>"#;

    struct StaticSource(&'static str);

    impl FeedSource for StaticSource {
        fn describe(&self) -> String {
            "static".to_string()
        }

        fn fetch(&self) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    /// Signals when a fetch starts and blocks until released.
    struct GatedSource {
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl FeedSource for GatedSource {
        fn describe(&self) -> String {
            "gated".to_string()
        }

        fn fetch(&self) -> Result<Vec<u8>, FetchError> {
            relock(&self.started).send(()).ok();
            relock(&self.release).recv().ok();
            Ok(FEED.as_bytes().to_vec())
        }
    }

    fn service_with(source: Arc<dyn FeedSource>, output: PathBuf) -> ConversionService {
        ConversionService::new(
            Some(source),
            Arc::new(MemoryOverrideStore::default()),
            output,
        )
    }

    #[test]
    fn run_writes_artifact_and_journals_success() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = dir.path().join("feed.xml");
        let service = service_with(Arc::new(StaticSource(FEED)), output.clone());

        let stats = service.run(RunTrigger::Manual).expect("run succeeds");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.errors, 0);

        let document = std::fs::read_to_string(&output).expect("artifact written");
        assert_eq!(document.matches("<Ad>").count(), 3);
        assert!(!staging_path(&output).exists());
        assert!(service.last_run().is_some());

        let journal = service.recent_runs(30);
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].level, RunLogLevel::Info);
        assert_eq!(journal[1].level, RunLogLevel::Success);
    }

    #[test]
    fn failed_run_keeps_previous_artifact() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = dir.path().join("feed.xml");
        std::fs::write(&output, "previous").expect("seed artifact");
        let service = service_with(Arc::new(StaticSource("<feed><offer>")), output.clone());

        let result = service.run(RunTrigger::Scheduled);
        assert!(matches!(result, Err(ConversionError::Parse(_))));
        assert_eq!(std::fs::read_to_string(&output).expect("artifact"), "previous");
        assert!(service.last_run().is_none());
        assert_eq!(service.recent_runs(1)[0].level, RunLogLevel::Error);
    }

    #[test]
    fn missing_source_is_reported() {
        let service = ConversionService::new(
            None,
            Arc::new(MemoryOverrideStore::default()),
            "unused.xml",
        );
        assert!(matches!(
            service.run(RunTrigger::Manual),
            Err(ConversionError::SourceNotConfigured)
        ));
    }

    #[test]
    fn overlapping_run_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let source = GatedSource {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        };
        let service = Arc::new(service_with(Arc::new(source), dir.path().join("feed.xml")));

        let background = {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.run(RunTrigger::Scheduled))
        };
        started_rx.recv().expect("first run started");

        assert!(matches!(
            service.run(RunTrigger::Manual),
            Err(ConversionError::RunInProgress)
        ));

        release_tx.send(()).expect("release first run");
        let first = background.join().expect("thread joins");
        assert!(first.is_ok());

        drop(release_tx);
        assert!(service.run(RunTrigger::Manual).is_ok());
    }

    #[test]
    fn journal_is_bounded() {
        let service = ConversionService::new(
            None,
            Arc::new(MemoryOverrideStore::default()),
            "unused.xml",
        );
        for _ in 0..80 {
            let _ = service.run(RunTrigger::Manual);
        }
        assert_eq!(service.recent_runs(usize::MAX).len(), JOURNAL_CAPACITY);
        assert_eq!(service.recent_runs(30).len(), 30);
    }

    #[test]
    fn group_summaries_merge_override_flags() {
        let mut rules = std::collections::BTreeMap::new();
        rules.insert(
            "Парк".to_string(),
            GroupOverride {
                building_id: "222".to_string(),
                photos: vec!["https://cdn.example/1.jpg".to_string()],
                ..GroupOverride::default()
            },
        );
        let service = ConversionService::new(
            Some(Arc::new(StaticSource(FEED))),
            Arc::new(MemoryOverrideStore::with_rules(rules)),
            "unused.xml",
        );

        let summaries = service.group_summaries().expect("census");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Парк");
        assert_eq!(summaries[0].listings, 2);
        assert!(summaries[0].configured && summaries[0].has_building_id && summaries[0].has_photos);
        assert!(!summaries[0].has_description);
        assert!(!summaries[1].configured);
    }

    #[test]
    fn override_updates_merge_and_clean_group_names() {
        let service = ConversionService::new(
            None,
            Arc::new(MemoryOverrideStore::default()),
            "unused.xml",
        );

        service
            .update_override(
                " \"Парк\" ",
                OverridePatch {
                    building_id: Some("222".to_string()),
                    ..OverridePatch::default()
                },
            )
            .expect("saved");
        let merged = service
            .update_override(
                "Парк",
                OverridePatch {
                    price_modifier: Some("+5%".to_string()),
                    ..OverridePatch::default()
                },
            )
            .expect("saved");

        assert_eq!(merged.building_id, "222");
        assert_eq!(merged.price_modifier, "+5%");
        assert_eq!(service.group_override("Парк").expect("read"), merged);
        assert_eq!(
            service.group_override("Unknown").expect("read"),
            GroupOverride::default()
        );
    }
}
