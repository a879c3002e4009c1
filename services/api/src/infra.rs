use feed_relay::config::AppConfig;
use feed_relay::workflows::conversion::{feed_source, ConversionService, JsonFileOverrideStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wires the configured feed source and override file into a conversion service.
pub(crate) fn build_service(config: &AppConfig) -> ConversionService {
    let source = config
        .feed
        .source_url
        .as_deref()
        .map(|location| feed_source(location, config.feed.fetch_timeout));
    let store = Arc::new(JsonFileOverrideStore::new(&config.feed.overrides_path));

    ConversionService::new(source, store, &config.feed.output_path)
}
