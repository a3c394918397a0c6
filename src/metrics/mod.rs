use prometheus::{Counter, Histogram, Registry};

pub mod server;

pub use server::{spawn_metrics_server, MetricsState};

pub struct MetricsRegistry {
    pub registry: Registry,

    // Event intake
    pub events_received_total: Counter,
    pub events_ignored_total: Counter,

    // Ingestion
    pub ingest_duration: Histogram,
    pub ingest_success_total: Counter,
    pub ingest_skipped_total: Counter,
    pub ingest_errors_total: Counter,
    pub chunks_indexed_total: Counter,

    // Deletion failures are swallowed so event processing can continue;
    // this counter is how they stay visible.
    pub delete_errors_swallowed_total: Counter,

    // Search
    pub search_duration: Histogram,
    pub search_errors_total: Counter,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_received_total = Counter::new(
            "events_received_total",
            "Total number of repository events received",
        )?;

        let events_ignored_total = Counter::new(
            "events_ignored_total",
            "Total number of events with an unsupported type",
        )?;

        // Ingestion covers download, extraction and embedding (1ms to 10 minutes)
        let ingest_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "ingest_duration_seconds",
                "Attachment ingestion duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0, 300.0,
                600.0,
            ]),
        )?;

        let ingest_success_total = Counter::new(
            "ingest_success_total",
            "Total number of attachments ingested",
        )?;

        let ingest_skipped_total = Counter::new(
            "ingest_skipped_total",
            "Total number of attachments skipped because they were already indexed",
        )?;

        let ingest_errors_total = Counter::new(
            "ingest_errors_total",
            "Total number of failed attachment ingestions",
        )?;

        let chunks_indexed_total = Counter::new(
            "chunks_indexed_total",
            "Total number of text chunks written to the index",
        )?;

        let delete_errors_swallowed_total = Counter::new(
            "delete_errors_swallowed_total",
            "Total number of index deletion errors that were logged and suppressed",
        )?;

        let search_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "search_duration_seconds",
                "Search query duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;

        let search_errors_total =
            Counter::new("search_errors_total", "Total number of search errors")?;

        registry.register(Box::new(events_received_total.clone()))?;
        registry.register(Box::new(events_ignored_total.clone()))?;
        registry.register(Box::new(ingest_duration.clone()))?;
        registry.register(Box::new(ingest_success_total.clone()))?;
        registry.register(Box::new(ingest_skipped_total.clone()))?;
        registry.register(Box::new(ingest_errors_total.clone()))?;
        registry.register(Box::new(chunks_indexed_total.clone()))?;
        registry.register(Box::new(delete_errors_swallowed_total.clone()))?;
        registry.register(Box::new(search_duration.clone()))?;
        registry.register(Box::new(search_errors_total.clone()))?;

        Ok(Self {
            registry,
            events_received_total,
            events_ignored_total,
            ingest_duration,
            ingest_success_total,
            ingest_skipped_total,
            ingest_errors_total,
            chunks_indexed_total,
            delete_errors_swallowed_total,
            search_duration,
            search_errors_total,
        })
    }
}
