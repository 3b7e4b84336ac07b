//! Pipeline metrics.
//!
//! Counters and histograms for ingestion and consolidation, complementing
//! the structured logging already in place.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Records ingested counter.
pub const RECORDS_INGESTED: &str = "weft_records_ingested_total";

/// Consolidation runs counter (per dataset attempt).
pub const CONSOLIDATION_RUNS: &str = "weft_consolidation_runs_total";

/// Consolidation failures counter.
pub const CONSOLIDATION_FAILURES: &str = "weft_consolidation_failures_total";

/// Records folded into manifests counter.
pub const RECORDS_CONSOLIDATED: &str = "weft_records_consolidated_total";

/// Consolidation run duration histogram.
pub const CONSOLIDATION_DURATION: &str = "weft_consolidation_duration_seconds";

/// Registers all pipeline metric descriptions.
///
/// Call this once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(RECORDS_INGESTED, "Total records ingested");
    describe_counter!(CONSOLIDATION_RUNS, "Total per-dataset consolidation attempts");
    describe_counter!(CONSOLIDATION_FAILURES, "Total failed consolidation attempts");
    describe_counter!(RECORDS_CONSOLIDATED, "Total records folded into manifests");
    describe_histogram!(
        CONSOLIDATION_DURATION,
        "Duration of per-dataset consolidation runs in seconds"
    );
}

/// Records a successful ingest.
pub fn record_ingest() {
    counter!(RECORDS_INGESTED).increment(1);
}

/// Records a completed consolidation attempt.
pub fn record_consolidation(records_folded: u64, duration_secs: f64) {
    counter!(CONSOLIDATION_RUNS).increment(1);
    counter!(RECORDS_CONSOLIDATED).increment(records_folded);
    histogram!(CONSOLIDATION_DURATION).record(duration_secs);
}

/// Records a failed consolidation attempt.
pub fn record_consolidation_failure() {
    counter!(CONSOLIDATION_RUNS).increment(1);
    counter!(CONSOLIDATION_FAILURES).increment(1);
}
