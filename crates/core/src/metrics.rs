//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Subtitle search (per-provider requests, candidates found)
//! - Subtitle downloads
//! - Library scans

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Subtitle searches total, started via the orchestrator.
pub static SEARCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("subscout_searches_total", "Total subtitle searches").unwrap()
});

/// Provider search requests by provider and result.
pub static PROVIDER_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "subscout_provider_searches_total",
            "Total provider search requests",
        ),
        &["provider", "result"], // "success", "error", "timeout", "skipped"
    )
    .unwrap()
});

/// Provider search duration in seconds.
pub static PROVIDER_SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subscout_provider_search_duration_seconds",
            "Duration of provider search requests",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0]),
        &["provider"],
    )
    .unwrap()
});

/// Candidates found per search.
pub static CANDIDATES_FOUND: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "subscout_candidates_found",
            "Number of candidates found per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 40.0, 80.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Subtitle downloads by provider and result.
pub static DOWNLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_downloads_total", "Total subtitle downloads"),
        &["provider", "result"], // "success", "failed", "exists"
    )
    .unwrap()
});

// =============================================================================
// Scan Metrics
// =============================================================================

/// Library scans by result.
pub static SCANS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("subscout_scans_total", "Total library scans"),
        &["result"], // "completed", "failed", "timeout"
    )
    .unwrap()
});

/// Video files seen by scans.
pub static VIDEO_FILES_SCANNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "subscout_video_files_scanned_total",
        "Total video files seen by scans",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(PROVIDER_SEARCHES.clone()),
        Box::new(PROVIDER_SEARCH_DURATION.clone()),
        Box::new(CANDIDATES_FOUND.clone()),
        // Downloads
        Box::new(DOWNLOADS_TOTAL.clone()),
        // Scans
        Box::new(SCANS_TOTAL.clone()),
        Box::new(VIDEO_FILES_SCANNED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        PROVIDER_SEARCHES
            .with_label_values(&["assrt", "success"])
            .inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "subscout_provider_searches_total"));
    }
}
