//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Task queue (running tasks, faults)
//! - Conversions (results, durations, renames)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Task queue
// =============================================================================

/// Tasks currently running across all queues.
pub static TASKS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("sonata_tasks_running", "Tasks currently running")
        .expect("metric options are valid")
});

/// Faults contained by the scheduler (task errors and panics outside the
/// normal error path).
pub static TASK_FAULTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sonata_task_faults_total",
        "Total faults contained by the task scheduler",
    )
    .expect("metric options are valid")
});

// =============================================================================
// Conversions
// =============================================================================

/// Conversions started by output format.
pub static CONVERSIONS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sonata_conversions_started_total", "Total conversions started"),
        &["format"],
    )
    .expect("metric options are valid")
});

/// Finished conversions by result.
pub static CONVERSIONS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sonata_conversions_finished_total",
            "Total conversions finished",
        ),
        &["result"], // "converted", "failed", "rename_failed"
    )
    .expect("metric options are valid")
});

/// Duration of the converted audio in seconds.
pub static AUDIO_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sonata_audio_duration_seconds",
            "Duration of successfully converted inputs",
        )
        .buckets(vec![30.0, 60.0, 180.0, 300.0, 600.0, 1200.0, 3600.0]),
        &["format"],
    )
    .expect("metric options are valid")
});

/// Wall-clock duration of whole batches in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("sonata_batch_duration_seconds", "Duration of conversion batches")
            .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &["result"], // "success", "errors", "aborted"
    )
    .expect("metric options are valid")
});

/// Numbered suffixes needed to find a free target name.
pub static NAME_COLLISIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sonata_name_collisions_total",
        "Total target name collisions resolved with a numbered suffix",
    )
    .expect("metric options are valid")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Task queue
        Box::new(TASKS_RUNNING.clone()),
        Box::new(TASK_FAULTS.clone()),
        // Conversions
        Box::new(CONVERSIONS_STARTED.clone()),
        Box::new(CONVERSIONS_FINISHED.clone()),
        Box::new(AUDIO_DURATION.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(NAME_COLLISIONS.clone()),
    ]
}
