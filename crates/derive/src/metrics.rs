//! Prometheus collectors for the derivation pipeline.
//!
//! Stage code records into these through the [crate::inc], [crate::set], [crate::observe] and
//! [crate::timer] macros, which compile to nothing without the `metrics` feature.

use lazy_static::lazy_static;
use prometheus::{
    self, opts, register_counter_vec, register_gauge_vec, register_histogram,
    register_histogram_vec, register_int_gauge, CounterVec, GaugeVec, Histogram, HistogramVec,
    IntGauge,
};

const RESPONSE_TIME_CUSTOM_BUCKETS: &[f64; 18] = &[
    0.00001, 0.00005, 0.0001, 0.0002, 0.0005, 0.001, 0.002, 0.005, 0.008, 0.01, 0.02, 0.05, 0.08,
    0.1, 0.2, 0.5, 0.8, 1.0,
];

lazy_static! {
    /// Tracks the L1 origin of the L1 traversal stage.
    pub static ref ORIGIN_GAUGE: IntGauge = register_int_gauge!(
        "mako_derive_origin_gauge",
        "Tracks the L1 origin of the L1 traversal stage"
    ).expect("Origin Gauge failed to register");

    /// Tracks the estimated size of the channel bank in bytes.
    pub static ref CHANNEL_BANK_SIZE: IntGauge = register_int_gauge!(
        "mako_derive_channel_bank_size",
        "Estimated size of the channel bank in bytes"
    ).expect("Channel bank size failed to register");

    /// Tracks the number of frames in the channel being assembled.
    pub static ref CURRENT_CHANNEL_FRAMES: IntGauge = register_int_gauge!(
        "mako_derive_current_channel_frames",
        "Number of frames in the channel being assembled"
    ).expect("Current channel frames failed to register");

    /// Tracks derived and dropped frames by status.
    pub static ref DERIVED_FRAMES_COUNT: GaugeVec = {
        let opts = opts!("mako_derive_derived_frames_count", "Number of derived frames");
        register_gauge_vec!(opts, &["status"]).expect("Derived Frames Count failed to register")
    };

    /// Tracks the age of channels at timeout, in L1 blocks.
    pub static ref CHANNEL_TIMEOUTS: Histogram = {
        let channel_timeout_buckets: [f64; 100] = core::array::from_fn(|i| (i * 10) as f64);
        register_histogram!(
            "mako_derive_channel_timeouts",
            "Channel timeouts",
            channel_timeout_buckets.to_vec()
        ).expect("Failed to register histogram")
    };

    /// Tracks batch reader errors.
    pub static ref BATCH_READER_ERRORS: CounterVec = register_counter_vec!(
        "mako_derive_batch_reader_errors",
        "Number of batch reader errors",
        &["error"]
    ).expect("Batch Reader Errors failed to register");

    /// Tracks dropped batches by reason.
    pub static ref DROPPED_BATCHES: CounterVec = register_counter_vec!(
        "mako_derive_dropped_batches",
        "Number of dropped batches",
        &["reason"]
    ).expect("Dropped batches failed to register");

    /// Tracks pipeline step results by class.
    pub static ref PIPELINE_STEPS: CounterVec = register_counter_vec!(
        "mako_derive_pipeline_steps",
        "Pipeline step results",
        &["result"]
    ).expect("Pipeline steps failed to register");

    /// Tracks signals received by the pipeline.
    pub static ref PIPELINE_SIGNALS: CounterVec = register_counter_vec!(
        "mako_derive_pipeline_signals",
        "Signals received by the pipeline",
        &["type"]
    ).expect("Pipeline signals failed to register");

    /// Tracks the number of errors in provider methods.
    pub static ref PROVIDER_ERRORS: CounterVec = register_counter_vec!(
        "mako_derive_provider_errors",
        "Number of provider errors",
        &["provider", "method", "error"]
    ).expect("Provider Errors failed to register");

    /// Tracks the time taken for stage advance methods.
    pub static ref STAGE_ADVANCE_RESPONSE_TIME: HistogramVec = register_histogram_vec!(
        "mako_derive_stage_advance_response_time_seconds",
        "Stage advance response times",
        &["stage"],
        RESPONSE_TIME_CUSTOM_BUCKETS.to_vec()
    ).expect("Failed to register histogram vec");
}
