//! # Telemetry Features
//!
//! Console logging is always on. OpenTelemetry export is opt-in through
//! features.
//!
//! ## Feature matrix
//!
//! - `tracing` (default): `tracing` spans and events, plus an OpenTelemetry
//!   tracer provider.
//! - `metrics`: OpenTelemetry metrics (job, generation, and query counters).
//! - `stdout`: Exports spans and metrics to stdout.
//!
//! ## Span behavior
//!
//! - Each job runs inside a `job` span; each generation's fan-out is
//!   instrumented with the generation number.
//! - Events outside of a span are only shown in log output (via
//!   `fmt::layer()`), not exported.
//!
//! ## Example usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --features tracing,metrics,stdout -- coordinator --workers 127.0.0.1:8040
//! ```

// Disallow using `stdout` without `tracing` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down the exporters. Errors are reported on stderr
    /// since the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry(service_name: &'static str) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer(service_name)?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics(service_name)?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder("lifegrid")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    #[cfg(not(any(feature = "metrics", feature = "tracing")))]
    let _ = service_name;

    // Always log to the console via `tracing_subscriber::fmt`. This is
    // unrelated to the `opentelemetry_stdout` exporter.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource(service_name: &'static str) -> Resource {
    Resource::builder()
        .with_service_name(service_name)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics(service_name: &'static str) -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource(service_name));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
fn init_tracer(service_name: &'static str) -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource(service_name));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    Ok(builder.build())
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static JOBS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOBS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static JOB_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static GENERATIONS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static GENERATION_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PARTITIONS_COMPUTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static STATUS_QUERIES: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = JOBS.set(
        meter
            .u64_counter("jobs")
            .with_description("Jobs accepted by the coordinator")
            .build(),
    );

    let _ = JOBS_INFLIGHT.set(
        meter
            .i64_up_down_counter("jobs_inflight")
            .with_description("Jobs currently running")
            .build(),
    );

    let _ = JOB_ERRORS.set(
        meter
            .u64_counter("job_errors")
            .with_description("Jobs that failed or were cancelled")
            .build(),
    );

    let _ = GENERATIONS.set(
        meter
            .u64_counter("generations_completed")
            .with_description("Generations stitched by the coordinator")
            .build(),
    );

    let _ = GENERATION_DURATION_MS.set(
        meter
            .f64_histogram("generation_duration")
            .with_unit("ms")
            .with_description("Fan-out to stitch latency of one generation")
            .build(),
    );

    let _ = PARTITIONS_COMPUTED.set(
        meter
            .u64_counter("partitions_computed")
            .with_description("Partitions stepped by this worker")
            .build(),
    );

    let _ = STATUS_QUERIES.set(
        meter
            .u64_counter("status_queries")
            .with_description("Status queries answered")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_jobs() {
    if let Some(counter) = JOBS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs() {}

#[cfg(feature = "metrics")]
pub fn increment_jobs_inflight() {
    if let Some(counter) = JOBS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_jobs_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_jobs_inflight() {
    if let Some(counter) = JOBS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_jobs_inflight() {}

#[cfg(feature = "metrics")]
pub fn increment_job_errors() {
    if let Some(counter) = JOB_ERRORS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_job_errors() {}

#[cfg(feature = "metrics")]
pub fn increment_generations() {
    if let Some(counter) = GENERATIONS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_generations() {}

#[cfg(feature = "metrics")]
pub fn record_generation_duration(duration_ms: f64) {
    if let Some(histogram) = GENERATION_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_generation_duration(_duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn increment_partitions_computed() {
    if let Some(counter) = PARTITIONS_COMPUTED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_partitions_computed() {}

#[cfg(feature = "metrics")]
pub fn increment_status_queries() {
    if let Some(counter) = STATUS_QUERIES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_status_queries() {}
