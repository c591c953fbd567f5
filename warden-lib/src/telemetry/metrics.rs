use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use std::sync::Arc;

use crate::error::{Result, WardenError};

pub mod labels {
    pub const DECISION: &str = "decision";
    pub const CLASS: &str = "class";
    pub const REASON: &str = "reason";
    pub const EVENT: &str = "event";
    pub const VERSION: &str = "version";
}

#[derive(Clone)]
pub struct Metrics {
    pub decisions_total: Counter<u64>,
    pub blocks_total: Counter<u64>,
    pub reputation_penalties_total: Counter<u64>,
    pub exempt_total: Counter<u64>,
    pub evictions_total: Counter<u64>,

    // Build info
    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            decisions_total: meter
                .u64_counter("warden_decisions_total")
                .with_description("Total number of rate limit decisions by outcome and class")
                .build(),
            blocks_total: meter
                .u64_counter("warden_blocks_total")
                .with_description("Total number of blocks created, by reason")
                .build(),
            reputation_penalties_total: meter
                .u64_counter("warden_reputation_penalties_total")
                .with_description("Total number of reputation penalties applied, by event")
                .build(),
            exempt_total: meter
                .u64_counter("warden_exempt_total")
                .with_description("Requests from exempt networks that skipped limiting")
                .build(),
            evictions_total: meter
                .u64_counter("warden_evictions_total")
                .with_description("Idle clients evicted by the sweeper")
                .build(),
            build_info: meter
                .u64_gauge("warden_build_info")
                .with_description("Build information")
                .build(),
        }
    }

    pub fn set_build_info(&self) {
        self.build_info
            .record(1, &[KeyValue::new(labels::VERSION, env!("CARGO_PKG_VERSION"))]);
    }

    pub fn record_decision(&self, decision: &str, class: &str) {
        self.decisions_total.add(
            1,
            &[
                KeyValue::new(labels::DECISION, decision.to_string()),
                KeyValue::new(labels::CLASS, class.to_string()),
            ],
        );
    }

    pub fn record_block(&self, reason: &str) {
        self.blocks_total
            .add(1, &[KeyValue::new(labels::REASON, reason.to_string())]);
    }

    pub fn record_penalty(&self, event: &str) {
        self.reputation_penalties_total
            .add(1, &[KeyValue::new(labels::EVENT, event.to_string())]);
    }

    pub fn record_exempt(&self) {
        self.exempt_total.add(1, &[]);
    }

    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions_total.add(count, &[]);
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry)> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| WardenError::Metrics(format!("Failed to build exporter: {e}")))?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("warden");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| WardenError::Metrics(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| WardenError::Metrics(format!("Metrics output is not UTF-8: {e}")))
}
