use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Queue {
    pub queue: String,
}

impl Queue {
    pub fn new(index: usize) -> Self {
        Self {
            queue: index.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    pub cycles: Counter,
    pub bytes_sent: Counter,
    pub early_finishes: Counter,
    pub backlog_bytes: Gauge,
    pub queue_bytes_sent: Family<Queue, Counter>,
}

impl Metrics {
    pub fn register(&self, registry: &mut Registry) {
        registry.register("cycles", "Number of cycles executed", self.cycles.clone());
        registry.register(
            "bytes_sent",
            "Total bytes sent through the port",
            self.bytes_sent.clone(),
        );
        registry.register(
            "early_finishes",
            "Number of drain passes stopped by a full shared buffer",
            self.early_finishes.clone(),
        );
        registry.register(
            "backlog_bytes",
            "Bytes pending across all queues",
            self.backlog_bytes.clone(),
        );
        registry.register(
            "queue_bytes_sent",
            "Total bytes sent by each queue",
            self.queue_bytes_sent.clone(),
        );
    }
}
