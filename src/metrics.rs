//! Metrics for `flockgate`.

use prometrics::metrics::{Counter, CounterBuilder};

use crate::Result;

#[derive(Debug, Clone)]
pub struct GatewayMetrics {
    pub(crate) forward_requests_total: Counter,
    pub(crate) forward_failures_total: Counter,
    pub(crate) evicted_connections_total: Counter,
    pub(crate) poll_timeouts_total: Counter,
    pub(crate) local_read_failures_total: Counter,
    pub(crate) remote_reads_total: Counter,
    pub(crate) cache_requests_total: Counter,
}
impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        Ok(GatewayMetrics {
            forward_requests_total: track!(counter(
                "forward_requests_total",
                "Number of requests forwarded to every replica"
            ))?,
            forward_failures_total: track!(counter(
                "forward_failures_total",
                "Number of forwarded requests that failed"
            ))?,
            evicted_connections_total: track!(counter(
                "evicted_connections_total",
                "Number of connections evicted from the pool"
            ))?,
            poll_timeouts_total: track!(counter(
                "poll_timeouts_total",
                "Number of timeouts while waiting for replica responses"
            ))?,
            local_read_failures_total: track!(counter(
                "local_read_failures_total",
                "Number of failed local reads"
            ))?,
            remote_reads_total: track!(counter(
                "remote_reads_total",
                "Number of single-shot remote reads"
            ))?,
            cache_requests_total: track!(counter(
                "cache_requests_total",
                "Number of requests delegated to the object cache"
            ))?,
        })
    }
}

fn counter(name: &str, help: &str) -> Result<Counter> {
    let counter = track!(CounterBuilder::new(name)
        .namespace("flockgate")
        .subsystem("gateway")
        .help(help)
        .default_registry()
        .finish())?;
    Ok(counter)
}
