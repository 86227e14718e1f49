use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub assignments_total: IntCounterVec,
    pub status_updates_total: IntCounterVec,
    pub otp_verifications_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub notifications_in_queue: IntGauge,
    pub partial_failures_total: IntCounter,
    pub workflow_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Order assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Status updates by target status and outcome"),
            &["status", "outcome"],
        )
        .expect("valid status_updates_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "OTP verifications by outcome"),
            &["outcome"],
        )
        .expect("valid otp_verifications_total metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Notifications by delivery outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        let notifications_in_queue = IntGauge::new(
            "notifications_in_queue",
            "Notifications waiting for the outbox worker",
        )
        .expect("valid notifications_in_queue metric");

        let partial_failures_total = IntCounter::new(
            "partial_failures_total",
            "Committed state changes whose notification step failed",
        )
        .expect("valid partial_failures_total metric");

        let workflow_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "workflow_latency_seconds",
                "Latency of workflow operations in seconds",
            ),
            &["operation"],
        )
        .expect("valid workflow_latency_seconds metric");

        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");
        registry
            .register(Box::new(notifications_in_queue.clone()))
            .expect("register notifications_in_queue");
        registry
            .register(Box::new(partial_failures_total.clone()))
            .expect("register partial_failures_total");
        registry
            .register(Box::new(workflow_latency_seconds.clone()))
            .expect("register workflow_latency_seconds");

        Self {
            registry,
            assignments_total,
            status_updates_total,
            otp_verifications_total,
            notifications_total,
            notifications_in_queue,
            partial_failures_total,
            workflow_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
