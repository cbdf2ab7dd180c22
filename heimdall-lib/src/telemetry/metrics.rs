use http::StatusCode;
use opentelemetry::metrics::{Counter, Meter, MeterProvider, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;

use crate::error::{Result, ServerError};

/// Response-code meters: one named counter per recognized status code plus a
/// catch-all. Exactly one of them increments for every response written.
#[derive(Clone)]
pub struct ResponseCodeMeters {
    ok: Counter<u64>,
    created: Counter<u64>,
    accepted: Counter<u64>,
    no_content: Counter<u64>,
    bad_request: Counter<u64>,
    unauthorized: Counter<u64>,
    forbidden: Counter<u64>,
    not_found: Counter<u64>,
    too_many_requests: Counter<u64>,
    server_error: Counter<u64>,
    other: Counter<u64>,
}

impl ResponseCodeMeters {
    fn new(meter: &Meter) -> Self {
        let code_counter = |name: &'static str, code: &'static str| {
            meter
                .u64_counter(name)
                .with_description(format!("Responses written with status {code}"))
                .build()
        };
        Self {
            ok: code_counter("heimdall_responses_ok", "200"),
            created: code_counter("heimdall_responses_created", "201"),
            accepted: code_counter("heimdall_responses_accepted", "202"),
            no_content: code_counter("heimdall_responses_no_content", "204"),
            bad_request: code_counter("heimdall_responses_bad_request", "400"),
            unauthorized: code_counter("heimdall_responses_unauthorized", "401"),
            forbidden: code_counter("heimdall_responses_forbidden", "403"),
            not_found: code_counter("heimdall_responses_not_found", "404"),
            too_many_requests: code_counter("heimdall_responses_too_many_requests", "429"),
            server_error: code_counter("heimdall_responses_server_error", "500"),
            other: code_counter("heimdall_responses_other", "any other"),
        }
    }

    pub fn record(&self, status: StatusCode) {
        let counter = match status.as_u16() {
            200 => &self.ok,
            201 => &self.created,
            202 => &self.accepted,
            204 => &self.no_content,
            400 => &self.bad_request,
            401 => &self.unauthorized,
            403 => &self.forbidden,
            404 => &self.not_found,
            429 => &self.too_many_requests,
            500 => &self.server_error,
            _ => &self.other,
        };
        counter.add(1, &[]);
    }
}

/// The server's meters, backed by a prometheus registry owned by the server
/// context. No process-global provider is installed, so each server (and
/// each test) gets an independent registry.
#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,
    pub connections_rejected_total: Counter<u64>,
    pub connections_filtered_total: Counter<u64>,
    pub tls_handshake_errors_total: Counter<u64>,

    /// Ticks on every received request regardless of outcome.
    pub requests_total: Counter<u64>,
    /// Labeled per route, ticks on every routed request.
    pub route_requests_total: Counter<u64>,
    pub response_codes: ResponseCodeMeters,

    meter: Meter,
    // Dropping the provider detaches the prometheus reader.
    _provider: SdkMeterProvider,
}

impl Metrics {
    fn new(provider: SdkMeterProvider) -> Self {
        let meter = provider.meter("heimdall");
        Self {
            connections_total: meter
                .u64_counter("heimdall_connections_total")
                .with_description("Total number of connections accepted into the pipeline")
                .build(),
            connections_active: meter
                .i64_up_down_counter("heimdall_connections_active")
                .with_description("Number of currently open connections")
                .build(),
            connections_rejected_total: meter
                .u64_counter("heimdall_connections_rejected")
                .with_description("Connections dropped at the connection limiter")
                .build(),
            connections_filtered_total: meter
                .u64_counter("heimdall_connections_filtered")
                .with_description("Connections closed by the IP filter before TLS")
                .build(),
            tls_handshake_errors_total: meter
                .u64_counter("heimdall_tls_handshake_errors")
                .with_description("TLS handshakes that failed")
                .build(),
            requests_total: meter
                .u64_counter("heimdall_requests")
                .with_description("Total number of requests received")
                .build(),
            route_requests_total: meter
                .u64_counter("heimdall_route_requests")
                .with_description("Requests dispatched per route")
                .build(),
            response_codes: ResponseCodeMeters::new(&meter),
            meter,
            _provider: provider,
        }
    }

    /// The meter shared with collaborating components (e.g. the firewall).
    pub fn meter(&self) -> &Meter {
        &self.meter
    }
}

/// Build the meters and the registry they export into.
pub fn init_metrics() -> Result<(Metrics, Registry)> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .map_err(|e| ServerError::Telemetry(format!("Failed to build metrics exporter: {e}")))?;

    let provider = SdkMeterProvider::builder().with_reader(exporter).build();

    Ok((Metrics::new(provider), registry))
}

/// Sum a counter family's values, matching by name substring so exporter
/// suffixes like `_total` do not matter. Missing families read as zero.
#[cfg(test)]
pub(crate) fn counter_value(registry: &Registry, name: &str) -> f64 {
    registry
        .gather()
        .iter()
        .filter(|family| family.get_name().contains(name))
        .flat_map(|family| family.get_metric())
        .map(|metric| metric.get_counter().value())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_are_independent() {
        let (metrics_a, registry_a) =
            init_metrics().unwrap_or_else(|e| panic!("metrics init failed: {e}"));
        let (_metrics_b, registry_b) =
            init_metrics().unwrap_or_else(|e| panic!("metrics init failed: {e}"));

        metrics_a.requests_total.add(3, &[]);
        assert_eq!(counter_value(&registry_a, "heimdall_requests"), 3.0);
        assert_eq!(counter_value(&registry_b, "heimdall_requests"), 0.0);
    }

    #[test]
    fn test_exactly_one_code_meter_per_response() {
        let (metrics, registry) =
            init_metrics().unwrap_or_else(|e| panic!("metrics init failed: {e}"));

        metrics.response_codes.record(StatusCode::OK);
        metrics.response_codes.record(StatusCode::NOT_FOUND);
        metrics.response_codes.record(StatusCode::TOO_MANY_REQUESTS);
        // 418 is not a recognized code; it lands in the catch-all.
        metrics.response_codes.record(StatusCode::IM_A_TEAPOT);

        assert_eq!(counter_value(&registry, "heimdall_responses_ok"), 1.0);
        assert_eq!(counter_value(&registry, "heimdall_responses_not_found"), 1.0);
        assert_eq!(counter_value(&registry, "heimdall_responses_too_many_requests"), 1.0);
        assert_eq!(counter_value(&registry, "heimdall_responses_other"), 1.0);
        assert_eq!(counter_value(&registry, "heimdall_responses_server_error"), 0.0);

        let total: f64 = [
            "heimdall_responses_ok",
            "heimdall_responses_created",
            "heimdall_responses_accepted",
            "heimdall_responses_no_content",
            "heimdall_responses_bad_request",
            "heimdall_responses_unauthorized",
            "heimdall_responses_forbidden",
            "heimdall_responses_not_found",
            "heimdall_responses_too_many_requests",
            "heimdall_responses_server_error",
            "heimdall_responses_other",
        ]
        .iter()
        .map(|name| counter_value(&registry, name))
        .sum();
        assert_eq!(total, 4.0);
    }
}
