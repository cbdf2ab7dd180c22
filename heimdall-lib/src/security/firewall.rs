use http::Request;
use opentelemetry::metrics::{Counter, Meter};

use crate::config::FirewallConfig;

/// Protocol-level anomaly counters.
///
/// The firewall observes; it never blocks. Requests crossing a ceiling are
/// still processed, and the counters exist for operators and alerting.
#[derive(Clone)]
pub struct Firewall {
    oversized_headers: Counter<u64>,
    malformed_frames: Counter<u64>,
    request_line_too_long: Counter<u64>,
    max_header_bytes: usize,
    max_request_line_bytes: usize,
}

impl Firewall {
    pub fn new(meter: &Meter, cfg: &FirewallConfig) -> Self {
        Self {
            oversized_headers: meter
                .u64_counter("heimdall_oversized_headers")
                .with_description("Requests whose header block exceeded the configured ceiling")
                .build(),
            malformed_frames: meter
                .u64_counter("heimdall_malformed_frames")
                .with_description("Connections that failed HTTP framing or frame decoding")
                .build(),
            request_line_too_long: meter
                .u64_counter("heimdall_request_line_too_long")
                .with_description("Requests whose request line exceeded the configured ceiling")
                .build(),
            max_header_bytes: cfg.max_header_bytes,
            max_request_line_bytes: cfg.max_request_line_bytes,
        }
    }

    /// Inspect a decoded request head against the configured ceilings.
    pub fn inspect<B>(&self, req: &Request<B>) {
        let header_bytes: usize = req
            .headers()
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        if header_bytes > self.max_header_bytes {
            self.oversized_headers.add(1, &[]);
        }

        // method + SP + uri + SP + "HTTP/1.1"
        let uri_len = req.uri().to_string().len();
        let line_len = req.method().as_str().len() + 1 + uri_len + 9;
        if line_len > self.max_request_line_bytes {
            self.request_line_too_long.add(1, &[]);
        }
    }

    /// Record a framing failure observed while serving a connection.
    pub fn record_malformed_frame(&self) {
        self.malformed_frames.add(1, &[]);
    }
}
