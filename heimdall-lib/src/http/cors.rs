use http::header::{HeaderMap, HeaderValue};
use http::{Method, Request, StatusCode};

use super::response::Response;
use crate::config::CorsConfig;
use crate::error::{Result, ServerError};

const ORIGIN: &str = "origin";
const REQUEST_METHOD: &str = "access-control-request-method";
const REQUEST_HEADERS: &str = "access-control-request-headers";
const ALLOW_ORIGIN: &str = "access-control-allow-origin";
const ALLOW_METHODS: &str = "access-control-allow-methods";
const ALLOW_HEADERS: &str = "access-control-allow-headers";
const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
const MAX_AGE: &str = "access-control-max-age";

/// CORS policy compiled from configuration.
///
/// A preflight that matches the policy is answered by the pipeline without
/// reaching user handlers; one that does not match falls through to normal
/// routing.
pub struct CorsPolicy {
    any_origin: bool,
    origins: Vec<String>,
    methods: Vec<Method>,
    any_headers: bool,
    allowed_headers: Vec<String>,
    methods_value: String,
    headers_value: String,
    max_age_secs: u64,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn from_config(cfg: &CorsConfig) -> Result<Self> {
        let any_origin = cfg.allowed_origins.iter().any(|o| o == "*");
        if any_origin && cfg.allow_credentials {
            return Err(ServerError::Config(
                "CORS wildcard origin cannot be combined with credentials".to_string(),
            ));
        }

        let mut methods = Vec::new();
        for name in &cfg.allowed_methods {
            let method = Method::from_bytes(name.as_bytes()).map_err(|e| {
                ServerError::Config(format!("Invalid CORS method '{name}': {e}"))
            })?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }

        let any_headers = cfg.allowed_headers.iter().any(|h| h == "*");
        let allowed_headers: Vec<String> =
            cfg.allowed_headers.iter().map(|h| h.to_ascii_lowercase()).collect();

        let methods_value = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let headers_value = allowed_headers.join(", ");

        Ok(Self {
            any_origin,
            origins: cfg.allowed_origins.clone(),
            methods,
            any_headers,
            allowed_headers,
            methods_value,
            headers_value,
            max_age_secs: cfg.max_age_secs,
            allow_credentials: cfg.allow_credentials,
        })
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.any_origin || self.origins.iter().any(|o| o == origin)
    }

    /// Answer a preflight request, if this policy has a matching rule.
    pub(crate) fn preflight<B>(&self, req: &Request<B>) -> Option<Response> {
        if req.method() != Method::OPTIONS {
            return None;
        }
        let origin = req.headers().get(ORIGIN)?.to_str().ok()?;
        let requested_method = req.headers().get(REQUEST_METHOD)?.to_str().ok()?;

        if !self.origin_allowed(origin) {
            return None;
        }
        let requested_method = Method::from_bytes(requested_method.as_bytes()).ok()?;
        if !self.methods.contains(&requested_method) {
            return None;
        }
        if !self.any_headers {
            if let Some(requested) = req.headers().get(REQUEST_HEADERS) {
                let requested = requested.to_str().ok()?;
                let all_allowed = requested
                    .split(',')
                    .map(|h| h.trim().to_ascii_lowercase())
                    .all(|h| h.is_empty() || self.allowed_headers.contains(&h));
                if !all_allowed {
                    return None;
                }
            }
        }

        let mut response = Response::new(StatusCode::NO_CONTENT)
            .header(ALLOW_ORIGIN, self.origin_header_value(origin))
            .header(ALLOW_METHODS, &self.methods_value)
            .header(MAX_AGE, &self.max_age_secs.to_string())
            .header("vary", "origin");
        if self.any_headers {
            if let Some(requested) = req.headers().get(REQUEST_HEADERS) {
                if let Ok(requested) = requested.to_str() {
                    response = response.header(ALLOW_HEADERS, requested);
                }
            }
        } else if !self.headers_value.is_empty() {
            response = response.header(ALLOW_HEADERS, &self.headers_value);
        }
        if self.allow_credentials {
            response = response.header(ALLOW_CREDENTIALS, "true");
        }
        Some(response)
    }

    /// Append response headers for an allowed cross-origin (non-preflight)
    /// request.
    pub(crate) fn apply(&self, request_headers: &HeaderMap, mut response: Response) -> Response {
        let Some(origin) = request_headers.get(ORIGIN).and_then(|v| v.to_str().ok()) else {
            return response;
        };
        if !self.origin_allowed(origin) {
            return response;
        }

        if let Ok(value) = HeaderValue::from_str(self.origin_header_value(origin)) {
            response.headers_mut().insert(ALLOW_ORIGIN, value);
        }
        if self.allow_credentials {
            response
                .headers_mut()
                .insert(ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        if !self.any_origin {
            response.headers_mut().insert("vary", HeaderValue::from_static("origin"));
        }
        response
    }

    fn origin_header_value<'a>(&self, origin: &'a str) -> &'a str {
        if self.any_origin && !self.allow_credentials {
            "*"
        } else {
            origin
        }
    }
}
