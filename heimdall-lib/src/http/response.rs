use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use serde::Serialize;

pub(crate) type RespBody = BoxBody<Bytes, hyper::Error>;

/// Handler-facing response: a status, headers, and body bytes.
///
/// Serialization to the wire happens in the pipeline, which is also where
/// the response-code meter ticks.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// 200 with an empty body.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// 200 with a text/plain body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK)
            .header("content-type", "text/plain; charset=utf-8")
            .body(Bytes::from(body.into()))
    }

    /// 200 with an application/json body.
    pub fn json<T: Serialize>(value: &T) -> std::result::Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::new(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Bytes::from(bytes)))
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a header; invalid names or values are silently skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn into_hyper(self) -> hyper::Response<RespBody> {
        let body = Full::new(self.body)
            .map_err(|never| match never {})
            .boxed();
        let mut resp = hyper::Response::new(body);
        *resp.status_mut() = self.status;
        *resp.headers_mut() = self.headers;
        resp
    }
}
