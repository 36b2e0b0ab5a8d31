//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Build a [`Response`] in your handler and return it. When the same data can
//! go out as JSON or HTML, [`Response::negotiate`] picks for you from the
//! request's `Accept` and AJAX headers.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::{error, warn};

use crate::request::Request;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use deft::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use deft::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder().bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    inner: http::Response<Full<Bytes>>,
}

impl Response {
    /// `200 OK` with pre-serialized JSON bytes.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` with `value` serialized as JSON. A value that fails to
    /// serialize becomes `500 Internal Server Error`.
    pub fn json_value<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::builder().json_value(value)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::builder().html(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    /// Sends `value` as JSON or as the HTML produced by `render`, whichever
    /// the client asked for.
    ///
    /// JSON goes out when [`Request::expects_json`] holds or the client
    /// prefers `application/json` over `text/html`. A client without an
    /// `Accept` header gets HTML. A client that accepts neither gets
    /// `406 Not Acceptable`.
    pub fn negotiate<T, F>(req: &Request, value: &T, render: F) -> Self
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> String,
    {
        if req.expects_json() {
            return Self::json_value(value);
        }
        if req.accepts_any_content_type() {
            return Self::html(render(value));
        }
        match req.prefers(["text/html", "application/json"]).as_deref() {
            Some("application/json") => Self::json_value(value),
            Some(_) => Self::html(render(value)),
            None => Self::status(StatusCode::NOT_ACCEPTABLE),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        self.inner
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method, so the content type always matches.
#[derive(Debug)]
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped
    /// with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = name, "dropping invalid response header"),
        }
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json.as_str(), body.into())
    }

    pub fn json_value<T: Serialize + ?Sized>(self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.json(bytes),
            Err(e) => {
                error!(error = %e, "failed to serialize json response");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text.as_str(), Bytes::from(body.into()))
    }

    pub fn html(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Html.as_str(), Bytes::from(body.into()))
    }

    /// Terminate with a typed body. Use this for XML, CSV, binary, SSE, etc.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type.as_str(), body.into())
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> Response {
        self.build(None, Bytes::new())
    }

    fn finish(self, content_type: &'static str, body: Bytes) -> Response {
        self.build(Some(content_type), body)
    }

    fn build(self, content_type: Option<&'static str>, body: Bytes) -> Response {
        let mut inner = http::Response::new(Full::new(body));
        *inner.status_mut() = self.status;
        if let Some(content_type) = content_type {
            inner.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        inner.headers_mut().extend(self.headers);
        Response { inner }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response { Response::json_value(&self) }
}

/// Client errors carry `{"message": ...}`; server errors go out bare.
impl IntoResponse for crate::Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "handler error");
            return Response::status(status);
        }
        Response::builder()
            .status(status)
            .json_value(&serde_json::json!({ "message": self.to_string() }))
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(headers: &[(&str, &str)]) -> Request {
        let mut builder = http::Request::get("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        Request::from_http(builder.body(Bytes::new()).unwrap())
    }

    fn content_type(res: &Response) -> Option<&str> {
        res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn builder_sets_status_headers_and_type() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/42")
            .header("bad header", "x")
            .json(br#"{"id":42}"#.to_vec());
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()["location"], "/users/42");
        assert_eq!(res.headers().len(), 2);
        assert_eq!(content_type(&res), Some("application/json"));
    }

    #[test]
    fn status_only_has_no_content_type() {
        let res = Response::status(StatusCode::NO_CONTENT);
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert!(content_type(&res).is_none());
    }

    #[test]
    fn negotiate_follows_the_client() {
        let data = json!({"id": 1});
        let render = |v: &serde_json::Value| format!("<p>{}</p>", v["id"]);

        let res = Response::negotiate(&request(&[("accept", "application/json")]), &data, render);
        assert_eq!(content_type(&res), Some("application/json"));

        let res = Response::negotiate(&request(&[("accept", "text/html,*/*;q=0.8")]), &data, render);
        assert_eq!(content_type(&res), Some("text/html; charset=utf-8"));

        let res = Response::negotiate(&request(&[("x-requested-with", "XMLHttpRequest")]), &data, render);
        assert_eq!(content_type(&res), Some("application/json"));

        let res = Response::negotiate(&request(&[]), &data, render);
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(content_type(&res), Some("text/html; charset=utf-8"));

        let res = Response::negotiate(&request(&[("accept", "image/png")]), &data, render);
        assert_eq!(res.status_code(), StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn errors_convert_to_their_status() {
        let res = crate::Error::InvalidArgument("`on` is not a boolean".into()).into_response();
        assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(content_type(&res), Some("application/json"));

        let res = crate::Error::Io(std::io::Error::other("disk")).into_response();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type(&res).is_none());
    }

    #[test]
    fn results_convert_either_side() {
        let ok: Result<&'static str, StatusCode> = Ok("fine");
        let err: Result<&'static str, StatusCode> = Err(StatusCode::BAD_REQUEST);
        assert_eq!(ok.into_response().status_code(), StatusCode::OK);
        assert_eq!(err.into_response().status_code(), StatusCode::BAD_REQUEST);
    }
}
