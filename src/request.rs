//! Incoming HTTP request type.
//!
//! [`Request`] wraps the `http` crate's request head and the fully buffered
//! body, and pre-computes the data sources the accessors read from: query
//! bag, urlencoded form bag, cookie bag, and server variables. The JSON body
//! is decoded lazily on first use.
//!
//! The accessors themselves live next to the logic they implement:
//! input retrieval in `input.rs`, content negotiation in
//! [`negotiation`](crate::negotiation).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::OnceLock;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};

use crate::bag::{self, FileBag, InputBag, ServerBag, UploadedFile};
use crate::input::InputPolicy;

/// An incoming HTTP request.
///
/// Built by the [`Server`](crate::Server) for every dispatched request, or by
/// hand from an `http::Request<Bytes>`:
///
/// ```rust
/// use deft::Request;
///
/// let req = Request::from_http(
///     http::Request::post("/users?page=2")
///         .header("content-type", "application/json")
///         .body(r#"{"name":"alice"}"#.into())
///         .unwrap(),
/// );
/// assert_eq!(req.input("name"), Some("alice".into()));
/// assert_eq!(req.query("page").unwrap(), "2");
/// ```
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) query: InputBag,
    pub(crate) form: InputBag,
    pub(crate) json: OnceLock<InputBag>,
    pub(crate) cookies: InputBag,
    pub(crate) server: ServerBag,
    pub(crate) files: FileBag,
    pub(crate) policy: InputPolicy,
    pub(crate) acceptable: OnceLock<Vec<String>>,
}

impl Request {
    /// Builds a request from a parsed head and its buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| bag::parse_urlencoded(q.as_bytes()))
            .unwrap_or_default();
        let form = if carries_form_body(&parts) {
            bag::parse_urlencoded(&body)
        } else {
            InputBag::new()
        };
        let cookies = bag::parse_cookies(&parts.headers);
        let server = server_bag(&parts);

        Self {
            parts,
            body,
            params: HashMap::new(),
            query,
            form,
            json: OnceLock::new(),
            cookies,
            server,
            files: FileBag::new(),
            policy: InputPolicy::default(),
            acceptable: OnceLock::new(),
        }
    }

    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Records the peer address as `REMOTE_ADDR` / `REMOTE_PORT`.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.server.insert("REMOTE_ADDR".to_owned(), addr.ip().to_string());
        self.server.insert("REMOTE_PORT".to_owned(), addr.port().to_string());
        self
    }

    /// Chooses how `GET`/`HEAD` requests with a JSON content type resolve
    /// their input source. See [`InputPolicy`].
    pub fn with_input_policy(mut self, policy: InputPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches uploaded files decoded by the caller.
    pub fn with_files(mut self, files: FileBag) -> Self {
        self.files = files;
        self
    }

    /// Replaces the uploaded files.
    pub fn set_files(&mut self, files: FileBag) {
        self.files = files;
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn version(&self) -> Version { self.parts.version }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn input_policy(&self) -> InputPolicy { self.policy }

    /// Case-insensitive method comparison: `req.is_method("post")`.
    pub fn is_method(&self, method: &str) -> bool {
        self.parts.method.as_str().eq_ignore_ascii_case(method)
    }

    /// First value of a header, if present and valid visible ASCII.
    /// Header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value of a header, in arrival order.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.parts.headers.contains_key(name)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// The uploaded file under `key` (`"avatar"`, or `"docs.1"` for the second
    /// file of a multi-file field).
    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files.get(key)
    }

    pub fn files(&self) -> &FileBag {
        &self.files
    }

    pub fn has_file(&self, key: &str) -> bool {
        self.files.get(key).is_some()
    }

    /// The `Authorization: Bearer …` token.
    ///
    /// Takes the text after the first `Bearer ` (any case) up to a following
    /// comma, so `Bearer abc123, foo` yields `abc123`. Returns `None` when the
    /// header has no bearer credentials or the token is empty.
    pub fn bearer_token(&self) -> Option<&str> {
        bearer_token(self.header("authorization")?)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        Self::from_http(req)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn is_read_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

fn carries_form_body(parts: &Parts) -> bool {
    if is_read_method(&parts.method) {
        return false;
    }
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

fn server_bag(parts: &Parts) -> ServerBag {
    let mut server = ServerBag::new();
    server.insert("REQUEST_METHOD".to_owned(), parts.method.to_string());
    server.insert("REQUEST_URI".to_owned(), parts.uri.to_string());
    server.insert("QUERY_STRING".to_owned(), parts.uri.query().unwrap_or("").to_owned());
    server.insert("SERVER_PROTOCOL".to_owned(), format!("{:?}", parts.version));

    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else { continue };
        let key = if name == CONTENT_TYPE {
            "CONTENT_TYPE".to_owned()
        } else if name == CONTENT_LENGTH {
            "CONTENT_LENGTH".to_owned()
        } else {
            format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"))
        };
        // Repeated headers keep their first value.
        server.entry(key).or_insert_with(|| value.to_owned());
    }
    server
}

fn bearer_token(header: &str) -> Option<&str> {
    let lower = header.to_ascii_lowercase();
    let start = lower.find("bearer ")? + "bearer ".len();
    let token = &header[start..];
    let token = token.split(',').next().unwrap_or("").trim();
    (!token.is_empty()).then_some(token)
}
