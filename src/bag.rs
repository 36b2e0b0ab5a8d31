//! Request data sources: input bags, server variables, uploaded files.
//!
//! Every input source (query string, urlencoded form body, decoded JSON body,
//! cookies) is held as an [`InputBag`]: an insertion-ordered mapping from key
//! to a JSON-shaped value. Urlencoded keys written with brackets build nested
//! structure the way web forms expect:
//!
//! ```text
//! tags[]=a&tags[]=b          →  {"tags": ["a", "b"]}
//! user[name]=al&user[age]=3  →  {"user": {"name": "al", "age": "3"}}
//! ```

use std::collections::BTreeMap;

use bytes::Bytes;
use http::HeaderMap;
use http::header::COOKIE;
use serde::Serialize;
use serde_json::{Map, Value};

/// One request data source. Keys are unique; later writes win.
pub type InputBag = Map<String, Value>;

/// Server/environment variables (`REQUEST_METHOD`, `HTTP_ACCEPT`, …).
pub type ServerBag = BTreeMap<String, String>;

// ── Urlencoded parsing ────────────────────────────────────────────────────────

/// Parses an `application/x-www-form-urlencoded` payload (a query string or a
/// form body) into an [`InputBag`], expanding bracket keys.
pub fn parse_urlencoded(input: &[u8]) -> InputBag {
    let mut bag = InputBag::new();
    for (key, value) in form_urlencoded::parse(input) {
        let (base, segments) = split_key(&key);
        if base.is_empty() {
            continue;
        }
        let node = bag.entry(base.to_owned()).or_insert(Value::Null);
        assign(node, &segments, Value::String(value.into_owned()));
    }
    bag
}

/// Splits `user[address][city]` into `("user", ["address", "city"])`.
///
/// A key whose brackets never close is kept literally.
fn split_key(raw: &str) -> (&str, Vec<&str>) {
    let Some(open) = raw.find('[').filter(|&i| i > 0) else {
        return (raw, Vec::new());
    };
    let mut segments = Vec::new();
    let mut rest = &raw[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else { break };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if segments.is_empty() {
        return (raw, segments);
    }
    (&raw[..open], segments)
}

/// Writes `value` under `segments` below `node`. An empty segment appends.
fn assign(node: &mut Value, segments: &[&str], value: Value) {
    let Some((&head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() && !node.is_array() {
        *node = if head.is_empty() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }

    // A named key below a list turns the list into a positional mapping.
    if let Value::Array(items) = node {
        if !head.is_empty() {
            let map = std::mem::take(items)
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect();
            *node = Value::Object(map);
        }
    }

    let child = match node {
        Value::Array(items) => {
            let index = items.len();
            items.push(Value::Null);
            &mut items[index]
        }
        Value::Object(map) => {
            let key = if head.is_empty() { map.len().to_string() } else { head.to_owned() };
            map.entry(key).or_insert(Value::Null)
        }
        _ => return,
    };
    assign(child, rest, value);
}

// ── Cookies ───────────────────────────────────────────────────────────────────

/// Collects every `Cookie` header into one bag. Values are percent-decoded;
/// the first occurrence of a name wins, as browsers send the most specific
/// cookie first.
pub fn parse_cookies(headers: &HeaderMap) -> InputBag {
    let mut bag = InputBag::new();
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else { continue };
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else { continue };
            let name = name.trim();
            if name.is_empty() || bag.contains_key(name) {
                continue;
            }
            let value = value.trim().trim_matches('"');
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_owned());
            bag.insert(name.to_owned(), Value::String(value));
        }
    }
    bag
}

// ── Uploaded files ────────────────────────────────────────────────────────────

/// A file received with the request.
///
/// Multipart decoding happens elsewhere; whatever decoded the upload hands the
/// result to [`Request::set_files`](crate::Request::set_files). Inside
/// [`Request::all`](crate::Request::all) a file shows up as its metadata
/// (`{"name", "type", "size"}`); use [`Request::file`](crate::Request::file)
/// to get the file itself.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadedFile {
    #[serde(rename = "name")]
    client_name: String,
    #[serde(rename = "type")]
    content_type: String,
    size: usize,
    #[serde(skip)]
    contents: Bytes,
}

impl UploadedFile {
    pub fn new(
        client_name: impl Into<String>,
        content_type: impl Into<String>,
        contents: impl Into<Bytes>,
    ) -> Self {
        let contents = contents.into();
        Self {
            client_name: client_name.into(),
            content_type: content_type.into(),
            size: contents.len(),
            contents,
        }
    }

    /// The file name as sent by the client. Never trust it for storage paths.
    pub fn client_name(&self) -> &str { &self.client_name }
    pub fn content_type(&self) -> &str { &self.content_type }
    pub fn size(&self) -> usize { self.size }
    pub fn contents(&self) -> &Bytes { &self.contents }

    /// Extension of the client file name, lower-cased, without the dot.
    pub fn client_extension(&self) -> Option<String> {
        let (stem, ext) = self.client_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub(crate) fn metadata(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Files keyed by form field. A field may carry several files (`docs[]`).
#[derive(Clone, Debug, Default)]
pub struct FileBag {
    fields: BTreeMap<String, Vec<UploadedFile>>,
}

impl FileBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file under `field`. Repeated calls for one field build a list.
    pub fn insert(&mut self, field: impl Into<String>, file: UploadedFile) {
        self.fields.entry(field.into()).or_default().push(file);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up `field` or `field.N` for the N-th file of a list field.
    pub fn get(&self, key: &str) -> Option<&UploadedFile> {
        if let Some(files) = self.fields.get(key) {
            return files.first();
        }
        let (field, index) = key.rsplit_once('.')?;
        self.fields.get(field)?.get(index.parse::<usize>().ok()?)
    }

    pub fn get_all(&self, field: &str) -> &[UploadedFile] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[UploadedFile])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// File metadata shaped like input: one object per single-file field, a
    /// list of objects for multi-file fields.
    pub(crate) fn to_input(&self) -> InputBag {
        self.fields
            .iter()
            .map(|(field, files)| {
                let value = match files.as_slice() {
                    [single] => single.metadata(),
                    many => Value::Array(many.iter().map(UploadedFile::metadata).collect()),
                };
                (field.clone(), value)
            })
            .collect()
    }
}
