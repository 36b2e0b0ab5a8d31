//! Format tokens and the MIME types they stand for.
//!
//! `"json"` ↔ `application/json`, `"html"` ↔ `text/html`, and so on. Used by
//! [`Request::format`](crate::Request::format) to name the representation a
//! client wants, and by [`Request::prefers`](crate::Request::prefers) to let
//! callers pass short tokens instead of full MIME types.

/// Known formats, in lookup order. The first MIME type of each entry is the
/// canonical one.
const FORMATS: &[(&str, &[&str])] = &[
    ("html", &["text/html", "application/xhtml+xml"]),
    ("txt", &["text/plain"]),
    ("js", &["application/javascript", "application/x-javascript", "text/javascript"]),
    ("css", &["text/css"]),
    ("json", &["application/json", "application/x-json"]),
    ("jsonld", &["application/ld+json"]),
    ("xml", &["text/xml", "application/xml", "application/x-xml"]),
    ("rdf", &["application/rdf+xml"]),
    ("atom", &["application/atom+xml"]),
    ("rss", &["application/rss+xml"]),
    ("form", &["application/x-www-form-urlencoded", "multipart/form-data"]),
    ("csv", &["text/csv"]),
    ("pdf", &["application/pdf"]),
    ("event-stream", &["text/event-stream"]),
];

/// Canonical MIME type for a format token, e.g. `"json"` → `application/json`.
pub fn mime_type(format: &str) -> Option<&'static str> {
    mime_types(format).first().copied()
}

/// Every MIME type registered for a format token.
pub fn mime_types(format: &str) -> &'static [&'static str] {
    FORMATS
        .iter()
        .find(|(name, _)| *name == format)
        .map(|(_, mimes)| *mimes)
        .unwrap_or(&[])
}

/// Format token for a MIME type. Parameters (`; charset=…`) are ignored and
/// the comparison is case-insensitive.
pub fn format_of(mime: &str) -> Option<&'static str> {
    let canonical = mime.split(';').next().unwrap_or("").trim();
    FORMATS
        .iter()
        .find(|(_, mimes)| mimes.iter().any(|m| m.eq_ignore_ascii_case(canonical)))
        .map(|(name, _)| *name)
}
