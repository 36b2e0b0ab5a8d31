//! Content negotiation against the `Accept` header.
//!
//! The `Accept` header is parsed once per request into a list of media types
//! ordered by descending quality (`q`), ties keeping header order. Entries
//! with `q=0` are dropped, malformed entries are skipped:
//!
//! ```text
//! Accept: text/html;q=0.9, application/json, */*;q=0.1, image/png;q=0
//!      →  ["application/json", "text/html", "*/*"]
//! ```
//!
//! A candidate type matches an accepted entry when they are equal ignoring
//! case, when the entry is `<primary>/*` for the candidate's primary type, or
//! through the structured-suffix rule, which pairs `application/json` with
//! `application/vnd.api+json` in either direction. See [`matches_type`].

use tracing::trace;

use crate::format;
use crate::input::Keys;
use crate::request::Request;

/// Parses an `Accept` header value into media types, best first.
pub fn parse_accept(header: &str) -> Vec<String> {
    let mut entries: Vec<(f32, String)> = Vec::new();
    for raw in split_unquoted(header, ',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let mut parts = split_unquoted(raw, ';').into_iter();
        let media = parts.next().unwrap_or("").trim();
        if !is_media_range(media) {
            trace!(entry = raw, "skipping malformed accept entry");
            continue;
        }

        let mut quality = 1.0_f32;
        let mut valid = true;
        for param in parts {
            let Some((name, value)) = param.split_once('=') else { continue };
            if name.trim().eq_ignore_ascii_case("q") {
                match value.trim().parse::<f32>() {
                    Ok(q) if (0.0..=1.0).contains(&q) => quality = q,
                    _ => valid = false,
                }
            }
        }
        if !valid {
            trace!(entry = raw, "skipping accept entry with invalid quality");
            continue;
        }
        if quality > 0.0 {
            entries.push((quality, media.to_owned()));
        }
    }

    // Stable: equal qualities keep header order.
    entries.sort_by(|a, b| b.0.total_cmp(&a.0));
    entries.into_iter().map(|(_, media)| media).collect()
}

/// Structured-suffix match: `true` when `actual == ty`, or when `actual` is
/// `a/b` and `ty` is `a/<something>+b`.
///
/// ```rust
/// use deft::negotiation::matches_type;
///
/// assert!(matches_type("application/json", "application/vnd.api+json"));
/// assert!(!matches_type("application/vnd.api+json", "application/json"));
/// assert!(!matches_type("application/json", "text/vnd.api+json"));
/// ```
pub fn matches_type(actual: &str, ty: &str) -> bool {
    if actual == ty {
        return true;
    }
    let Some((primary, suffix)) = actual.split_once('/') else {
        return false;
    };
    let Some((ty_primary, ty_sub)) = ty.split_once('/') else {
        return false;
    };
    if primary != ty_primary || suffix.is_empty() {
        return false;
    }
    match ty_sub.strip_suffix(suffix).and_then(|rest| rest.strip_suffix('+')) {
        Some(structure) => !structure.is_empty(),
        None => false,
    }
}

fn is_wildcard(media: &str) -> bool {
    media == "*/*" || media == "*"
}

/// `candidate` and `accept` must already be lower-cased.
fn compatible(accept: &str, candidate: &str) -> bool {
    if matches_type(accept, candidate) || matches_type(candidate, accept) {
        return true;
    }
    let primary = candidate.split('/').next().unwrap_or(candidate);
    accept.strip_suffix("/*") == Some(primary)
}

fn is_media_range(media: &str) -> bool {
    if media == "*" {
        return true;
    }
    let valid_token = |s: &str| {
        !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_graphic() && !matches!(b, b'/' | b'"' | b',' | b';' | b'='))
    };
    match media.split_once('/') {
        Some((primary, sub)) => valid_token(primary) && valid_token(sub),
        None => false,
    }
}

/// Splits on `sep`, ignoring separators inside double quotes.
fn split_unquoted(input: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        match c {
            '"' => quoted = !quoted,
            c if c == sep && !quoted => {
                pieces.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&input[start..]);
    pieces
}

/// A candidate given as a format token (`"json"`) stands for its MIME type.
fn candidate_mime(candidate: &str) -> String {
    format::mime_type(candidate).unwrap_or(candidate).to_ascii_lowercase()
}

impl Request {
    /// `true` when the `Content-Type` mentions `/json` or `+json`.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.contains("/json") || ct.contains("+json"))
            .unwrap_or(false)
    }

    /// Media types from every `Accept` header line, best first.
    pub fn acceptable_content_types(&self) -> &[String] {
        self.acceptable
            .get_or_init(|| parse_accept(&self.header_all("accept").join(",")))
    }

    /// `true` without an `Accept` header, or when its best entry is a wildcard.
    pub fn accepts_any_content_type(&self) -> bool {
        match self.acceptable_content_types().first() {
            None => true,
            Some(first) => is_wildcard(first),
        }
    }

    /// `true` when the best accepted type is JSON (`/json` or `+json`).
    pub fn wants_json(&self) -> bool {
        self.acceptable_content_types()
            .first()
            .map(|first| {
                let first = first.to_ascii_lowercase();
                first.contains("/json") || first.contains("+json")
            })
            .unwrap_or(false)
    }

    /// `X-Requested-With: XMLHttpRequest`, compared case-sensitively.
    pub fn ajax(&self) -> bool {
        self.header("x-requested-with") == Some("XMLHttpRequest")
    }

    /// `X-PJAX` present with a truthy value (anything but empty, `0`, `false`).
    pub fn pjax(&self) -> bool {
        self.header("x-pjax")
            .map(|v| !matches!(v.trim(), "" | "0" | "false"))
            .unwrap_or(false)
    }

    /// Prefetch hints: `X-Moz`, `Purpose`, or `Sec-Purpose` set to `prefetch`.
    pub fn prefetch(&self) -> bool {
        let is_prefetch = |v: Option<&str>| v.is_some_and(|v| v.eq_ignore_ascii_case("prefetch"));
        is_prefetch(self.server("HTTP_X_MOZ"))
            || is_prefetch(self.header("purpose"))
            || is_prefetch(self.header("sec-purpose"))
    }

    /// Whether a JSON response is expected: an AJAX (non-PJAX) call that
    /// accepts anything, or a client whose best type is JSON.
    pub fn expects_json(&self) -> bool {
        (self.ajax() && !self.pjax() && self.accepts_any_content_type()) || self.wants_json()
    }

    /// `true` when any candidate is acceptable. Candidates are MIME types or
    /// format tokens; with no `Accept` header everything is acceptable.
    pub fn accepts(&self, types: impl Keys) -> bool {
        let accepts = self.acceptable_content_types();
        if accepts.is_empty() {
            return true;
        }
        let candidates: Vec<String> = types.key_list().into_iter().map(candidate_mime).collect();
        for accept in accepts {
            if is_wildcard(accept) {
                return true;
            }
            let accept = accept.to_ascii_lowercase();
            if candidates.iter().any(|candidate| compatible(&accept, candidate)) {
                return true;
            }
        }
        false
    }

    /// The candidate the client likes best, returned as given.
    ///
    /// Accepted entries are walked best first; for each, candidates are tried
    /// in caller order. A wildcard entry picks the first candidate. Without
    /// an `Accept` header nothing matches and the result is `None`; check
    /// [`accepts_any_content_type`](Self::accepts_any_content_type) first
    /// when that case should pick a default.
    pub fn prefers(&self, types: impl Keys) -> Option<String> {
        let candidates = types.key_list();
        let first = *candidates.first()?;
        for accept in self.acceptable_content_types() {
            if is_wildcard(accept) {
                return Some(first.to_owned());
            }
            let accept = accept.to_ascii_lowercase();
            for candidate in &candidates {
                if compatible(&accept, &candidate_mime(candidate)) {
                    return Some((*candidate).to_owned());
                }
            }
        }
        None
    }

    pub fn accepts_json(&self) -> bool {
        self.accepts("application/json")
    }

    pub fn accepts_html(&self) -> bool {
        self.accepts("text/html")
    }

    /// Format token of the first accepted type that has one, e.g. `"json"`.
    pub fn format<'a>(&self, default: &'a str) -> &'a str {
        self.acceptable_content_types()
            .iter()
            .find_map(|media| format::format_of(media))
            .unwrap_or(default)
    }

    /// Format token of the request body's `Content-Type`.
    pub fn content_type_format(&self) -> Option<&'static str> {
        format::format_of(self.header("content-type")?)
    }
}
