//! Input retrieval: which bag backs "input", and the accessors built on it.
//!
//! # Input source
//!
//! | Request | Source |
//! |---|---|
//! | `Content-Type` contains `/json` or `+json` | decoded JSON body |
//! | `GET` / `HEAD` | query string |
//! | anything else | urlencoded form body |
//!
//! JSON wins even for `GET`/`HEAD` under the default [`InputPolicy::JsonFirst`].
//! [`InputPolicy::MethodFirst`] keeps `GET`/`HEAD` on the query string.
//!
//! [`Request::input`] reads the source first and falls back to the query
//! string, so a `POST /users?page=2` with a form body sees both. Keys are
//! dotted paths (`"user.address.city"`), see [`data`](crate::data).
//!
//! Missing keys are never errors. Only coercions the caller opts into can
//! fail: [`Request::boolean`] on a non-boolean value, and [`Request::date`]
//! on a value that does not parse.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::bag::{InputBag, ServerBag};
use crate::data::{data_forget, data_set, map_get, replace_recursive};
use crate::error::{Error, Result};
use crate::request::{Request, is_read_method};

/// How a `GET`/`HEAD` request that claims a JSON body picks its input source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InputPolicy {
    /// A JSON content type selects the JSON body for every method.
    #[default]
    JsonFirst,
    /// `GET` and `HEAD` always read the query string, whatever the
    /// content type says.
    MethodFirst,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Source {
    Query,
    Form,
    Json,
}

// ── Key lists ─────────────────────────────────────────────────────────────────

/// One key or a list of keys: `"a"`, `["a", "b"]`, `vec![name]`, `&keys[..]`.
pub trait Keys {
    fn key_list(&self) -> Vec<&str>;
}

impl Keys for str {
    fn key_list(&self) -> Vec<&str> { vec![self] }
}

impl Keys for String {
    fn key_list(&self) -> Vec<&str> { vec![self.as_str()] }
}

impl<S: AsRef<str>> Keys for [S] {
    fn key_list(&self) -> Vec<&str> { self.iter().map(|s| s.as_ref()).collect() }
}

impl<S: AsRef<str>, const N: usize> Keys for [S; N] {
    fn key_list(&self) -> Vec<&str> { self.as_slice().key_list() }
}

impl<S: AsRef<str>> Keys for Vec<S> {
    fn key_list(&self) -> Vec<&str> { self.as_slice().key_list() }
}

impl<T: Keys + ?Sized> Keys for &T {
    fn key_list(&self) -> Vec<&str> { (**self).key_list() }
}

// ── Source resolution ─────────────────────────────────────────────────────────

impl Request {
    fn source(&self) -> Source {
        let read = is_read_method(self.method());
        if self.is_json() && !(read && self.policy == InputPolicy::MethodFirst) {
            Source::Json
        } else if read {
            Source::Query
        } else {
            Source::Form
        }
    }

    /// The bag generic input lookups read first.
    pub fn input_source(&self) -> &InputBag {
        match self.source() {
            Source::Query => &self.query,
            Source::Form => &self.form,
            Source::Json => self.json(),
        }
    }

    /// The decoded JSON body, parsed on first call.
    ///
    /// Empty when the body is empty or not valid JSON. A top-level array is
    /// exposed with its indices as keys.
    pub fn json(&self) -> &InputBag {
        self.json.get_or_init(|| decode_json(&self.body))
    }

    /// Dotted-path lookup into the JSON body only.
    pub fn json_value(&self, key: &str) -> Option<Value> {
        map_get(self.json(), key).map(Cow::into_owned)
    }

    fn with_source_mut<R>(&mut self, f: impl FnOnce(&mut InputBag) -> R) -> R {
        match self.source() {
            Source::Query => f(&mut self.query),
            Source::Form => f(&mut self.form),
            Source::Json => {
                let mut bag = self.json.take().unwrap_or_else(|| decode_json(&self.body));
                let out = f(&mut bag);
                self.json = OnceLock::from(bag);
                out
            }
        }
    }

    // ── Retrieval ─────────────────────────────────────────────────────────────

    /// Looks up a dotted `key` in the input source, then in the query string.
    ///
    /// The source owns its top-level keys: when it has `user`, a query
    /// parameter `user` is never consulted for `user.name`. An empty key
    /// returns all input as a mapping.
    pub fn input(&self, key: &str) -> Option<Value> {
        if key.is_empty() {
            return Some(Value::Object(self.input_all()));
        }
        let head = key.split('.').next().unwrap_or(key);
        if head == "*" {
            return map_get(&self.input_all(), key).map(Cow::into_owned);
        }
        let source = self.input_source();
        let bag = if source.contains_key(head) { source } else { &self.query };
        map_get(bag, key).map(Cow::into_owned)
    }

    /// [`input`](Self::input) with a fallback.
    pub fn input_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.input(key).unwrap_or_else(|| default.into())
    }

    /// Explicit keyed access to request input.
    pub fn get(&self, key: &str, default: impl Into<Value>) -> Value {
        self.input_or(key, default)
    }

    /// The input source overlaid on the query string; source keys win.
    pub fn input_all(&self) -> InputBag {
        let mut merged = self.input_source().clone();
        for (key, value) in &self.query {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// All input plus uploaded-file metadata. Files override input on
    /// conflicting keys.
    pub fn all(&self) -> InputBag {
        let mut all = self.input_all();
        if !self.files.is_empty() {
            replace_recursive(&mut all, self.files.to_input());
        }
        all
    }

    /// The named subset of [`all`](Self::all). Same as [`only`](Self::only).
    pub fn all_only(&self, keys: impl Keys) -> InputBag {
        self.only(keys)
    }

    /// Top-level keys of [`all`](Self::all), in order.
    pub fn keys(&self) -> Vec<String> {
        self.all().keys().cloned().collect()
    }

    pub fn query(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    pub fn query_all(&self) -> &InputBag {
        &self.query
    }

    /// A field of the urlencoded form body.
    pub fn post(&self, key: &str) -> Option<&Value> {
        self.form.get(key)
    }

    pub fn post_all(&self) -> &InputBag {
        &self.form
    }

    pub fn cookie(&self, key: &str) -> Option<&Value> {
        self.cookies.get(key)
    }

    pub fn cookies(&self) -> &InputBag {
        &self.cookies
    }

    /// A server variable: `REQUEST_METHOD`, `REMOTE_ADDR`, `HTTP_*`, …
    pub fn server(&self, key: &str) -> Option<&str> {
        self.server.get(key).map(String::as_str)
    }

    pub fn server_all(&self) -> &ServerBag {
        &self.server
    }

    // ── Presence ──────────────────────────────────────────────────────────────

    /// `true` when every key resolves in [`all`](Self::all). An explicit
    /// `null` counts as present.
    pub fn has(&self, keys: impl Keys) -> bool {
        let all = self.all();
        keys.key_list().iter().all(|key| map_get(&all, key).is_some())
    }

    /// Alias of [`has`](Self::has).
    pub fn exists(&self, keys: impl Keys) -> bool {
        self.has(keys)
    }

    pub fn has_any(&self, keys: impl Keys) -> bool {
        let all = self.all();
        keys.key_list().iter().any(|key| map_get(&all, key).is_some())
    }

    pub fn missing(&self, keys: impl Keys) -> bool {
        !self.has(keys)
    }

    /// `true` when every key is present and not blank.
    ///
    /// Strings are blank when empty after trimming; `null` is blank. Numbers,
    /// booleans, sequences, and mappings are always filled.
    pub fn filled(&self, keys: impl Keys) -> bool {
        let all = self.all();
        keys.key_list().iter().all(|key| !is_blank(map_get(&all, key).as_deref()))
    }

    pub fn any_filled(&self, keys: impl Keys) -> bool {
        let all = self.all();
        keys.key_list().iter().any(|key| !is_blank(map_get(&all, key).as_deref()))
    }

    /// `true` when every key is absent or blank.
    pub fn is_not_filled(&self, keys: impl Keys) -> bool {
        let all = self.all();
        keys.key_list().iter().all(|key| is_blank(map_get(&all, key).as_deref()))
    }

    /// Runs `f` with the value of `key` when it is present.
    pub fn when_has<R>(&self, key: &str, f: impl FnOnce(Value) -> R) -> Option<R> {
        let all = self.all();
        map_get(&all, key).map(|value| f(value.into_owned()))
    }

    /// Runs `f` with the value of `key` when it is filled.
    pub fn when_filled<R>(&self, key: &str, f: impl FnOnce(Value) -> R) -> Option<R> {
        let all = self.all();
        match map_get(&all, key) {
            Some(value) if !is_blank(Some(&*value)) => Some(f(value.into_owned())),
            _ => None,
        }
    }

    // ── Projection ────────────────────────────────────────────────────────────

    /// Only the named keys, nested where the keys are dotted. Absent keys are
    /// left out.
    pub fn only(&self, keys: impl Keys) -> InputBag {
        let all = self.all();
        let mut result = Value::Object(Map::new());
        for key in keys.key_list() {
            if let Some(value) = map_get(&all, key) {
                data_set(&mut result, key, value.into_owned());
            }
        }
        into_bag(result)
    }

    /// Everything except the named keys.
    pub fn except(&self, keys: impl Keys) -> InputBag {
        let mut all = Value::Object(self.all());
        for key in keys.key_list() {
            data_forget(&mut all, key);
        }
        into_bag(all)
    }

    // ── Typed accessors ───────────────────────────────────────────────────────

    /// The value as a string. Absent and `null` give `""`; sequences and
    /// mappings give their JSON text.
    pub fn string(&self, key: &str) -> String {
        self.string_or(key, "")
    }

    /// [`string`](Self::string) with a fallback for an absent key. A present
    /// `null` still gives `""`.
    pub fn string_or(&self, key: &str, default: impl Into<String>) -> String {
        match self.input(key) {
            None => default.into(),
            Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
        }
    }

    /// Boolean coercion.
    ///
    /// `"1"`, `"true"`, `"on"`, `"yes"` are true; `"0"`, `"false"`, `"off"`,
    /// `"no"` and `""` are false (case-insensitive). JSON booleans, the
    /// numbers `0`/`1`, and `null` are understood too. Anything else is
    /// [`Error::InvalidArgument`]. An absent key yields `default`.
    pub fn boolean(&self, key: &str, default: bool) -> Result<bool> {
        let Some(value) = self.input(key) else {
            return Ok(default);
        };
        let parsed = match &value {
            Value::Null => Some(false),
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_f64() {
                Some(x) if x == 1.0 => Some(true),
                Some(x) if x == 0.0 => Some(false),
                _ => None,
            },
            Value::String(s) => parse_bool(s),
            Value::Array(_) | Value::Object(_) => None,
        };
        parsed.ok_or_else(|| Error::InvalidArgument(format!("`{key}` is not a boolean: {value}")))
    }

    /// Integer coercion. Reads the leading number of a string (`"42px"` is
    /// 42, `"12.9"` is 12); non-numeric input is 0. An absent key yields
    /// `default`.
    pub fn integer(&self, key: &str, default: i64) -> i64 {
        match self.input(key) {
            None => default,
            Some(value) => to_integer(&value),
        }
    }

    /// Float coercion with the same leading-number rule as
    /// [`integer`](Self::integer). Non-numeric input is 0.0.
    pub fn float(&self, key: &str, default: f64) -> f64 {
        match self.input(key) {
            None => default,
            Some(value) => to_float(&value),
        }
    }

    /// Date coercion.
    ///
    /// With a `format` (chrono `strftime` syntax) the value must match it.
    /// Without one, RFC 3339, RFC 2822, common ISO-like date-times, plain
    /// dates, and `@<unix seconds>` are tried in turn. Values without an
    /// offset are taken as UTC. A key that is not filled gives `Ok(None)`.
    pub fn date(&self, key: &str, format: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        if self.is_not_filled(key) {
            return Ok(None);
        }
        let raw = self.string(key);
        let raw = raw.trim();
        let parsed = match format {
            Some(format) => parse_date_with(raw, format),
            None => parse_date(raw),
        };
        parsed.map(Some).ok_or_else(|| Error::DateParse {
            value: raw.to_owned(),
            format: format.unwrap_or("any recognised date").to_owned(),
        })
    }

    /// Parses the value into `T`. An absent, blank, or unrecognised value
    /// gives `None`.
    pub fn enum_value<T: FromStr>(&self, key: &str) -> Option<T> {
        if self.is_not_filled(key) {
            return None;
        }
        self.string(key).parse().ok()
    }

    /// [`enum_value`](Self::enum_value) with a fallback.
    pub fn enum_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.enum_value(key).unwrap_or(default)
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Adds `input` to the input source, overwriting existing keys.
    pub fn merge(&mut self, input: InputBag) {
        self.with_source_mut(|bag| bag.extend(input));
    }

    /// Adds only the entries whose keys are [`missing`](Self::missing).
    pub fn merge_if_missing(&mut self, input: InputBag) {
        let input: InputBag = input
            .into_iter()
            .filter(|(key, _)| self.missing(key.as_str()))
            .collect();
        self.merge(input);
    }

    /// Replaces the input source wholesale.
    pub fn replace(&mut self, input: InputBag) {
        self.with_source_mut(|bag| *bag = input);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn decode_json(body: &[u8]) -> InputBag {
    if body.is_empty() {
        return InputBag::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        Ok(_) => {
            debug!("json body is a scalar, input is empty");
            InputBag::new()
        }
        Err(e) => {
            debug!(error = %e, "malformed json body, input is empty");
            InputBag::new()
        }
    }
}

fn into_bag(value: Value) -> InputBag {
    match value {
        Value::Object(map) => map,
        _ => InputBag::new(),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

fn to_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        Value::String(s) => s.trim().parse().unwrap_or_else(|_| leading_number(s) as i64),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_number(s),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// The numeric prefix of `s` (`"  -1.5e3kg"` → -1500.0), or 0.0.
fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].trim_end_matches('.').parse().unwrap_or(0.0)
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%B %d, %Y", "%d %B %Y"];

fn parse_date_with(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, format)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, format).ok().map(|d| d.and_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Some(seconds) = raw.strip_prefix('@') {
        return DateTime::from_timestamp(seconds.parse().ok()?, 0);
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(raw) {
        return Some(d.with_timezone(&Utc));
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|d| d.and_utc())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|d| d.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::{FileBag, UploadedFile};
    use bytes::Bytes;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn get(uri: &str) -> Request {
        Request::from_http(http::Request::get(uri).body(Bytes::new()).unwrap())
    }

    fn form(method: &str, uri: &str, body: &'static str) -> Request {
        Request::from_http(
            http::Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap(),
        )
    }

    fn json_req(method: &str, uri: &str, body: &'static str) -> Request {
        Request::from_http(
            http::Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap(),
        )
    }

    fn bag(value: Value) -> InputBag {
        into_bag(value)
    }

    #[test]
    fn get_and_head_read_the_query_string() {
        let req = get("/?a=1");
        assert_eq!(req.source(), Source::Query);
        let head = Request::from_http(http::Request::head("/?a=1").body(Bytes::new()).unwrap());
        assert_eq!(head.source(), Source::Query);
    }

    #[test]
    fn writes_read_the_form_body() {
        for method in ["POST", "PUT", "PATCH", "DELETE"] {
            let req = form(method, "/", "a=1");
            assert_eq!(req.source(), Source::Form, "{method}");
            assert_eq!(req.input_source()["a"], json!("1"));
        }
    }

    #[test]
    fn json_content_type_overrides_method_by_default() {
        let req = json_req("GET", "/?q=1", r#"{"a":1}"#);
        assert_eq!(req.source(), Source::Json);
        assert_eq!(req.input("a"), Some(json!(1)));
        assert_eq!(req.input("q"), Some(json!("1")));
    }

    #[test]
    fn method_first_policy_keeps_reads_on_the_query() {
        let req = json_req("GET", "/?q=1", r#"{"a":1}"#).with_input_policy(InputPolicy::MethodFirst);
        assert_eq!(req.source(), Source::Query);
        assert_eq!(req.input("a"), None);

        let post = json_req("POST", "/", r#"{"a":1}"#).with_input_policy(InputPolicy::MethodFirst);
        assert_eq!(post.source(), Source::Json);
    }

    #[test]
    fn malformed_or_empty_json_is_an_empty_bag() {
        assert!(json_req("POST", "/", "{not json").json().is_empty());
        assert!(json_req("POST", "/", "").json().is_empty());
        assert!(json_req("POST", "/", "42").json().is_empty());
        assert_eq!(json_req("POST", "/", r#"["x"]"#).json()["0"], json!("x"));
    }

    #[test]
    fn dotted_input_lookup() {
        let req = json_req("POST", "/", r#"{"a":{"b":5}}"#);
        assert_eq!(req.input("a.b"), Some(json!(5)));
        assert_eq!(req.json_value("a.b"), Some(json!(5)));

        let req = json_req("POST", "/", r#"{"a":{}}"#);
        assert_eq!(req.input("a.b"), None);
        assert_eq!(req.input_or("a.b", "fallback"), json!("fallback"));
        assert_eq!(req.get("a.b", 7), json!(7));
    }

    #[test]
    fn source_owns_its_top_level_keys() {
        let req = form("POST", "/?user[name]=q&page=2", "user[age]=3");
        assert_eq!(req.input("user.name"), None);
        assert_eq!(req.input("user.age"), Some(json!("3")));
        assert_eq!(req.input("page"), Some(json!("2")));
    }

    #[test]
    fn all_merges_query_and_body_with_body_winning() {
        let req = form("POST", "/?a=1&shared=query", "b=2&shared=body");
        assert_eq!(
            Value::Object(req.all()),
            json!({"b": "2", "shared": "body", "a": "1"})
        );
        assert_eq!(req.keys(), vec!["b", "shared", "a"]);
    }

    #[test]
    fn all_includes_file_metadata() {
        let mut files = FileBag::new();
        files.insert("avatar", UploadedFile::new("me.png", "image/png", &b"abc"[..]));
        let req = form("POST", "/", "name=al").with_files(files);
        let all = req.all();
        assert_eq!(all["avatar"]["size"], json!(3));
        assert!(req.has("avatar"));
        assert!(req.filled("avatar"));
        assert!(req.has_file("avatar"));
        assert_eq!(req.input("avatar"), None);
    }

    #[test]
    fn fixed_bag_accessors() {
        let req = Request::from_http(
            http::Request::post("/?q=1")
                .header("content-type", "application/x-www-form-urlencoded")
                .header("cookie", "sid=abc")
                .body(Bytes::from_static(b"p=2"))
                .unwrap(),
        );
        assert_eq!(req.query("q"), Some(&json!("1")));
        assert_eq!(req.query("p"), None);
        assert_eq!(req.post("p"), Some(&json!("2")));
        assert_eq!(req.cookie("sid"), Some(&json!("abc")));
        assert_eq!(req.server("REQUEST_METHOD"), Some("POST"));
        assert_eq!(req.query_all().len(), 1);
    }

    #[test]
    fn presence_counts_explicit_null() {
        let req = json_req("POST", "/", r#"{"a":null,"b":{"c":1}}"#);
        assert!(req.has("a"));
        assert!(req.has(["a", "b.c"]));
        assert!(!req.has(["a", "b.d"]));
        assert!(req.has_any(["zzz", "b.c"]));
        assert!(!req.has_any(["zzz", "yyy"]));
        assert!(req.missing("b.d"));
        assert!(req.exists("b"));
    }

    #[test]
    fn filled_rules() {
        let req = json_req(
            "POST",
            "/",
            r#"{"empty":"","spaces":"   ","zero":"0","no":false,"list":[],"null":null,"n":0}"#,
        );
        assert!(!req.filled("empty"));
        assert!(!req.filled("spaces"));
        assert!(req.filled("zero"));
        assert!(req.filled("no"));
        assert!(req.filled("list"));
        assert!(req.filled("n"));
        assert!(!req.filled("null"));
        assert!(!req.filled("absent"));
        assert!(req.any_filled(["empty", "zero"]));
        assert!(req.is_not_filled(["empty", "spaces", "absent"]));
        assert!(!req.is_not_filled(["empty", "zero"]));
    }

    #[test]
    fn when_helpers_run_conditionally() {
        let req = json_req("POST", "/", r#"{"name":"al","blank":" "}"#);
        assert_eq!(req.when_has("name", |v| v), Some(json!("al")));
        assert_eq!(req.when_has("nope", |v| v), None);
        assert_eq!(req.when_filled("blank", |_| ()), None);
        assert_eq!(req.when_has("blank", |_| 1), Some(1));
    }

    #[test]
    fn only_and_except_preserve_nesting() {
        let req = json_req(
            "POST",
            "/",
            r#"{"user":{"name":"al","email":"a@b","age":3},"token":"t"}"#,
        );
        assert_eq!(
            Value::Object(req.only(["user.name", "token", "absent"])),
            json!({"user": {"name": "al"}, "token": "t"})
        );
        assert_eq!(
            Value::Object(req.except(["user.email", "token"])),
            json!({"user": {"name": "al", "age": 3}})
        );
        assert_eq!(req.all_only("token"), bag(json!({"token": "t"})));
    }

    #[test]
    fn boolean_coercion() {
        let req = get("/?a=1&b=TRUE&c=on&d=yes&e=0&f=off&g=&h=maybe");
        for key in ["a", "b", "c", "d"] {
            assert!(req.boolean(key, false).unwrap(), "{key}");
        }
        for key in ["e", "f", "g"] {
            assert!(!req.boolean(key, true).unwrap(), "{key}");
        }
        assert!(matches!(req.boolean("h", false), Err(Error::InvalidArgument(_))));
        assert!(req.boolean("absent", true).unwrap());

        let req = json_req("POST", "/", r#"{"t":true,"one":1,"two":2}"#);
        assert!(req.boolean("t", false).unwrap());
        assert!(req.boolean("one", false).unwrap());
        assert!(req.boolean("two", false).is_err());
    }

    #[test]
    fn numeric_coercion() {
        let req = get("/?n=42&px=42px&dec=12.9&neg=-3.5e1&junk=abc&big=9007199254740993");
        assert_eq!(req.integer("n", 0), 42);
        assert_eq!(req.integer("px", 0), 42);
        assert_eq!(req.integer("dec", 0), 12);
        assert_eq!(req.integer("junk", 5), 0);
        assert_eq!(req.integer("absent", 5), 5);
        assert_eq!(req.integer("big", 0), 9_007_199_254_740_993);
        assert_eq!(req.float("dec", 0.0), 12.9);
        assert_eq!(req.float("neg", 0.0), -35.0);
        assert_eq!(req.float("junk", 1.0), 0.0);
        assert_eq!(req.float("absent", 1.5), 1.5);
    }

    #[test]
    fn leading_number_edges() {
        assert_eq!(leading_number("  7."), 7.0);
        assert_eq!(leading_number(".5x"), 0.5);
        assert_eq!(leading_number("-"), 0.0);
        assert_eq!(leading_number("1e"), 1.0);
        assert_eq!(leading_number("+2E2"), 200.0);
    }

    #[test]
    fn string_coercion() {
        let req = json_req("POST", "/", r#"{"s":"x","n":3,"b":true,"l":[1],"z":null}"#);
        assert_eq!(req.string("s"), "x");
        assert_eq!(req.string("n"), "3");
        assert_eq!(req.string("b"), "true");
        assert_eq!(req.string("l"), "[1]");
        assert_eq!(req.string("z"), "");
        assert_eq!(req.string("absent"), "");
        assert_eq!(req.string_or("absent", "fallback"), "fallback");
        assert_eq!(req.string_or("z", "fallback"), "");
        assert_eq!(req.string_or("s", "fallback"), "x");
    }

    #[test]
    fn date_with_explicit_format() {
        let req = get("/?d=17/10/2026&bad=2026-10-17&dt=2026-10-17+08:30");
        let d = req.date("d", Some("%d/%m/%Y")).unwrap().unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2026, 10, 17));

        let dt = req.date("dt", Some("%Y-%m-%d %H:%M")).unwrap().unwrap();
        assert_eq!((dt.hour(), dt.minute()), (8, 30));

        let err = req.date("bad", Some("%d/%m/%Y")).unwrap_err();
        assert!(matches!(err, Error::DateParse { ref value, .. } if value == "2026-10-17"));
    }

    #[test]
    fn date_without_format_is_permissive() {
        let req = get(
            "/?iso=2026-10-17T08:30:00%2B02:00&plain=2026-10-17&space=2026-10-17+08:30:00&ts=@0&blank=&junk=soon",
        );
        assert_eq!(req.date("iso", None).unwrap().unwrap().hour(), 6);
        assert_eq!(req.date("plain", None).unwrap().unwrap().day(), 17);
        assert_eq!(req.date("space", None).unwrap().unwrap().minute(), 30);
        assert_eq!(req.date("ts", None).unwrap().unwrap().year(), 1970);
        assert_eq!(req.date("blank", None).unwrap(), None);
        assert_eq!(req.date("absent", None).unwrap(), None);
        assert!(req.date("junk", None).is_err());
    }

    #[derive(Debug, PartialEq)]
    enum Status {
        Active,
        Banned,
    }

    impl FromStr for Status {
        type Err = ();

        fn from_str(s: &str) -> std::result::Result<Self, ()> {
            match s {
                "active" => Ok(Self::Active),
                "banned" => Ok(Self::Banned),
                _ => Err(()),
            }
        }
    }

    #[test]
    fn enum_coercion_returns_none_on_unknown() {
        let req = get("/?s=active&t=banned&u=ghost&v=");
        assert_eq!(req.enum_value::<Status>("s"), Some(Status::Active));
        assert_eq!(req.enum_value::<Status>("t"), Some(Status::Banned));
        assert_eq!(req.enum_value::<Status>("u"), None);
        assert_eq!(req.enum_value::<Status>("v"), None);
        assert_eq!(req.enum_value::<Status>("absent"), None);
        assert_eq!(req.enum_or("t", Status::Active), Status::Banned);
        assert_eq!(req.enum_or("u", Status::Active), Status::Active);
        assert_eq!(req.enum_or("absent", Status::Banned), Status::Banned);
    }

    #[test]
    fn merge_and_replace_write_the_source() {
        let mut req = form("POST", "/?q=1", "a=1");
        req.merge(bag(json!({"a": "2", "b": "3"})));
        assert_eq!(req.input("a"), Some(json!("2")));
        assert_eq!(req.input("b"), Some(json!("3")));
        assert!(req.query_all().get("b").is_none());

        req.merge_if_missing(bag(json!({"a": "9", "c": "4", "q": "9"})));
        assert_eq!(req.input("a"), Some(json!("2")));
        assert_eq!(req.input("c"), Some(json!("4")));
        assert_eq!(req.input("q"), Some(json!("1")));

        req.replace(bag(json!({"only": true})));
        assert_eq!(Value::Object(req.input_all()), json!({"only": true, "q": "1"}));
    }

    #[test]
    fn merge_into_json_source_keeps_decoded_body() {
        let mut req = json_req("POST", "/", r#"{"a":1}"#);
        req.merge(bag(json!({"b": 2})));
        assert_eq!(Value::Object(req.json().clone()), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn keys_accepts_many_shapes() {
        let owned = vec![String::from("a"), String::from("b")];
        assert_eq!("a".key_list(), vec!["a"]);
        assert_eq!(["a", "b"].key_list(), vec!["a", "b"]);
        assert_eq!(owned.key_list(), vec!["a", "b"]);
        assert_eq!((&owned[..1]).key_list(), vec!["a"]);
    }
}
