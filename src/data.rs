//! Dotted-path access into JSON-shaped trees.
//!
//! A path is a `.`-separated list of segments: `"user.address.city"`.
//! Segments index mappings by key and sequences by position (`"tags.0"`).
//! [`data_get`] additionally understands a `*` segment, which fans out over
//! every child of the current node.
//!
//! These are plain functions with no hidden state. [`Request`](crate::Request)
//! builds its input accessors on top of them.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Looks up `path` inside `target`.
///
/// An empty path returns the whole target. A `*` segment collects the rest of
/// the path from every child into a sequence, skipping children where it is
/// absent; nested wildcards are flattened one level, so `"users.*.tags.*"`
/// yields a flat list of tags.
///
/// ```rust
/// use serde_json::json;
/// use deft::data::data_get;
///
/// let tree = json!({"user": {"name": "alice", "roles": ["admin", "dev"]}});
/// assert_eq!(data_get(&tree, "user.name").as_deref(), Some(&json!("alice")));
/// assert_eq!(data_get(&tree, "user.roles.1").as_deref(), Some(&json!("dev")));
/// assert!(data_get(&tree, "user.email").is_none());
/// ```
pub fn data_get<'a>(target: &'a Value, path: &str) -> Option<Cow<'a, Value>> {
    if path.is_empty() {
        return Some(Cow::Borrowed(target));
    }
    let segments: Vec<&str> = path.split('.').collect();
    get_segments(target, &segments)
}

/// Like [`data_get`], but starting from a mapping rather than a value.
pub fn map_get<'a>(map: &'a Map<String, Value>, path: &str) -> Option<Cow<'a, Value>> {
    let (head, rest) = split_first(path);
    if head == "*" {
        let fanned: Vec<Value> = map
            .values()
            .filter_map(|child| get_or_whole(child, rest))
            .map(Cow::into_owned)
            .collect();
        return collect_wildcard(fanned, rest);
    }
    let child = map.get(head)?;
    get_or_whole(child, rest)
}

/// Returns `true` when `path` resolves to a node, including an explicit `null`.
pub fn data_has(target: &Value, path: &str) -> bool {
    data_get(target, path).is_some()
}

/// Writes `value` at `path`, creating intermediate containers as needed.
///
/// A missing or non-container node in the way becomes an empty sequence when
/// the segment after it is an index, and an empty mapping otherwise. A
/// numeric segment addresses a sequence element when the index is in range
/// or one past the end, which appends. An index further out turns the
/// sequence into a mapping keyed by position.
pub fn data_set(target: &mut Value, path: &str, value: Value) {
    let mut node = target;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(&following) = segments.peek() else {
            *slot(node, segment) = value;
            return;
        };
        let next = slot(node, segment);
        if !next.is_object() && !next.is_array() {
            *next = if following.parse::<usize>().is_ok() {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
        }
        node = next;
    }
}

/// Removes the node at `path`, if present. Mapping siblings keep their order.
///
/// Removing a sequence element shifts the elements after it down by one, so
/// `tags.0` on `["a", "b"]` leaves `["b"]`.
pub fn data_forget(target: &mut Value, path: &str) {
    let (parent_path, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    };
    let mut parent = target;
    if let Some(parent_path) = parent_path {
        for segment in parent_path.split('.') {
            parent = match parent {
                Value::Object(map) => match map.get_mut(segment) {
                    Some(child) => child,
                    None => return,
                },
                Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                    Some(child) => child,
                    None => return,
                },
                _ => return,
            };
        }
    }
    match parent {
        Value::Object(map) => {
            map.shift_remove(leaf);
        }
        Value::Array(items) => {
            if let Ok(index) = leaf.parse::<usize>() {
                if index < items.len() {
                    items.remove(index);
                }
            }
        }
        _ => {}
    }
}

/// Overlays `overlay` onto `base`. Mappings present on both sides are merged
/// key by key; anything else in `overlay` replaces what `base` had.
pub fn replace_recursive(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, incoming) in overlay {
        match base.get_mut(&key) {
            Some(Value::Object(existing)) if incoming.is_object() => {
                if let Value::Object(incoming) = incoming {
                    replace_recursive(existing, incoming);
                }
            }
            _ => {
                base.insert(key, incoming);
            }
        }
    }
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn split_first(path: &str) -> (&str, &str) {
    path.split_once('.').unwrap_or((path, ""))
}

fn get_or_whole<'a>(node: &'a Value, rest: &str) -> Option<Cow<'a, Value>> {
    if rest.is_empty() {
        Some(Cow::Borrowed(node))
    } else {
        data_get(node, rest)
    }
}

fn get_segments<'a>(target: &'a Value, segments: &[&str]) -> Option<Cow<'a, Value>> {
    let Some((&head, tail)) = segments.split_first() else {
        return Some(Cow::Borrowed(target));
    };

    if head == "*" {
        let children: Box<dyn Iterator<Item = &Value>> = match target {
            Value::Array(items) => Box::new(items.iter()),
            Value::Object(map) => Box::new(map.values()),
            _ => return None,
        };
        let fanned: Vec<Value> = children
            .filter_map(|child| get_segments(child, tail))
            .map(Cow::into_owned)
            .collect();
        return collect_wildcard(fanned, &tail.join("."));
    }

    let child = match target {
        Value::Object(map) => map.get(head)?,
        Value::Array(items) => items.get(head.parse::<usize>().ok()?)?,
        _ => return None,
    };
    get_segments(child, tail)
}

fn collect_wildcard<'a>(fanned: Vec<Value>, rest: &str) -> Option<Cow<'a, Value>> {
    if fanned.is_empty() {
        return None;
    }
    let nested_wildcard = rest.split('.').any(|segment| segment == "*");
    let values = if nested_wildcard {
        fanned
            .into_iter()
            .flat_map(|value| match value {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect()
    } else {
        fanned
    };
    Some(Cow::Owned(Value::Array(values)))
}

/// Returns the child slot named by `segment`, creating it when missing.
fn slot<'a>(node: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*node {
        Value::Array(items) => segment.parse::<usize>().ok().filter(|&i| i <= items.len()),
        _ => None,
    };
    match (node, index) {
        (Value::Array(items), Some(index)) => {
            if index == items.len() {
                items.push(Value::Null);
            }
            &mut items[index]
        }
        (Value::Object(map), _) => map.entry(segment.to_owned()).or_insert(Value::Null),
        (other, _) => {
            // Out-of-range index: keep the elements under their positions.
            *other = match std::mem::take(other) {
                Value::Array(items) => Value::Object(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), v))
                        .collect(),
                ),
                _ => Value::Object(Map::new()),
            };
            slot(other, segment)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_walks_nested_mappings() {
        let tree = json!({"a": {"b": 5}});
        assert_eq!(data_get(&tree, "a.b").as_deref(), Some(&json!(5)));
        assert!(data_get(&json!({"a": {}}), "a.b").is_none());
    }

    #[test]
    fn get_returns_explicit_null() {
        let tree = json!({"a": null});
        assert_eq!(data_get(&tree, "a").as_deref(), Some(&Value::Null));
        assert!(data_has(&tree, "a"));
        assert!(!data_has(&tree, "a.b"));
    }

    #[test]
    fn get_indexes_sequences() {
        let tree = json!({"tags": ["x", "y"]});
        assert_eq!(data_get(&tree, "tags.1").as_deref(), Some(&json!("y")));
        assert!(data_get(&tree, "tags.2").is_none());
        assert!(data_get(&tree, "tags.first").is_none());
    }

    #[test]
    fn wildcard_fans_out_and_skips_missing() {
        let tree = json!({"users": [
            {"name": "a", "tags": ["t1"]},
            {"tags": ["t2", "t3"]},
            {"name": "c"}
        ]});
        assert_eq!(
            data_get(&tree, "users.*.name").map(Cow::into_owned),
            Some(json!(["a", "c"]))
        );
        assert_eq!(
            data_get(&tree, "users.*.tags.*").map(Cow::into_owned),
            Some(json!(["t1", "t2", "t3"]))
        );
        assert!(data_get(&tree, "users.*.email").is_none());
    }

    #[test]
    fn map_get_starts_from_a_bag() {
        let mut map = Map::new();
        map.insert("user".into(), json!({"name": "alice"}));
        assert_eq!(map_get(&map, "user.name").as_deref(), Some(&json!("alice")));
        assert_eq!(map_get(&map, "user").as_deref(), Some(&json!({"name": "alice"})));
        assert!(map_get(&map, "nobody").is_none());
    }

    #[test]
    fn set_creates_intermediate_mappings() {
        let mut tree = json!({});
        data_set(&mut tree, "user.address.city", json!("Oslo"));
        assert_eq!(tree, json!({"user": {"address": {"city": "Oslo"}}}));

        data_set(&mut tree, "user.address", json!("gone"));
        data_set(&mut tree, "user.address.zip", json!("0150"));
        assert_eq!(tree, json!({"user": {"address": {"zip": "0150"}}}));
    }

    #[test]
    fn set_into_sequences() {
        let mut tree = json!({"tags": ["a"]});
        data_set(&mut tree, "tags.0", json!("z"));
        data_set(&mut tree, "tags.1", json!("b"));
        assert_eq!(tree, json!({"tags": ["z", "b"]}));
    }

    #[test]
    fn set_builds_sequences_for_index_segments() {
        let mut tree = json!({});
        data_set(&mut tree, "tags.0", json!("a"));
        data_set(&mut tree, "tags.1", json!("b"));
        data_set(&mut tree, "users.0.name", json!("ann"));
        assert_eq!(tree, json!({"tags": ["a", "b"], "users": [{"name": "ann"}]}));

        let mut tree = json!({});
        data_set(&mut tree, "tags.2", json!("c"));
        assert_eq!(tree, json!({"tags": {"2": "c"}}));
    }

    #[test]
    fn forget_shifts_later_sequence_elements() {
        let mut tree = json!({"tags": ["a", "b", "c"]});
        data_forget(&mut tree, "tags.0");
        assert_eq!(tree, json!({"tags": ["b", "c"]}));
        data_forget(&mut tree, "tags.5");
        assert_eq!(tree, json!({"tags": ["b", "c"]}));
    }

    #[test]
    fn forget_preserves_sibling_order() {
        let mut tree = json!({"a": 1, "b": {"c": 2, "d": 3}, "e": 4});
        data_forget(&mut tree, "b.c");
        data_forget(&mut tree, "a");
        data_forget(&mut tree, "missing.path");
        assert_eq!(serde_json::to_string(&tree).unwrap(), r#"{"b":{"d":3},"e":4}"#);
    }

    #[test]
    fn replace_recursive_merges_mappings() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": 1})
            .as_object()
            .cloned()
            .unwrap();
        let overlay = json!({"a": {"y": 3}, "b": {"n": 1}})
            .as_object()
            .cloned()
            .unwrap();
        replace_recursive(&mut base, overlay);
        assert_eq!(Value::Object(base), json!({"a": {"x": 1, "y": 3}, "b": {"n": 1}}));
    }
}
