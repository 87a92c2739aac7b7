//! Dot-delimited key paths over a JSON document: `user.playlistId`
//! addresses `{"user": {"playlistId": ...}}`.

use serde_json::{Map, Value};

fn segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('.').filter(|segment| !segment.is_empty())
}

pub fn get<'a>(doc: &'a Value, key: &str) -> Option<&'a Value> {
    segments(key).try_fold(doc, |node, segment| node.as_object()?.get(segment))
}

/// Writes `value` at `key`, creating intermediate objects and replacing any
/// non-object found on the way. Returns the previous value.
pub fn set(doc: &mut Value, key: &str, value: Value) -> Option<Value> {
    let parts: Vec<&str> = segments(key).collect();
    let Some((last, parents)) = parts.split_last() else {
        return Some(std::mem::replace(doc, value));
    };

    let mut node = doc;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.to_string(), value)
}

/// Removes `key`, returning what was stored there.
pub fn remove(doc: &mut Value, key: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(key).collect();
    let (last, parents) = parts.split_last()?;

    let mut node = doc;
    for segment in parents {
        node = node.as_object_mut()?.get_mut(*segment)?;
    }
    node.as_object_mut()?.remove(*last)
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just made an object"),
    }
}

/// Deep-merges `defaults` into `target` without overwriting anything already
/// present. Returns how many leaves were filled in.
pub fn fill_defaults(target: &mut Value, defaults: &Value) -> usize {
    let Value::Object(defaults) = defaults else {
        return 0;
    };
    let target = ensure_object(target);

    let mut filled = 0;
    for (key, default) in defaults {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), default.clone());
                filled += 1;
            }
            Some(existing) if existing.is_object() && default.is_object() => {
                filled += fill_defaults(existing, default);
            }
            Some(_) => {}
        }
    }
    filled
}

/// Top-level keys of `doc` that no key in `registered` lives under.
pub fn unknown_keys<'a, I>(doc: &Value, registered: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let roots: Vec<&str> = registered
        .into_iter()
        .filter_map(|key| segments(key).next())
        .collect();

    match doc.as_object() {
        Some(map) => map
            .keys()
            .filter(|key| !roots.contains(&key.as_str()))
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested() {
        let doc = json!({"user": {"playlistId": "PL1"}, "filterAds": true});
        assert_eq!(get(&doc, "user.playlistId"), Some(&json!("PL1")));
        assert_eq!(get(&doc, "filterAds"), Some(&json!(true)));
        assert_eq!(get(&doc, "user.missing"), None);
        assert_eq!(get(&doc, "filterAds.deeper"), None);
    }

    #[test]
    fn test_set_creates_parents() {
        let mut doc = json!({});
        assert_eq!(set(&mut doc, "a.b.c", json!(1)), None);
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));

        assert_eq!(set(&mut doc, "a.b.c", json!(2)), Some(json!(1)));
        assert_eq!(set(&mut doc, "a.b", json!("flat")), Some(json!({"c": 2})));
        set(&mut doc, "a.b.d", json!(true));
        assert_eq!(doc, json!({"a": {"b": {"d": true}}}));
    }

    #[test]
    fn test_remove() {
        let mut doc = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(remove(&mut doc, "a.b"), Some(json!(1)));
        assert_eq!(remove(&mut doc, "a.x"), None);
        assert_eq!(remove(&mut doc, "z.y"), None);
        assert_eq!(doc, json!({"a": {"c": 2}}));
    }

    #[test]
    fn test_fill_defaults_keeps_existing_values() {
        let mut doc = json!({"windowAlwaysOnTop": false, "windowBounds": {"x": 5}});
        let defaults = json!({
            "windowAlwaysOnTop": true,
            "filterAds": true,
            "windowBounds": {"x": 100, "y": 200}
        });

        assert_eq!(fill_defaults(&mut doc, &defaults), 2);
        assert_eq!(
            doc,
            json!({"windowAlwaysOnTop": false, "filterAds": true, "windowBounds": {"x": 5, "y": 200}})
        );
        assert_eq!(fill_defaults(&mut doc, &defaults), 0);
    }

    #[test]
    fn test_unknown_keys() {
        let doc = json!({"filterAds": true, "legacyTheme": "dark", "user": {"x": 1}});
        let mut unknown = unknown_keys(&doc, ["filterAds", "user.playlistId"]);
        unknown.sort();
        assert_eq!(unknown, vec!["legacyTheme".to_string()]);
    }
}
