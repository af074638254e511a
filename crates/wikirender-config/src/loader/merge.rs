//! Layer merging for normalized config documents.
//!
//! The document is flat, so merging works on top-level keys: scalars replace,
//! and `endpoints` lists are merged entry by entry. An overlay entry whose
//! prefix is already present replaces that entry in place; other entries are
//! appended, so the first registered endpoint stays the default.

use log::debug;
use serde_json::{Map, Value};

const ENDPOINTS_KEY: &str = "endpoints";

/// Merge `overlay` into `base`, skipping keys present in `locked`.
pub(super) fn merge_layer(base: &mut Value, overlay: &Value, locked: Option<&Value>) {
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        return;
    };
    let locked_map = locked.and_then(Value::as_object);
    merge_maps(base_map, overlay_map, locked_map);
}

fn merge_maps(
    base: &mut Map<String, Value>,
    overlay: &Map<String, Value>,
    locked: Option<&Map<String, Value>>,
) {
    for (key, value) in overlay {
        if locked.is_some_and(|locked| locked.contains_key(key)) {
            debug!("ignoring override of required key (key={key})");
            continue;
        }
        if key == ENDPOINTS_KEY {
            if let Some(existing) = base.get_mut(key) {
                merge_endpoints(existing, value);
                continue;
            }
        }
        base.insert(key.clone(), value.clone());
    }
}

fn merge_endpoints(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Array(entries), Value::Array(additions)) => {
            for addition in additions {
                let slot = prefix_of(addition).and_then(|prefix| {
                    entries
                        .iter()
                        .position(|entry| prefix_of(entry) == Some(prefix))
                });
                match slot {
                    Some(index) => entries[index] = addition.clone(),
                    None => entries.push(addition.clone()),
                }
            }
        }
        (base_slot, overlay_value) => *base_slot = overlay_value.clone(),
    }
}

fn prefix_of(entry: &Value) -> Option<&str> {
    entry
        .get("prefix")
        .and_then(Value::as_str)
        .filter(|prefix| !prefix.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn endpoints_replace_by_prefix_and_append_otherwise() {
        let mut base = json!({
            "endpoints": [
                { "uri": "http://a/api.php", "domain": "a.org", "prefix": "a" },
                { "uri": "http://b/api.php", "domain": "b.org", "prefix": "b" }
            ]
        });
        let overlay = json!({
            "endpoints": [
                { "uri": "http://b2/api.php", "domain": "b.org", "prefix": "b" },
                { "uri": "http://c/api.php", "domain": "c.org" }
            ]
        });
        merge_layer(&mut base, &overlay, None);

        let uris: Vec<_> = base["endpoints"]
            .as_array()
            .expect("array")
            .iter()
            .map(|entry| entry["uri"].as_str().expect("uri"))
            .collect();
        assert_eq!(
            uris,
            vec!["http://a/api.php", "http://b2/api.php", "http://c/api.php"]
        );
    }

    #[test]
    fn locked_keys_are_not_overridden() {
        let locked = json!({ "require_valid_ssl": true });
        let mut base = locked.clone();
        merge_layer(
            &mut base,
            &json!({ "require_valid_ssl": false, "debug": true }),
            Some(&locked),
        );
        assert_eq!(base, json!({ "require_valid_ssl": true, "debug": true }));
    }
}
