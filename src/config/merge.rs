//! Deterministic deep merge of configuration fragments.
//!
//! Fragments are folded in path order; for a key defined by several
//! fragments the last one wins. Objects merge key by key, every other value
//! (arrays included) is replaced wholesale.

use serde_json::Value;

use crate::config::error::{ConfigError, MergeError};
use crate::config::loader::{decode_options, read_config, ConfigFragment, ConfigSources};
use crate::config::schema::Options;

/// Load all sources and merge them into one [`Options`] value.
pub fn read_config_and_merge(sources: &ConfigSources) -> Result<Options, ConfigError> {
    let fragments = read_config(sources)?;
    merge_fragments(fragments)
}

/// Merge already loaded fragments.
///
/// `fragments` must be sorted by path, which [`read_config`] guarantees.
/// A single fragment is returned as-is without going through JSON.
pub fn merge_fragments(mut fragments: Vec<ConfigFragment>) -> Result<Options, ConfigError> {
    if fragments.len() == 1 {
        if let Some(fragment) = fragments.pop() {
            return Ok(fragment.into_options());
        }
    }

    let mut merged: Option<Value> = None;
    for fragment in &fragments {
        let next = match merged.take() {
            None => fragment.raw().clone(),
            Some(destination) => {
                merge_json(fragment.raw(), destination, false).map_err(|source| {
                    ConfigError::Merge {
                        path: fragment.path().to_string(),
                        source,
                    }
                })?
            }
        };
        merged = Some(next);
    }

    let merged = merged.ok_or(ConfigError::Empty)?;
    tracing::debug!(fragments = fragments.len(), "Merged config fragments");
    decode_options(&merged).map_err(ConfigError::Unmarshal)
}

/// Merge `source` into `destination`; values from `source` take precedence.
///
/// A `null` source leaves the destination untouched.
///
/// With `append_arrays`, an array destination is extended by the source
/// (a non-array source is pushed as one element) instead of being replaced.
pub fn merge_json(source: &Value, destination: Value, append_arrays: bool) -> Result<Value, MergeError> {
    let mut key_path = Vec::new();
    merge_value(source, destination, append_arrays, &mut key_path)
}

fn merge_value(
    source: &Value,
    destination: Value,
    append_arrays: bool,
    key_path: &mut Vec<String>,
) -> Result<Value, MergeError> {
    if source.is_null() {
        return Ok(destination);
    }
    match destination {
        Value::Array(mut items) if append_arrays => {
            match source {
                Value::Array(extra) => items.extend(extra.iter().cloned()),
                other => items.push(other.clone()),
            }
            Ok(Value::Array(items))
        }
        Value::Object(mut object) => {
            let Value::Object(source) = source else {
                return Err(MergeError {
                    key_path: key_path.clone(),
                    source_kind: kind_of(source),
                });
            };
            for (key, value) in source {
                let merged = match object.remove(key) {
                    Some(old) => {
                        key_path.push(key.clone());
                        let merged = merge_value(value, old, append_arrays, key_path)?;
                        key_path.pop();
                        merged
                    }
                    None => value.clone(),
                };
                object.insert(key.clone(), merged);
            }
            Ok(Value::Object(object))
        }
        _ => Ok(source.clone()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    fn write(dir: &Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path.display().to_string()
    }

    #[test]
    fn later_source_wins_on_leaf_conflict() {
        let merged = merge_json(
            &json!({ "log": { "level": "debug" } }),
            json!({ "log": { "level": "info", "timestamp": true }, "a": 1 }),
            false,
        )
        .unwrap();
        assert_eq!(
            merged,
            json!({ "log": { "level": "debug", "timestamp": true }, "a": 1 })
        );
    }

    #[test]
    fn arrays_are_replaced_by_default() {
        let merged = merge_json(&json!({ "x": [3] }), json!({ "x": [1, 2] }), false).unwrap();
        assert_eq!(merged, json!({ "x": [3] }));
    }

    #[test]
    fn arrays_append_when_requested() {
        let merged = merge_json(&json!({ "x": [3] }), json!({ "x": [1, 2] }), true).unwrap();
        assert_eq!(merged, json!({ "x": [1, 2, 3] }));
    }

    #[test]
    fn scalar_replaces_scalar_and_object_replaces_scalar() {
        let merged = merge_json(
            &json!({ "a": "two", "b": { "c": 1 } }),
            json!({ "a": 1, "b": false }),
            false,
        )
        .unwrap();
        assert_eq!(merged, json!({ "a": "two", "b": { "c": 1 } }));
    }

    #[test]
    fn scalar_into_object_is_rejected_with_key_path() {
        let err = merge_json(
            &json!({ "log": { "level": 5 }, "dns": "x" }),
            json!({ "log": { "level": "info" }, "dns": { "servers": [] } }),
            false,
        )
        .unwrap_err();
        assert_eq!(err.key_path, vec!["dns".to_string()]);
        assert_eq!(err.source_kind, "string");
    }

    #[test]
    fn example_fragments_merge_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "20-override.yaml", "log:\n  level: debug\n");
        write(dir.path(), "10-base.json", r#"{"log":{"level":"info"},"a":1}"#);

        let sources = ConfigSources::new(Vec::new(), vec![dir.path().to_path_buf()]);
        let options = read_config_and_merge(&sources).unwrap();
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "log": { "level": "debug" }, "a": 1 })
        );
    }

    #[test]
    fn precedence_follows_path_not_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let b = write(dir.path(), "b.json", r#"{"k":"from-b","only_b":true}"#);
        let a = write(dir.path(), "a.json", r#"{"k":"from-a","only_a":true}"#);

        let options = read_config_and_merge(&ConfigSources::new(vec![b, a], Vec::new())).unwrap();
        assert_eq!(options.sections["k"], json!("from-b"));
        assert_eq!(options.sections["only_a"], json!(true));
        assert_eq!(options.sections["only_b"], json!(true));
    }

    #[test]
    fn single_fragment_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "only.json",
            r#"{"log":{"level":"warn","disable_color":true},"x":[1,{"y":null}]}"#,
        );

        let fragment = crate::config::loader::read_config_at(&path).unwrap();
        let expected = fragment.options().clone();
        let merged = read_config_and_merge(&ConfigSources::file(path)).unwrap();
        assert_eq!(merged, expected);
    }

    #[test]
    fn no_fragments_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sources = ConfigSources::new(Vec::new(), vec![dir.path().to_path_buf()]);
        assert!(matches!(read_config_and_merge(&sources), Err(ConfigError::Empty)));
    }

    #[test]
    fn merge_failure_names_offending_fragment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.json", r#"{"outbounds":{"direct":{}}}"#);
        let bad = write(dir.path(), "2.json", r#"{"outbounds":"direct"}"#);

        let sources = ConfigSources::new(Vec::new(), vec![dir.path().to_path_buf()]);
        let err = read_config_and_merge(&sources).unwrap_err();
        assert!(matches!(err, ConfigError::Merge { ref path, .. } if *path == bad));
    }

    #[test]
    fn fragment_decode_failure_precedes_merge() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.json", r#"{"a":1}"#);
        write(dir.path(), "2.json", r#"{"log":{"level":7}}"#);

        let sources = ConfigSources::new(Vec::new(), vec![dir.path().to_path_buf()]);
        assert!(matches!(read_config_and_merge(&sources), Err(ConfigError::Decode { .. })));
    }

    #[test]
    fn null_source_keeps_destination() {
        let merged = merge_json(&Value::Null, json!({ "a": 1 }), false).unwrap();
        assert_eq!(merged, json!({ "a": 1 }));

        let merged = merge_json(&json!({ "a": null }), json!({ "a": { "b": 2 } }), false).unwrap();
        assert_eq!(merged, json!({ "a": { "b": 2 } }));
    }

    #[test]
    fn empty_placeholder_fragment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "10-base.json", r#"{"log":{"level":"info"},"a":1}"#);
        write(dir.path(), "20-placeholder.yaml", "# nothing yet\n");
        write(dir.path(), "30-null.json", "null");

        let sources = ConfigSources::new(Vec::new(), vec![dir.path().to_path_buf()]);
        let options = read_config_and_merge(&sources).unwrap();
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({ "log": { "level": "info" }, "a": 1 })
        );
    }

    #[test]
    fn only_empty_fragments_merge_to_empty_options() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "");
        write(dir.path(), "b.yaml", "");

        let sources = ConfigSources::new(Vec::new(), vec![dir.path().to_path_buf()]);
        assert_eq!(read_config_and_merge(&sources).unwrap(), Options::default());
    }

    #[test]
    fn directory_precedence_ignores_redundant_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let b = write(dir.path(), "b.json", r#"{"k":"from-b"}"#);
        let conf = dir.path().join("conf.d");
        fs::create_dir(&conf).unwrap();
        write(&conf, "x.json", r#"{"k":"from-dir"}"#);

        // "<tmp>/./conf.d" would sort before "<tmp>/b.json" if left uncleaned
        let messy = std::path::PathBuf::from(format!("{}/./conf.d", dir.path().display()));
        let options = read_config_and_merge(&ConfigSources::new(vec![b], vec![messy])).unwrap();
        assert_eq!(options.sections["k"], json!("from-dir"));
    }
}
