//! Converts `schemars` output into the OpenAPI subset Gemini accepts as a
//! `responseSchema`: no `$ref`, no `additionalProperties`, single `type`
//! values with `nullable` instead of `["x", "null"]`.

use schemars::JsonSchema;
use serde_json::{json, Map, Value};

const MAX_DEPTH: usize = 16;
const STRIPPED_KEYS: [&str; 8] = [
    "$schema",
    "$id",
    "$ref",
    "title",
    "default",
    "examples",
    "additionalProperties",
    "definitions",
];

/// Schema text for embedding in a system prompt.
pub fn schema_text<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Schema value for `generationConfig.responseSchema`.
pub fn gemini_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let root = serde_json::to_value(schema).unwrap_or(Value::Null);
    to_gemini(root)
}

pub fn to_gemini(mut root: Value) -> Value {
    let definitions = root
        .get("definitions")
        .or_else(|| root.get("$defs"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    simplify(&mut root, &definitions, 0);
    if let Value::Object(map) = &mut root {
        map.remove("$defs");
    }
    root
}

fn simplify(node: &mut Value, definitions: &Map<String, Value>, depth: usize) {
    if depth > MAX_DEPTH {
        *node = json!({ "type": "string", "nullable": true });
        return;
    }

    // `$ref` chains are followed a bounded number of times.
    for _ in 0..8 {
        let Some(target) = node.get("$ref").and_then(Value::as_str).map(str::to_owned) else {
            break;
        };
        let name = target.rsplit('/').next().unwrap_or_default();
        *node = match definitions.get(name) {
            Some(def) => def.clone(),
            None => json!({ "type": "string", "description": format!("unresolved {target}") }),
        };
    }

    if let Value::Bool(any) = *node {
        *node = if any { json!({ "type": "string", "nullable": true }) } else { json!({ "type": "string" }) };
    }

    let Value::Object(map) = node else {
        return;
    };

    for key in STRIPPED_KEYS {
        map.remove(key);
    }

    // schemars emits a single-element allOf around referenced types with descriptions
    if let Some(Value::Array(all_of)) = map.remove("allOf") {
        if let [only] = all_of.as_slice() {
            let mut inner = only.clone();
            simplify(&mut inner, definitions, depth + 1);
            if let Value::Object(inner_map) = inner {
                for (k, v) in inner_map {
                    map.entry(k).or_insert(v);
                }
            }
        } else {
            map.insert("allOf".into(), Value::Array(all_of));
        }
    }

    if let Some(Value::Array(types)) = map.get("type").cloned() {
        let concrete: Vec<&Value> = types.iter().filter(|t| t.as_str() != Some("null")).collect();
        if let Some(first) = concrete.first() {
            map.insert("type".into(), (*first).clone());
        }
        if concrete.len() < types.len() {
            map.insert("nullable".into(), Value::Bool(true));
        }
    }

    if let Some(Value::Object(props)) = map.get_mut("properties") {
        for prop in props.values_mut() {
            simplify(prop, definitions, depth + 1);
        }
    }
    if let Some(items) = map.get_mut("items") {
        simplify(items, definitions, depth + 1);
    }
    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(options)) = map.get_mut(key) {
            for option in options.iter_mut() {
                simplify(option, definitions, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::form::FieldUpdate;

    #[derive(schemars::JsonSchema)]
    #[allow(dead_code)]
    struct Sample {
        name: String,
        nickname: Option<String>,
        updates: Vec<FieldUpdate>,
    }

    #[test]
    fn refs_are_inlined_and_nullable_collapsed() {
        let schema = gemini_schema::<Sample>();
        let text = schema.to_string();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("definitions"));
        assert!(!text.contains("$schema"));
        assert_eq!(schema["properties"]["nickname"]["type"], "string");
        assert_eq!(schema["properties"]["nickname"]["nullable"], true);
        assert_eq!(schema["properties"]["updates"]["items"]["properties"]["value"]["type"], "string");
    }

    #[test]
    fn field_enum_survives() {
        let schema = gemini_schema::<Sample>();
        let field = &schema["properties"]["updates"]["items"]["properties"]["field"];
        let variants = field["enum"].as_array().unwrap();
        assert!(variants.contains(&json!("few_shot_example")));
    }

    #[test]
    fn boolean_schema_becomes_typed() {
        let out = to_gemini(json!({ "type": "object", "properties": { "x": true } }));
        assert_eq!(out["properties"]["x"]["type"], "string");
    }

    #[test]
    fn unresolved_ref_is_replaced() {
        let out = to_gemini(json!({ "type": "object", "properties": { "x": { "$ref": "#/definitions/Missing" } } }));
        assert_eq!(out["properties"]["x"]["type"], "string");
    }
}
