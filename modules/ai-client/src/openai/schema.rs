use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Trait for types that can be used as OpenAI structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate an OpenAI-compatible JSON schema for this type.
    ///
    /// OpenAI requires:
    /// 1. `additionalProperties: false` on all object schemas
    /// 2. ALL properties listed in `required`, even nullable ones
    /// 3. Fully inlined schemas (no `$ref` references)
    fn openai_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        fix_object_schemas(&mut value);

        let definitions = value
            .get("definitions")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));
        inline_refs(&mut value, &definitions);

        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn fix_object_schemas(value: &mut Value) {
    if let Value::Object(map) = value {
        if map.get("type") == Some(&Value::String("object".to_string())) {
            map.insert("additionalProperties".to_string(), Value::Bool(false));

            if let Some(Value::Object(props)) = map.get("properties") {
                let all_keys: Vec<Value> =
                    props.keys().map(|k| Value::String(k.clone())).collect();
                map.insert("required".to_string(), Value::Array(all_keys));
            }
        }

        for (_, v) in map.iter_mut() {
            fix_object_schemas(v);
        }
    } else if let Value::Array(arr) = value {
        for item in arr.iter_mut() {
            fix_object_schemas(item);
        }
    }
}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if let Some(name) = reference.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(name) {
                        let mut inlined = def.clone();
                        inline_refs(&mut inlined, definitions);
                        *value = inlined;
                        return;
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}
