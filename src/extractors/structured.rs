//! JSON-LD extraction from listing pages
//!
//! Extracts JSON-LD data from <script type="application/ld+json"> tags.
//! Supports @graph arrays and multiple JSON-LD blocks.

use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;

/// JSON-LD objects keyed by @type (schema.org prefix stripped)
#[derive(Debug, Default)]
pub struct JsonLd {
    by_type: HashMap<String, Vec<Value>>,
}

impl JsonLd {
    pub fn from_document(document: &Html) -> Self {
        let mut by_type: HashMap<String, Vec<Value>> = HashMap::new();
        let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
            return Self { by_type };
        };

        for element in document.select(&selector) {
            let text = element.text().collect::<String>();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
                collect_typed_objects(&json, &mut by_type);
            }
        }

        Self { by_type }
    }

    /// First object of any of the given types
    pub fn first_of(&self, types: &[&str]) -> Option<&Value> {
        types
            .iter()
            .find_map(|t| self.by_type.get(*t).and_then(|items| items.first()))
    }

    /// Navigate a dotted path inside the first object of any given type.
    ///
    /// Arrays along the path resolve to their first element, so
    /// `offers.price` works whether `offers` is an object or a list.
    pub fn text_at(&self, types: &[&str], path: &str) -> Option<String> {
        let mut current = self.first_of(types)?;
        for segment in path.split('.') {
            if let Value::Array(items) = current {
                current = items.first()?;
            }
            current = current.get(segment)?;
        }
        value_text(current)
    }
}

/// Recursively collect objects with @type, including from @graph
fn collect_typed_objects(value: &Value, result: &mut HashMap<String, Vec<Value>>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::Array(graph)) = obj.get("@graph") {
                for item in graph {
                    collect_typed_objects(item, result);
                }
            }

            if let Some(type_val) = obj.get("@type") {
                let types = match type_val {
                    Value::String(s) => vec![s.clone()],
                    Value::Array(arr) => arr
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect(),
                    _ => vec![],
                };

                for t in types {
                    let clean_type = t
                        .strip_prefix("https://schema.org/")
                        .or_else(|| t.strip_prefix("http://schema.org/"))
                        .unwrap_or(&t)
                        .to_string();
                    result.entry(clean_type).or_default().push(value.clone());
                }
            }
        }
        Value::Array(arr) => {
            for item in arr {
                collect_typed_objects(item, result);
            }
        }
        _ => {}
    }
}

/// Scalar JSON value as text; strings are unquoted, containers rejected
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric JSON value, accepting numbers encoded as strings
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
