//! Field projection for API responses (`?include=` / `?exclude=`).

use serde_json::{Map, Value};

/// Keep or drop top-level keys of a JSON object.
///
/// Both lists are comma separated; whitespace around keys is ignored. When
/// `include` is non-empty it wins and `exclude` is not consulted. Unknown keys
/// are ignored and non-object values are returned untouched.
pub fn filter_fields(value: Value, include: Option<&str>, exclude: Option<&str>) -> Value {
    let Value::Object(object) = value else {
        return value;
    };

    if let Some(include) = include.filter(|s| !s.is_empty()) {
        let mut projected = Map::new();
        for key in split_keys(include) {
            if let Some(field) = object.get(key) {
                projected.insert(key.to_string(), field.clone());
            }
        }
        return Value::Object(projected);
    }

    if let Some(exclude) = exclude.filter(|s| !s.is_empty()) {
        let excluded: Vec<&str> = split_keys(exclude).collect();
        return Value::Object(
            object
                .into_iter()
                .filter(|(key, _)| !excluded.contains(&key.as_str()))
                .collect(),
        );
    }

    Value::Object(object)
}

fn split_keys(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({"a": 1, "b": 2, "c": 3, "d": 4})
    }

    #[test]
    fn test_no_filters_returns_everything() {
        assert_eq!(filter_fields(sample(), None, None), sample());
        assert_eq!(filter_fields(sample(), Some(""), Some("")), sample());
    }

    #[test]
    fn test_include() {
        assert_eq!(filter_fields(sample(), Some("a,c"), None), json!({"a": 1, "c": 3}));
        assert_eq!(filter_fields(sample(), Some(" a , c "), None), json!({"a": 1, "c": 3}));
        assert_eq!(filter_fields(sample(), Some("a,z"), None), json!({"a": 1}));
    }

    #[test]
    fn test_exclude() {
        assert_eq!(filter_fields(sample(), None, Some("b,d")), json!({"a": 1, "c": 3}));
        assert_eq!(filter_fields(sample(), None, Some("z")), sample());
    }

    #[test]
    fn test_include_wins_over_exclude() {
        assert_eq!(filter_fields(sample(), Some("a"), Some("a,b")), json!({"a": 1}));
    }

    #[test]
    fn test_non_object_passes_through() {
        assert_eq!(filter_fields(json!([1, 2]), Some("a"), None), json!([1, 2]));
    }
}
