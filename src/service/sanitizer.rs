use serde_json::{Map, Value};

/// 递归去除 null / 空字符串字段, 子对象清理后为空则一并删除.
///
/// - 返回新值, 不修改输入
/// - 0 和 false 保留
/// - 数组从不删除 (空数组保留为 `[]`), 长度不变; 其中的对象元素递归清理
pub fn clean(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(clean_object(map)),
        Value::Array(items) => Value::Array(items.iter().map(clean_element).collect()),
        other => other.clone(),
    }
}

fn clean_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            Value::Object(child) => {
                let cleaned = clean_object(child);
                if !cleaned.is_empty() {
                    out.insert(key.clone(), Value::Object(cleaned));
                }
            }
            Value::Array(_) => {
                out.insert(key.clone(), clean(value));
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// 数组元素: 对象/数组递归清理, 标量原样保留
fn clean_element(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => clean(value),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn has_empty_values(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.values().any(|v| {
                v.is_null() || v.as_str() == Some("") || has_empty_values(v)
            }),
            Value::Array(items) => items.iter().any(has_empty_values),
            _ => false,
        }
    }

    #[test]
    fn nested_null_prunes_parent() {
        assert_eq!(clean(&json!({"a": {"b": null}})), json!({}));
    }

    #[test]
    fn falsy_but_meaningful_values_are_kept() {
        let input = json!({"a": 0, "b": false, "c": "x"});
        assert_eq!(clean(&input), input);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(clean(&json!("text")), json!("text"));
        assert_eq!(clean(&json!(42)), json!(42));
        assert_eq!(clean(&Value::Null), Value::Null);
    }

    #[test]
    fn empty_arrays_are_preserved() {
        assert_eq!(
            clean(&json!({"items": [], "merchant": {"name": ""}})),
            json!({"items": []})
        );
    }

    #[test]
    fn array_elements_are_cleaned_but_not_removed() {
        let input = json!({"items": [
            {"name": "Tea", "price": null},
            {"name": null},
            null
        ]});
        assert_eq!(
            clean(&input),
            json!({"items": [{"name": "Tea"}, {}, null]})
        );
    }

    #[test]
    fn deep_sections_are_pruned_bottom_up() {
        let input = json!({
            "merchant": {"name": "Shop", "address": ""},
            "totals": {"tax": {"rate": null, "amount": ""}, "total": "9.99"},
            "payment": {"method": null, "card": {"last4": null}},
            "additional_info": ""
        });
        assert_eq!(
            clean(&input),
            json!({
                "merchant": {"name": "Shop"},
                "totals": {"total": "9.99"}
            })
        );
    }

    #[test]
    fn input_is_not_mutated() {
        let input = json!({"a": null, "b": {"c": ""}});
        let snapshot = input.clone();
        let _ = clean(&input);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn cleaning_is_idempotent_and_complete() {
        let samples = [
            json!({"a": {"b": {"c": {"d": {"e": null}}}}, "f": [{"g": ""}], "h": 0}),
            json!({"merchant": {"name": null}, "items": [{"name": "x", "total": null}]}),
            json!([{"a": null}, {"b": {"c": ""}}]),
        ];
        for sample in samples {
            let once = clean(&sample);
            assert_eq!(clean(&once), once);
            assert!(!has_empty_values(&once));
        }
    }
}
