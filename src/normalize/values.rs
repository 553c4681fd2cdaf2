use serde_json::Value;

/// Text forms that mean "no value" once trimmed and lowercased.
const MISSING_MARKERS: &[&str] = &["nan", "null", "none", "", "na", "n/a"];

/// True when a raw JSON value should be stored as absent before any conversion.
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let folded = s.trim().to_lowercase();
            MISSING_MARKERS.contains(&folded.as_str())
        }
        // bare NaN/Infinity literals are rewritten to null before parsing
        _ => false,
    }
}

/// Convert a JSON scalar (number or numeric text) to a float.
/// Sentinels, unparseable text and non-finite results all become `None`.
pub fn to_optional_float(value: &Value) -> Option<f64> {
    if is_missing(value) {
        return None;
    }
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}

/// Convert a JSON scalar to an integer, truncating toward zero ("4.9" -> 4, "-3.5" -> -3).
pub fn to_optional_int(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    to_optional_float(value).and_then(truncate_to_i64)
}

/// Pass-through text field: strings as-is, numbers and booleans rendered as text.
pub fn to_optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Null, `false`, zero, `""` and empty containers.
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

pub(crate) fn truncate_to_i64(f: f64) -> Option<i64> {
    if !f.is_finite() {
        return None;
    }
    let t = f.trunc();
    if t < i64::MIN as f64 || t >= i64::MAX as f64 {
        None
    } else {
        Some(t as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinels_are_absent() {
        for s in ["nan", "NULL", " ", "n/a", "NA", "", "  None ", "NaN", " N/A\t"] {
            assert_eq!(to_optional_float(&json!(s)), None, "float {:?}", s);
            assert_eq!(to_optional_int(&json!(s)), None, "int {:?}", s);
        }
        assert_eq!(to_optional_float(&Value::Null), None);
        assert_eq!(to_optional_int(&Value::Null), None);
    }

    #[test]
    fn int_truncates_toward_zero() {
        assert_eq!(to_optional_int(&json!("4.9")), Some(4));
        assert_eq!(to_optional_int(&json!("-3.5")), Some(-3));
        assert_eq!(to_optional_int(&json!(12.99)), Some(12));
        assert_eq!(to_optional_int(&json!(45)), Some(45));
        assert_eq!(to_optional_int(&json!(" 30 ")), Some(30));
    }

    #[test]
    fn float_accepts_text_and_numbers() {
        assert_eq!(to_optional_float(&json!("4.5")), Some(4.5));
        assert_eq!(to_optional_float(&json!(3)), Some(3.0));
        assert_eq!(to_optional_float(&json!(4.8)), Some(4.8));
    }

    #[test]
    fn garbage_is_absent_not_an_error() {
        assert_eq!(to_optional_float(&json!("about 20 minutes")), None);
        assert_eq!(to_optional_int(&json!("PT20M")), None);
        assert_eq!(to_optional_float(&json!("inf")), None);
        assert_eq!(to_optional_int(&json!([1, 2])), None);
        assert_eq!(to_optional_int(&json!({"minutes": 5})), None);
        assert_eq!(to_optional_float(&json!(true)), None);
    }

    #[test]
    fn falsy_values() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(is_falsy(&v), "{}", v);
        }
        for v in [json!(true), json!(-1), json!(" "), json!("0"), json!([0]), json!({"a": null})] {
            assert!(!is_falsy(&v), "{}", v);
        }
    }

    #[test]
    fn text_passthrough() {
        assert_eq!(to_optional_text(Some(&json!("4-6"))).as_deref(), Some("4-6"));
        assert_eq!(to_optional_text(Some(&json!(4))).as_deref(), Some("4"));
        assert_eq!(to_optional_text(Some(&Value::Null)), None);
        assert_eq!(to_optional_text(Some(&json!(["a"]))), None);
        assert_eq!(to_optional_text(None), None);
    }
}
