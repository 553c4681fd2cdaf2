use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::values::{is_falsy, truncate_to_i64};

static FIRST_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?[0-9]+(?:\.[0-9]+)?").unwrap());

/// Derive an integer calorie count from a nutrients mapping, e.g. `{"calories": "389 kcal"}` -> 389.
///
/// Falsy entries (null, empty text, zero, empty containers) count as missing.
pub fn extract_calories(nutrients: Option<&Value>) -> Option<i64> {
    let raw = nutrients?.as_object()?.get("calories")?;
    if is_falsy(raw) {
        return None;
    }
    match raw {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i),
            None => n.as_f64().and_then(truncate_to_i64),
        },
        Value::String(s) => {
            let m = FIRST_NUMBER_RE.find(s)?;
            m.as_str().parse::<f64>().ok().and_then(truncate_to_i64)
        }
        _ => None,
    }
}
