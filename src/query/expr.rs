use std::sync::LazyLock;

use regex::Regex;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }
}

// Two-character operators must be tried before their one-character prefixes.
const OPERATORS: &[(&str, CompareOp)] = &[
    ("<=", CompareOp::Le),
    (">=", CompareOp::Ge),
    ("=", CompareOp::Eq),
    ("<", CompareOp::Lt),
    (">", CompareOp::Gt),
];

/// Parse a filter expression such as `>=400`, `<= 4.5` or `30` (bare number means `=`).
///
/// Returns `None` for empty or malformed input; callers treat that as "no filter".
pub fn parse_expr(text: &str) -> Option<(CompareOp, f64)> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let (op, rest) = OPERATORS
        .iter()
        .find_map(|(prefix, op)| compact.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((CompareOp::Eq, compact.as_str()));

    if !NUMBER_RE.is_match(rest) {
        return None;
    }
    rest.parse::<f64>().ok().map(|value| (op, value))
}
