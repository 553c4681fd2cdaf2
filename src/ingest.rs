use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use indicatif::ProgressBar;
use rayon::prelude::*;
use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::db::{self, NewRecipe};
use crate::error::IngestError;
use crate::normalize::values::is_falsy;
use crate::normalize::{extract_calories, to_optional_float, to_optional_int, to_optional_text};

/// Wrapper keys accepted around the record array, in priority order.
const WRAPPER_KEYS: &[&str] = &["recipes", "data", "items"];

const CHUNK_SIZE: usize = 500;

/// Non-standard number literals some exporters write. Longest first.
const NON_FINITE_LITERALS: &[&str] = &["-Infinity", "Infinity", "NaN"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    NotAnObject,
    MissingTitle,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => f.write_str("not an object"),
            SkipReason::MissingTitle => f.write_str("no title or name"),
        }
    }
}

/// Load a JSON file. A file that doesn't exist inserts nothing and is not an error.
pub fn ingest_file(
    conn: &Connection,
    path: &Path,
    progress: &ProgressBar,
) -> Result<IngestReport, IngestError> {
    if !path.exists() {
        warn!("JSON file not found at {:?}, nothing to load", path);
        return Ok(IngestReport::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loading recipes from {:?}", path);
    ingest_str(conn, &text, progress)
}

pub fn ingest_str(
    conn: &Connection,
    text: &str,
    progress: &ProgressBar,
) -> Result<IngestReport, IngestError> {
    let text = null_non_finite(text);
    let doc: Value = serde_json::from_str(&text)?;
    ingest(conn, doc, progress)
}

/// Replace bare `NaN`, `Infinity` and `-Infinity` tokens outside string literals with `null`,
/// so such values load as absent instead of failing the whole document.
fn null_non_finite(text: &str) -> Cow<'_, str> {
    if !NON_FINITE_LITERALS.iter().any(|lit| text.contains(lit)) {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_' || b == b'.';
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
            i += 1;
            continue;
        }
        if b == b'"' {
            in_string = true;
            i += 1;
            continue;
        }

        let starts_token = i == 0 || !is_word(bytes[i - 1]);
        let literal = NON_FINITE_LITERALS.iter().find(|lit| {
            let end = i + lit.len();
            bytes[i..].starts_with(lit.as_bytes()) && bytes.get(end).map_or(true, |&n| !is_word(n))
        });
        match literal {
            Some(lit) if starts_token => {
                out.push_str(&text[copied..i]);
                out.push_str("null");
                i += lit.len();
                copied = i;
            }
            _ => i += 1,
        }
    }

    out.push_str(&text[copied..]);
    Cow::Owned(out)
}

/// Normalize every record of `doc` and append the valid ones as one batch.
pub fn ingest(
    conn: &Connection,
    doc: Value,
    progress: &ProgressBar,
) -> Result<IngestReport, IngestError> {
    let records = unwrap_records(doc)?;
    progress.set_length(records.len() as u64);

    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for (chunk_no, chunk) in records.chunks(CHUNK_SIZE).enumerate() {
        let results: Vec<_> = chunk.par_iter().map(normalize_record).collect();
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    skipped += 1;
                    debug!(index = chunk_no * CHUNK_SIZE + i, %reason, "skipping record");
                }
            }
        }
        progress.inc(chunk.len() as u64);
    }

    let inserted = db::insert_batch(conn, &rows)?;
    progress.finish_and_clear();

    if skipped > 0 {
        warn!("Skipped {} invalid records", skipped);
    }
    info!(inserted, skipped, "Ingestion committed");
    Ok(IngestReport { inserted, skipped })
}

/// Delete every stored recipe, returning how many were removed.
pub fn reset(conn: &Connection) -> Result<usize, IngestError> {
    let removed = db::delete_all(conn)?;
    info!(removed, "Catalog reset");
    Ok(removed)
}

fn unwrap_records(doc: Value) -> Result<Vec<Value>, IngestError> {
    match doc {
        Value::Array(records) => Ok(records),
        Value::Object(mut obj) => {
            let key = WRAPPER_KEYS
                .iter()
                .find(|k| matches!(obj.get(**k), Some(Value::Array(_))))
                .ok_or(IngestError::UnsupportedShape)?;
            match obj.remove(*key) {
                Some(Value::Array(records)) => Ok(records),
                _ => Err(IngestError::UnsupportedShape),
            }
        }
        _ => Err(IngestError::UnsupportedShape),
    }
}

fn normalize_record(rec: &Value) -> Result<NewRecipe, SkipReason> {
    let obj = rec.as_object().ok_or(SkipReason::NotAnObject)?;

    // `name` is an alias used by some exports; a falsy `title` (false, 0) falls through to it
    let title = ["title", "name"]
        .iter()
        .filter_map(|k| obj.get(*k).filter(|v| !is_falsy(v)))
        .find_map(|v| to_optional_text(Some(v)).filter(|t| !t.trim().is_empty()))
        .ok_or(SkipReason::MissingTitle)?;

    let nutrients: Option<Map<String, Value>> =
        obj.get("nutrients").and_then(|n| n.as_object()).cloned();
    let calories_kcal = extract_calories(obj.get("nutrients"));

    Ok(NewRecipe {
        title,
        cuisine: to_optional_text(obj.get("cuisine")),
        rating: obj.get("rating").and_then(to_optional_float),
        prep_time: obj.get("prep_time").and_then(to_optional_int),
        cook_time: obj.get("cook_time").and_then(to_optional_int),
        total_time: obj.get("total_time").and_then(to_optional_int),
        description: to_optional_text(obj.get("description")),
        serves: to_optional_text(obj.get("serves")),
        nutrients,
        calories_kcal,
    })
}
