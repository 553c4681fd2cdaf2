use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::query::filter::Predicate;

/// Rated recipes first (highest rating first), unrated last, ties by insertion order.
const CATALOG_ORDER: &str = "rating IS NULL, rating DESC, id ASC";

const RECIPE_COLUMNS: &str = "id, title, cuisine, rating, prep_time, cook_time, total_time,
                              description, serves, nutrients, calories_kcal";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    register_functions(conn)?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS recipes (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            title         TEXT NOT NULL CHECK(length(title) > 0),
            cuisine       TEXT,
            rating        REAL,
            prep_time     INTEGER,
            cook_time     INTEGER,
            total_time    INTEGER,
            description   TEXT,
            serves        TEXT,
            nutrients     TEXT,
            calories_kcal INTEGER,
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_recipes_title ON recipes(title);
        CREATE INDEX IF NOT EXISTS idx_recipes_cuisine ON recipes(cuisine);
        CREATE INDEX IF NOT EXISTS idx_recipes_rating ON recipes(rating);
        CREATE INDEX IF NOT EXISTS idx_recipes_total_time ON recipes(total_time);
        CREATE INDEX IF NOT EXISTS idx_recipes_calories ON recipes(calories_kcal);
        ",
    )
}

/// `fold_case(text)`: full Unicode lowercase. SQLite's built-in `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

// ── Rows ──

/// A normalized record ready to be appended. `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub cuisine: Option<String>,
    pub rating: Option<f64>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub description: Option<String>,
    pub serves: Option<String>,
    pub nutrients: Option<Map<String, Value>>,
    pub calories_kcal: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub cuisine: Option<String>,
    pub rating: Option<f64>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub description: Option<String>,
    pub serves: Option<String>,
    pub nutrients: Option<Map<String, Value>>,
    #[serde(skip)]
    pub calories_kcal: Option<i64>,
}

impl Recipe {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let nutrients: Option<String> = row.get(9)?;
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            cuisine: row.get(2)?,
            rating: row.get(3)?,
            prep_time: row.get(4)?,
            cook_time: row.get(5)?,
            total_time: row.get(6)?,
            description: row.get(7)?,
            serves: row.get(8)?,
            nutrients: nutrients.and_then(|s| serde_json::from_str(&s).ok()),
            calories_kcal: row.get(10)?,
        })
    }
}

// ── Writes ──

/// Append all rows in a single transaction; either every row lands or none do.
pub fn insert_batch(conn: &Connection, rows: &[NewRecipe]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO recipes
             (title, cuisine, rating, prep_time, cook_time, total_time,
              description, serves, nutrients, calories_kcal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for r in rows {
            let nutrients = r
                .nutrients
                .as_ref()
                .map(|n| Value::Object(n.clone()).to_string());
            count += stmt.execute(rusqlite::params![
                r.title, r.cuisine, r.rating, r.prep_time, r.cook_time, r.total_time,
                r.description, r.serves, nutrients, r.calories_kcal,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM recipes", [])
}

// ── Reads ──

pub fn count(conn: &Connection, predicate: &Predicate) -> rusqlite::Result<usize> {
    let (where_clause, params) = predicate.to_sql();
    let sql = format!("SELECT COUNT(*) FROM recipes{}", where_clause);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    conn.query_row(&sql, param_refs.as_slice(), |r| r.get(0))
}

/// One window of matching records in catalog order.
pub fn fetch_page(
    conn: &Connection,
    predicate: &Predicate,
    offset: usize,
    limit: usize,
) -> rusqlite::Result<Vec<Recipe>> {
    let (where_clause, mut params) = predicate.to_sql();
    let sql = format!(
        "SELECT {} FROM recipes{} ORDER BY {} LIMIT ?{} OFFSET ?{}",
        RECIPE_COLUMNS,
        where_clause,
        CATALOG_ORDER,
        params.len() + 1,
        params.len() + 2
    );
    params.push(Box::new(limit));
    params.push(Box::new(offset));

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), Recipe::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
