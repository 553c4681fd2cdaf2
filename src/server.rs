use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db;
use crate::error::QueryError;
use crate::query::filter::Predicate;
use crate::query::{self, PageResult, Pagination, SearchParams};
use crate::settings::Settings;

#[derive(Clone)]
struct AppState {
    db_path: Arc<PathBuf>,
    default_limit: i64,
}

impl AppState {
    fn pagination(&self, page: Option<i64>, limit: Option<i64>) -> Result<Pagination, ApiError> {
        Ok(Pagination::new(
            page.unwrap_or(1),
            limit.unwrap_or(self.default_limit),
        )?)
    }

    /// Run a store operation on a fresh connection off the async runtime.
    async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, QueryError> + Send + 'static,
    {
        let path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || {
            let conn = db::connect(&path).map_err(ApiError::Internal)?;
            f(&conn).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
    }
}

#[derive(Debug)]
enum ApiError {
    Invalid(QueryError),
    Internal(anyhow::Error),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Store(e) => ApiError::Internal(e.into()),
            other => ApiError::Invalid(other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Invalid(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    title: Option<String>,
    cuisine: Option<String>,
    total_time: Option<String>,
    rating: Option<String>,
    calories: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: String,
    total_recipes: usize,
}

pub fn router(settings: &Settings) -> Router {
    let state = AppState {
        db_path: Arc::new(settings.database_path.clone()),
        default_limit: settings.default_limit,
    };
    Router::new()
        .route("/api/health", get(health))
        .route("/api/recipes", get(list_recipes))
        .route("/api/recipes/search", get(search_recipes))
        .with_state(state)
}

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    info!("HTTP server listening on {}", settings.bind);
    axum::serve(listener, router(&settings)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let counted = state
        .with_store(|conn| Ok(db::count(conn, &Predicate::all())?))
        .await;
    let body = match counted {
        Ok(total_recipes) => HealthResponse {
            status: "ok",
            database: "connected".into(),
            total_recipes,
        },
        Err(e) => HealthResponse {
            status: "error",
            database: format!("error: {}", describe(&e)),
            total_recipes: 0,
        },
    };
    Json(body)
}

async fn list_recipes(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<PageResult>, ApiError> {
    let pagination = state.pagination(q.page, q.limit)?;
    let result = state
        .with_store(move |conn| query::list(conn, pagination))
        .await?;
    Ok(Json(result))
}

async fn search_recipes(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<PageResult>, ApiError> {
    let pagination = state.pagination(q.page, q.limit)?;
    // raw strings go to the core untouched; it owns parsing
    let params = SearchParams {
        title: q.title,
        cuisine: q.cuisine,
        total_time: q.total_time,
        rating: q.rating,
        calories: q.calories,
    };
    let result = state
        .with_store(move |conn| query::search(conn, &params, pagination))
        .await?;
    Ok(Json(result))
}

fn describe(e: &ApiError) -> String {
    match e {
        ApiError::Invalid(e) => e.to_string(),
        ApiError::Internal(e) => format!("{:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;
    use indicatif::ProgressBar;
    use serde_json::json;

    fn state_with(dir: &tempfile::TempDir) -> AppState {
        let path = dir.path().join("recipes.sqlite");
        let conn = db::connect(&path).unwrap();
        ingest::ingest(
            &conn,
            json!([
                {"title": "Pie", "rating": 4.8, "total_time": 45, "nutrients": {"calories": "350 kcal"}},
                {"title": "Soup", "total_time": 20}
            ]),
            &ProgressBar::hidden(),
        )
        .unwrap();
        AppState {
            db_path: Arc::new(path),
            default_limit: 10,
        }
    }

    #[tokio::test]
    async fn health_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let Json(body) = health(State(state_with(&dir))).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.total_recipes, 2);
    }

    #[tokio::test]
    async fn list_uses_default_limit() {
        let dir = tempfile::tempdir().unwrap();
        let Json(res) = list_recipes(State(state_with(&dir)), Query(ListQuery::default()))
            .await
            .unwrap();
        assert_eq!(res.page, 1);
        assert_eq!(res.limit, 10);
        assert_eq!(res.total, 2);
        assert_eq!(res.total_pages, 1);

        let body = serde_json::to_value(&res).unwrap();
        assert_eq!(body["data"][0]["title"], "Pie");
        assert!(body["data"][0].get("calories_kcal").is_none());
    }

    #[tokio::test]
    async fn search_passes_raw_filters() {
        let dir = tempfile::tempdir().unwrap();
        let q = SearchQuery {
            calories: Some(">= 300".into()),
            ..Default::default()
        };
        let Json(res) = search_recipes(State(state_with(&dir)), Query(q)).await.unwrap();
        assert_eq!(res.total, 1);
        assert_eq!(res.data[0].title, "Pie");
    }

    #[tokio::test]
    async fn out_of_range_paging_is_422() {
        let dir = tempfile::tempdir().unwrap();
        let q = SearchQuery {
            limit: Some(101),
            ..Default::default()
        };
        let err = search_recipes(State(state_with(&dir)), Query(q))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let q = ListQuery {
            page: Some(0),
            limit: None,
        };
        let err = list_recipes(State(state_with(&dir)), Query(q)).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
