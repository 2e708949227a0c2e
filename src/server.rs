//! HTTP surface: bearer-gated batch endpoint plus liveness routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{BatchError, Service};

/// Route answering a batch of questions.
pub const RUN_ROUTE: &str = "/hackrx/run";

#[derive(Clone)]
struct AppState {
    service: Service,
    bearer_token: Arc<str>,
}

/// Batch request body.
#[derive(Debug, Deserialize, Serialize)]
pub struct QueryRequest {
    /// Remote document reference; accepted for compatibility and ignored.
    #[serde(default)]
    pub documents: Option<String>,
    pub questions: Vec<String>,
}

/// Batch response body, answers aligned with the request's questions.
#[derive(Debug, Deserialize, Serialize)]
pub struct QueryResponse {
    pub answers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

/// Builds the router around a published `Service`.
pub fn router(service: Service, bearer_token: impl Into<String>) -> Router {
    let state = AppState {
        service,
        bearer_token: Arc::from(bearer_token.into()),
    };
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route(
            RUN_ROUTE,
            post(run_submission)
                .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer)),
        )
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": format!("Policy QA API is running. POST questions to {RUN_ROUTE}.")
    }))
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "ready": state.service.is_ready() }))
}

/// Rejects unauthenticated requests before the body is read.
async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(request.headers(), &state.bearer_token)?;
    Ok(next.run(request).await)
}

async fn run_submission(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.documents.is_some() {
        info!("ignoring remote document reference; serving the startup index");
    }
    let answers = state
        .service
        .run_batch(&request.questions)
        .await
        .map_err(batch_error)?;
    Ok(Json(QueryResponse { answers }))
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(error(StatusCode::FORBIDDEN, "Not authenticated"));
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|raw| raw.strip_prefix("Bearer "))
        .map(str::trim);
    match token {
        Some(token) if token == expected => Ok(()),
        _ => {
            warn!("rejected request with invalid bearer token");
            Err(error(StatusCode::UNAUTHORIZED, "Invalid token"))
        }
    }
}

fn batch_error(err: BatchError) -> ApiError {
    let status = match err {
        BatchError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        BatchError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, err.to_string())
}

fn error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn bearer_token_must_match() {
        assert!(authorize(&headers("Bearer secret"), "secret").is_ok());
        let (status, _) = authorize(&headers("Bearer nope"), "secret").unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = authorize(&headers("secret"), "secret").unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn missing_header_is_forbidden() {
        let (status, _) = authorize(&HeaderMap::new(), "secret").unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn documents_field_is_optional() {
        let request: QueryRequest = serde_json::from_str(r#"{"questions":["a","b"]}"#).unwrap();
        assert!(request.documents.is_none());
        assert_eq!(request.questions.len(), 2);
    }
}
