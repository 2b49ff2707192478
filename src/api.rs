//! HTTP surface for the valuation engine

use crate::valuation::{PropertyRequest, ResolveError, ValuationError, ValuationResult, Valuator};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub valuator: Arc<Valuator>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse {
    pub message: String,
    pub status: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/valuate-property", post(valuate_property))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Parcel valuation API is running!".to_string(),
        status: "ok".to_string(),
    })
}

async fn valuate_property(
    State(state): State<AppState>,
    Json(request): Json<PropertyRequest>,
) -> Result<Json<ValuationResult>, ApiError> {
    if request.apn.trim().is_empty()
        || request.county.trim().is_empty()
        || request.state.trim().is_empty()
    {
        return Err(ApiError::BadRequest(
            "apn, county and state are required".to_string(),
        ));
    }

    let result = state.valuator.valuate(&request).await?;
    Ok(Json(result))
}

/// Error returned from handlers, rendered as `ApiResponse` JSON
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Valuation(ValuationError),
}

impl From<ValuationError> for ApiError {
    fn from(e: ValuationError) -> Self {
        ApiError::Valuation(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Valuation(e) => match e {
                ValuationError::Resolve(ResolveError::NotFound(_))
                | ValuationError::Resolve(ResolveError::CoordinatesUnavailable(_)) => {
                    StatusCode::NOT_FOUND
                }
                ValuationError::InvalidTarget(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ValuationError::Resolve(ResolveError::Fetch(_))
                | ValuationError::Resolve(ResolveError::Decode(_)) => StatusCode::BAD_GATEWAY,
                ValuationError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Valuation(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!("Valuation failed: {}", message);
        } else {
            warn!("Valuation rejected: {}", message);
        }

        let body = ApiResponse {
            message,
            status: "error".to_string(),
        };
        (status, Json(body)).into_response()
    }
}
