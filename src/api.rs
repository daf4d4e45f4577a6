use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::comparison::{self, ComparisonOutcome, TrendReport};
use crate::config::{AppConfig, ANALYSIS_FILE, COMPARISON_CSV};
use crate::dashboard::{self, ReviewCard};
use crate::models::AnnotatedReview;
use crate::store;

pub struct AppState {
    pub config: AppConfig,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewQuery {
    /// Case-insensitive keyword matched against review, food and staff text
    #[param(example = "delicious")]
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompareRequest {
    #[schema(example = "https://www.opentable.com/r/competitor-bistro-seattle")]
    pub competitor_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failure shown to the dashboard user instead of crashing the page.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/api/reviews",
    params(ReviewQuery),
    responses(
        (status = 200, description = "Analyzed reviews matching the keyword", body = [ReviewCard]),
        (status = 500, description = "Analysis data could not be loaded", body = ErrorResponse)
    ),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Vec<ReviewCard>>, ApiError> {
    let path = state.config.data_path(ANALYSIS_FILE);
    let reviews: Vec<AnnotatedReview> = store::read_json(&path).map_err(|e| {
        error!("❌ Error loading analysis data: {:#}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Error loading analysis data: {:#}", e))
    })?;

    let keyword = query.keyword.unwrap_or_default();
    Ok(Json(dashboard::review_cards(&reviews, &keyword)))
}

#[utoipa::path(
    post,
    path = "/api/compare",
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Comparison attempted; see success flag", body = ComparisonOutcome),
        (status = 400, description = "Missing competitor URL", body = ErrorResponse),
        (status = 502, description = "Browser session could not be started", body = ErrorResponse)
    ),
    tag = "comparison"
)]
pub async fn compare(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<ComparisonOutcome>, ApiError> {
    let url = req.competitor_url.trim();
    if url.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Enter the competitor's listing URL"));
    }

    comparison::run_comparison(&state.config, url)
        .await
        .map(Json)
        .map_err(|e| {
            error!("❌ Comparison failed: {:#}", e);
            ApiError::new(StatusCode::BAD_GATEWAY, format!("Error scraping competitor: {:#}", e))
        })
}

#[utoipa::path(
    get,
    path = "/api/trends",
    responses(
        (status = 200, description = "Rating series per category and restaurant", body = TrendReport),
        (status = 500, description = "Comparison data could not be loaded", body = ErrorResponse)
    ),
    tag = "comparison"
)]
pub async fn trends(State(state): State<Arc<AppState>>) -> Result<Json<TrendReport>, ApiError> {
    let path = state.config.data_path(COMPARISON_CSV);
    let records = store::read_comparison_csv(&path).map_err(|e| {
        error!("❌ Error visualizing data: {:#}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Error visualizing data: {:#}", e))
    })?;

    Ok(Json(comparison::trend_report(&records)))
}
