use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{GatewayError, GatewayErrorKind, invalid_input};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PredictParams {
    pub f1: Option<String>,
    pub f2: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub prediction: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: state.service.banner(),
    })
}

pub async fn predict(
    State(state): State<AppState>,
    query: Result<Query<PredictParams>, QueryRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Query(params) = query.map_err(|rejection| invalid_input(rejection.body_text()))?;
    let result = state
        .service
        .handle_request(params.f1.as_deref(), params.f2.as_deref())?;
    Ok(Json(PredictResponse {
        prediction: result.label.as_i32(),
    }))
}

pub struct ApiError(GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            GatewayErrorKind::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayErrorKind::ExternalService
            | GatewayErrorKind::Timeout
            | GatewayErrorKind::Transport => {
                tracing::error!(
                    target: "api",
                    kind = self.0.kind.as_str(),
                    error = %self.0,
                    "request_failed"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "error": {
                "kind": self.0.kind.as_str(),
                "message": self.0.message,
            }
        });
        (status, Json(body)).into_response()
    }
}
