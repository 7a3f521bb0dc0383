use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, patch, post},
    Json, Router,
};

use serde_json::Value;

use crate::controllers::reservation_controller::{RequestContext, ReservationController};
use crate::dto::reservation_dto::{
    AssignDriverRequest, CreateReservationRequest, PhoneQuery, RecordPaymentRequest,
    ReservationResponse, StatsQuery, StatsResponse, UpdateStatusRequest,
};
use crate::dto::ApiResponse;
use crate::models::reservation::Rating;
use crate::routes::extractors::AppJson;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_reservation_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation).get(list_by_phone))
        .route("/active", get(list_active))
        .route("/stats", get(reservation_stats))
        .route("/driver/:driver_id", get(list_by_driver))
        .route("/:id", get(get_reservation))
        .route("/:id/status", patch(update_status))
        .route("/:id/driver", post(assign_driver))
        .route("/:id/payment", post(record_payment))
        .route("/:id/rating", post(submit_rating))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Datos del cliente: la IP sale del primer salto de `x-forwarded-for`
pub(crate) fn request_context(headers: &HeaderMap) -> RequestContext {
    let ip_address = header_value(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_value(headers, "x-real-ip"));

    RequestContext {
        ip_address,
        user_agent: header_value(headers, header::USER_AGENT.as_str()),
        referrer: header_value(headers, header::REFERER.as_str()),
    }
}

async fn create_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(body): AppJson<Value>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let request = CreateReservationRequest::from_json(body)?;
    let controller = ReservationController::new(state.service.clone());
    let response = controller.create(request, request_context(&headers)).await?;
    Ok(Json(response))
}

async fn list_by_phone(
    State(state): State<AppState>,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<ApiResponse<Vec<ReservationResponse>>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller.list_by_phone(query).await?;
    Ok(Json(response))
}

async fn list_active(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ReservationResponse>>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller.list_active().await?;
    Ok(Json(response))
}

async fn reservation_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<StatsResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller.stats(query).await?;
    Ok(Json(response))
}

async fn list_by_driver(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<ReservationResponse>>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller.list_by_driver(&driver_id).await?;
    Ok(Json(response))
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller.get_by_id(&id).await?;
    Ok(Json(response))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller
        .update_status(&id, request, request_context(&headers))
        .await?;
    Ok(Json(response))
}

async fn assign_driver(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    AppJson(request): AppJson<AssignDriverRequest>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller
        .assign_driver(&id, request, request_context(&headers))
        .await?;
    Ok(Json(response))
}

async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    AppJson(request): AppJson<RecordPaymentRequest>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller
        .record_payment(&id, request, request_context(&headers))
        .await?;
    Ok(Json(response))
}

async fn submit_rating(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    AppJson(rating): AppJson<Rating>,
) -> Result<Json<ApiResponse<ReservationResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller
        .submit_rating(&id, rating, request_context(&headers))
        .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_context_uses_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://taxi.example.fr/"));

        let context = request_context(&headers);

        assert_eq!(context.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(context.referrer.as_deref(), Some("https://taxi.example.fr/"));
    }

    #[test]
    fn test_request_context_without_headers() {
        let context = request_context(&HeaderMap::new());
        assert!(context.ip_address.is_none());
        assert!(context.user_agent.is_none());
    }
}
