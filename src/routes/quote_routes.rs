use axum::{extract::State, routing::post, Json, Router};

use crate::controllers::reservation_controller::ReservationController;
use crate::dto::reservation_dto::{QuoteRequest, QuoteResponse};
use crate::dto::ApiResponse;
use crate::routes::extractors::AppJson;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_quote_router() -> Router<AppState> {
    Router::new().route("/", post(quote))
}

async fn quote(
    State(state): State<AppState>,
    AppJson(request): AppJson<QuoteRequest>,
) -> Result<Json<ApiResponse<QuoteResponse>>, AppError> {
    let controller = ReservationController::new(state.service.clone());
    let response = controller.quote(request)?;
    Ok(Json(response))
}
