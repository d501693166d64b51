use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

use crate::{
    entities::booking,
    handlers::Actor,
    services::payments::{ConfirmPaymentRequest, CreateOrderRequest, CreateOrderResponse},
    ApiResponse, ApiResult, AppState,
};

/// Opens a payment-gateway order for a site and date range. The amount is
/// quoted server-side from the stored monthly rate.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Gateway order opened"),
        (status = 404, description = "Site not found"),
        (status = 502, description = "Gateway unreachable")
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<CreateOrderResponse> {
    let response = state.services.payments.create_order(payload, actor.id).await?;
    Ok(axum::Json(ApiResponse::success(response)))
}

/// Verifies a completed checkout callback and confirms the booking.
/// Duplicate callbacks for the same gateway order return the booking that
/// was already confirmed.
#[utoipa::path(
    post,
    path = "/api/v1/orders/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Booking confirmed"),
        (status = 400, description = "Signature or amount check failed")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> ApiResult<booking::Model> {
    let confirmed = state
        .services
        .payments
        .confirm_after_payment(payload, actor.id)
        .await?;
    Ok(axum::Json(ApiResponse::success(confirmed)))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/confirm", post(confirm_payment))
}
