use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::booking,
    errors::ServiceError,
    handlers::{Actor, ActorRole},
    services::settlements::EligiblePayout,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReleasePhaseRequest {
    /// Payout phase: 1 (live), 2 (midpoint) or 3 (end).
    pub phase: u8,
    /// External payout reference; recorded once, on the first release.
    pub payout_ref: Option<String>,
}

/// Releases one payout phase for a booking. Admins only; phases are strictly
/// ordered and re-releasing a phase is a no-op.
#[utoipa::path(
    post,
    path = "/api/v1/settlements/:booking_id/release",
    params(("booking_id" = Uuid, Path, description = "Booking id")),
    request_body = ReleasePhaseRequest,
    responses(
        (status = 200, description = "Phase released (or already released)"),
        (status = 400, description = "Out of order or conditions unmet")
    )
)]
pub async fn release_phase(
    State(state): State<AppState>,
    actor: Actor,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<ReleasePhaseRequest>,
) -> ApiResult<booking::Model> {
    if !actor.is_admin() {
        return Err(ServiceError::Forbidden(
            "payout release is an admin operation".into(),
        ));
    }
    let updated = state
        .services
        .settlements
        .release_phase(booking_id, payload.phase, payload.payout_ref)
        .await?;
    Ok(axum::Json(ApiResponse::success(updated)))
}

/// Eligible-payout view: admins see every vendor, vendors see their own.
#[utoipa::path(
    get,
    path = "/api/v1/settlements/eligible",
    responses((status = 200, description = "Releasable phases per booking"))
)]
pub async fn eligible_payouts(
    State(state): State<AppState>,
    actor: Actor,
) -> ApiResult<Vec<EligiblePayout>> {
    let vendor_filter = match actor.role {
        ActorRole::Admin => None,
        ActorRole::Vendor => Some(actor.id),
        ActorRole::Buyer => {
            return Err(ServiceError::Forbidden(
                "payout views are for vendors and admins".into(),
            ))
        }
    };
    let rows = state
        .services
        .settlements
        .eligible_payouts(vendor_filter)
        .await?;
    Ok(axum::Json(ApiResponse::success(rows)))
}

pub fn settlement_routes() -> Router<AppState> {
    Router::new()
        .route("/eligible", get(eligible_payouts))
        .route("/:booking_id/release", post(release_phase))
}
