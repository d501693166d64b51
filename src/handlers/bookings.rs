use axum::{
    extract::{Json, Path, Query, State},
    http::HeaderMap,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::booking,
    entities::booking_file::FileCategory,
    errors::ServiceError,
    handlers::{conditional_json, Actor},
    services::bookings::{progress_label, AttachFileRequest, CreateBookingRequest},
    services::freshness::FreshnessScope,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct MilestoneRequest {
    /// Fulfillment stage name, e.g. `MEDIA_DOWNLOADED` or `SITE_LIVE`.
    pub stage: String,
}

#[derive(Debug, Deserialize)]
pub struct FileListQuery {
    pub category: Option<String>,
}

/// Creates a PENDING booking for the cash/offline flow.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingRequest,
    responses((status = 200, description = "Pending booking created"))
)]
pub async fn create_booking(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateBookingRequest>,
) -> ApiResult<booking::Model> {
    let saved = state.services.bookings.create_booking(payload, actor.id).await?;
    Ok(axum::Json(ApiResponse::success(saved)))
}

/// Booking detail, conditional on `If-Modified-Since`.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/:id",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking detail"),
        (status = 304, description = "Unchanged since the client's stamp")
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let booking = state.services.bookings.get_booking(id).await?;
    if !actor.can_act_for(booking.buyer_id) && !actor.can_act_for(booking.vendor_id) {
        return Err(ServiceError::Forbidden(
            "booking belongs to another user".into(),
        ));
    }
    conditional_json(
        &state.services.freshness,
        FreshnessScope::Booking(id),
        &headers,
        async move { Ok(booking) },
    )
    .await
}

/// Booking detail looked up by gateway order id; vendors only.
#[utoipa::path(
    get,
    path = "/api/v1/bookings/by-order/:order_id",
    params(("order_id" = String, Path, description = "Gateway order id")),
    responses((status = 200, description = "Booking detail"))
)]
pub async fn get_by_order_id(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<String>,
) -> ApiResult<booking::Model> {
    let booking = state
        .services
        .bookings
        .get_by_order_id(&order_id, actor.id)
        .await?;
    Ok(axum::Json(ApiResponse::success(booking)))
}

/// Confirms a PENDING (cash) booking. Vendor of the booking or admin.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/:id/confirm",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses((status = 200, description = "Booking confirmed"))
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    let existing = state.services.bookings.get_booking(id).await?;
    if !actor.can_act_for(existing.vendor_id) {
        return Err(ServiceError::Forbidden(
            "only the site vendor may confirm a cash booking".into(),
        ));
    }
    let confirmed = state.services.bookings.confirm_booking(id).await?;
    Ok(axum::Json(ApiResponse::success(confirmed)))
}

/// Cancels a booking within the cancellation window.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/:id/cancel",
    params(("id" = Uuid, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled"),
        (status = 400, description = "Window expired or already cancelled")
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<booking::Model> {
    let cancelled = state.services.bookings.cancel_booking(id, actor.id).await?;
    Ok(axum::Json(ApiResponse::success(cancelled)))
}

/// Marks a fulfillment stage. Vendor of the booking only; stages are ordered.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/:id/milestones",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = MilestoneRequest,
    responses((status = 200, description = "Stage recorded"))
)]
pub async fn mark_milestone(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<MilestoneRequest>,
) -> ApiResult<serde_json::Value> {
    let updated = state
        .services
        .bookings
        .mark_milestone(id, &payload.stage, actor.id)
        .await?;
    let progress = progress_label(&updated);
    Ok(axum::Json(ApiResponse::success(
        json!({ "booking": updated, "progress": progress }),
    )))
}

/// Attaches a file URL (creative or execution proof); capped per category.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/:id/files",
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = AttachFileRequest,
    responses((status = 200, description = "File attached"))
)]
pub async fn attach_file(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<AttachFileRequest>,
) -> ApiResult<crate::entities::booking_file::Model> {
    let saved = state
        .services
        .bookings
        .attach_file(id, payload, actor.id)
        .await?;
    Ok(axum::Json(ApiResponse::success(saved)))
}

async fn list_files(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<FileListQuery>,
) -> ApiResult<Vec<crate::entities::booking_file::Model>> {
    let booking = state.services.bookings.get_booking(id).await?;
    if !actor.can_act_for(booking.buyer_id) && !actor.can_act_for(booking.vendor_id) {
        return Err(ServiceError::Forbidden(
            "booking belongs to another user".into(),
        ));
    }
    let category = match query.category.as_deref() {
        Some(raw) => Some(FileCategory::from_str(raw).map_err(|_| {
            ServiceError::ValidationError(format!("unknown file category {}", raw))
        })?),
        None => None,
    };
    let files = state.services.bookings.list_files(id, category).await?;
    Ok(axum::Json(ApiResponse::success(files)))
}

async fn delete_file(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .bookings
        .delete_file(id, file_id, actor.id)
        .await?;
    Ok(axum::Json(ApiResponse::success(json!({ "deleted": true }))))
}

/// The caller's live bookings (CONFIRMED + PENDING), conditional read.
async fn list_my_active(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let bookings = &state.services.bookings;
    conditional_json(
        &state.services.freshness,
        FreshnessScope::BuyerBookings(actor.id),
        &headers,
        bookings.list_buyer_active(actor.id),
    )
    .await
}

/// The caller's cancelled bookings, conditional read.
async fn list_my_cancelled(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let bookings = &state.services.bookings;
    conditional_json(
        &state.services.freshness,
        FreshnessScope::BuyerBookings(actor.id),
        &headers,
        bookings.list_buyer_cancelled(actor.id),
    )
    .await
}

/// The vendor's confirmed-but-not-live bookings with progress labels,
/// conditional read.
async fn list_vendor_in_progress(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let bookings = &state.services.bookings;
    conditional_json(
        &state.services.freshness,
        FreshnessScope::VendorBookings(actor.id),
        &headers,
        bookings.list_vendor_in_progress(actor.id),
    )
    .await
}

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking))
        .route("/mine/active", get(list_my_active))
        .route("/mine/cancelled", get(list_my_cancelled))
        .route("/vendor/in-progress", get(list_vendor_in_progress))
        .route("/by-order/:order_id", get(get_by_order_id))
        .route("/:id", get(get_booking))
        .route("/:id/confirm", post(confirm_booking))
        .route("/:id/cancel", post(cancel_booking))
        .route("/:id/milestones", post(mark_milestone))
        .route("/:id/files", get(list_files).post(attach_file))
        .route("/:id/files/:file_id", delete(delete_file))
}
