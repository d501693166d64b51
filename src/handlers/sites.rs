use axum::{
    extract::{Json, Path, State},
    http::HeaderMap,
    response::Response,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::site,
    errors::ServiceError,
    handlers::{conditional_json, Actor, ActorRole},
    services::freshness::FreshnessScope,
    services::reconciliation::ReconciliationReport,
    services::sites::CreateSiteRequest,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStatusRequest {
    /// Target status, e.g. `AVAILABLE` or `NON_ACTIVE`.
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookedDateRange {
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
}

/// Creates a new site for the calling vendor.
#[utoipa::path(
    post,
    path = "/api/v1/sites",
    request_body = CreateSiteRequest,
    responses((status = 200, description = "Site created"))
)]
pub async fn create_site(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<CreateSiteRequest>,
) -> ApiResult<site::Model> {
    if actor.role == ActorRole::Buyer {
        return Err(ServiceError::Forbidden("vendors only".into()));
    }
    let saved = state.services.sites.create_site(payload, actor.id).await?;
    Ok(axum::Json(ApiResponse::success(saved)))
}

/// Browsable inventory (everything not delisted).
async fn list_sites(State(state): State<AppState>) -> ApiResult<Vec<site::Model>> {
    let sites = state.services.sites.list_browsable().await?;
    Ok(axum::Json(ApiResponse::success(sites)))
}

/// The calling vendor's sites, conditional read.
async fn list_my_sites(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let sites = &state.services.sites;
    conditional_json(
        &state.services.freshness,
        FreshnessScope::VendorSites(actor.id),
        &headers,
        sites.list_vendor_sites(actor.id),
    )
    .await
}

/// Site detail, conditional on `If-Modified-Since`.
#[utoipa::path(
    get,
    path = "/api/v1/sites/:id",
    params(("id" = Uuid, Path, description = "Site id")),
    responses(
        (status = 200, description = "Site detail"),
        (status = 304, description = "Unchanged since the client's stamp")
    )
)]
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let sites = &state.services.sites;
    conditional_json(
        &state.services.freshness,
        FreshnessScope::Site(id),
        &headers,
        sites.get_site(id),
    )
    .await
}

/// Occupied date ranges for a site's booking calendar.
#[utoipa::path(
    get,
    path = "/api/v1/sites/:id/booked-dates",
    params(("id" = Uuid, Path, description = "Site id")),
    responses((status = 200, description = "Occupied date ranges"))
)]
pub async fn booked_dates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<BookedDateRange>> {
    // 404 for unknown sites rather than an empty list
    state.services.sites.get_site(id).await?;
    let ranges = state
        .services
        .bookings
        .booked_dates(id)
        .await?
        .into_iter()
        .map(|(start_date, end_date)| BookedDateRange {
            start_date,
            end_date,
        })
        .collect();
    Ok(axum::Json(ApiResponse::success(ranges)))
}

/// Owner-only status change (relist, delist).
async fn set_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<site::Model> {
    let updated = state
        .services
        .sites
        .set_status(id, &payload.status, actor.id)
        .await?;
    Ok(axum::Json(ApiResponse::success(updated)))
}

/// Triggers one inventory reconciliation sweep. Admins only; the sweep is
/// idempotent, so repeated triggers are safe.
#[utoipa::path(
    post,
    path = "/api/v1/sites/reconcile",
    responses((status = 200, description = "Sweep report"))
)]
pub async fn reconcile(State(state): State<AppState>, actor: Actor) -> ApiResult<ReconciliationReport> {
    if !actor.is_admin() {
        return Err(ServiceError::Forbidden(
            "reconciliation is an admin operation".into(),
        ));
    }
    let report = state.services.reconciliation.run_once().await?;
    Ok(axum::Json(ApiResponse::success(report)))
}

pub fn site_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sites).post(create_site))
        .route("/mine", get(list_my_sites))
        .route("/reconcile", post(reconcile))
        .route("/:id", get(get_site))
        .route("/:id/status", put(set_status))
        .route("/:id/booked-dates", get(booked_dates))
}
