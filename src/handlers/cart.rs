use axum::{
    extract::{Json, Path, State},
    http::HeaderMap,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    entities::cart_item,
    errors::ServiceError,
    handlers::{conditional_json, Actor},
    services::cart::AddCartItemRequest,
    services::freshness::FreshnessScope,
    ApiResponse, ApiResult, AppState,
};

/// The caller's cart with per-site quoted totals, conditional on
/// `If-Modified-Since`.
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart contents"),
        (status = 304, description = "Unchanged since the client's stamp")
    )
)]
pub async fn view_cart(
    State(state): State<AppState>,
    actor: Actor,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let cart = &state.services.cart;
    conditional_json(
        &state.services.freshness,
        FreshnessScope::BuyerCart(actor.id),
        &headers,
        cart.list_items(actor.id),
    )
    .await
}

/// Adds a site to the caller's cart. One row per site; a repeat add
/// conflicts.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 200, description = "Item added with its quoted total"),
        (status = 409, description = "Site already in the cart")
    )
)]
pub async fn add_item(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<AddCartItemRequest>,
) -> ApiResult<cart_item::Model> {
    let saved = state.services.cart.add_item(payload, actor.id).await?;
    Ok(axum::Json(ApiResponse::success(saved)))
}

/// Removes a site from the caller's cart.
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/:site_id",
    params(("site_id" = Uuid, Path, description = "Site id")),
    responses(
        (status = 200, description = "Item removed"),
        (status = 404, description = "Site not in the cart")
    )
)]
pub async fn remove_item(
    State(state): State<AppState>,
    actor: Actor,
    Path(site_id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.cart.remove_item(actor.id, site_id).await?;
    Ok(axum::Json(ApiResponse::success(json!({ "removed": true }))))
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(view_cart))
        .route("/items", post(add_item))
        .route("/items/:site_id", delete(remove_item))
}
