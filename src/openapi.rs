//! OpenAPI document assembly and the JSON endpoint serving it.

use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::{handlers, AppState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "adspace-api",
        description = "Booking, payment verification and settlement engine for outdoor-advertising inventory"
    ),
    paths(
        handlers::pricing::quote,
        handlers::payments::create_order,
        handlers::payments::confirm_payment,
        handlers::bookings::create_booking,
        handlers::bookings::get_booking,
        handlers::bookings::get_by_order_id,
        handlers::bookings::confirm_booking,
        handlers::bookings::cancel_booking,
        handlers::bookings::mark_milestone,
        handlers::bookings::attach_file,
        handlers::cart::view_cart,
        handlers::cart::add_item,
        handlers::cart::remove_item,
        handlers::sites::create_site,
        handlers::sites::get_site,
        handlers::sites::booked_dates,
        handlers::sites::reconcile,
        handlers::settlements::release_phase,
        handlers::settlements::eligible_payouts,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::pricing::ChargeInputs,
        crate::services::pricing::PriceQuote,
        crate::services::payments::CreateOrderRequest,
        crate::services::payments::CreateOrderResponse,
        crate::services::payments::ConfirmPaymentRequest,
        crate::services::bookings::CreateBookingRequest,
        crate::services::bookings::AttachFileRequest,
        crate::services::cart::AddCartItemRequest,
        crate::services::cart::CartItemView,
        crate::services::sites::CreateSiteRequest,
        handlers::pricing::QuoteRequest,
        handlers::bookings::MilestoneRequest,
        handlers::sites::SetStatusRequest,
        handlers::sites::BookedDateRange,
        handlers::settlements::ReleasePhaseRequest,
    )),
    tags(
        (name = "adspace-api", description = "Marketplace booking backend")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn openapi_routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_core_operations() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.iter().any(|p| p.contains("/orders/confirm")));
        assert!(paths.iter().any(|p| p.contains("/pricing/quote")));
        assert!(paths.iter().any(|p| p.contains("/settlements")));
    }
}
