use axum::{extract::Json, routing::post, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    services::pricing::{self, ChargeInputs, PriceQuote},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    pub base_monthly_rate: Decimal,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    #[serde(default)]
    pub printing_charge: Decimal,
    #[serde(default)]
    pub mounting_charge: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub months: u32,
    #[serde(flatten)]
    pub quote: PriceQuote,
    pub total_minor_units: i64,
}

/// Computes a non-binding price quote for a campaign. The same arithmetic
/// runs again server-side when an order is opened and when its payment is
/// verified.
#[utoipa::path(
    post,
    path = "/api/v1/pricing/quote",
    request_body = QuoteRequest,
    responses((status = 200, description = "Price breakdown"))
)]
pub async fn quote(Json(payload): Json<QuoteRequest>) -> ApiResult<QuoteResponse> {
    payload.validate()?;
    let months = pricing::billing_months(payload.start_date, payload.end_date)?;
    let quote = pricing::quote(&ChargeInputs {
        base_monthly_rate: payload.base_monthly_rate,
        months,
        printing_charge: payload.printing_charge,
        mounting_charge: payload.mounting_charge,
        discount: payload.discount,
    })?;
    let total_minor_units = quote.total_minor_units()?;
    Ok(axum::Json(ApiResponse::success(QuoteResponse {
        months,
        quote,
        total_minor_units,
    })))
}

pub fn pricing_routes() -> Router<AppState> {
    Router::new().route("/quote", post(quote))
}
