//! Payment order creation and verification.
//!
//! The pay-then-verify flow: `create_order` opens a gateway order for a
//! quoted amount; after the buyer completes checkout the client posts the
//! gateway callback to `confirm_after_payment`, which re-derives the price,
//! checks the callback signature and creates exactly one CONFIRMED booking.
//! Money-moving paths fail closed: any ambiguity means no booking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::GatewayConfig,
    db::DbPool,
    entities::booking::{self, ActiveModel as BookingActiveModel, BookingStatus, Entity as BookingEntity},
    entities::site::{self, Entity as SiteEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::bookings,
    services::pricing::{self, ChargeInputs, MINOR_UNITS_PER_UNIT},
};

type HmacSha256 = Hmac<Sha256>;

/// External payment gateway seam. Production uses the Razorpay REST API;
/// tests substitute a scripted implementation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a gateway order for the given minor-unit amount and returns the
    /// gateway's order id.
    async fn open_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: &HashMap<String, String>,
    ) -> Result<String, ServiceError>;

    /// Public key id handed to the frontend checkout.
    fn key_id(&self) -> &str;
}

/// Razorpay-compatible gateway client with a bounded request timeout.
pub struct RazorpayGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client init failed: {}", e)))?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            key_id: cfg.key_id.clone(),
            key_secret: cfg.key_secret.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GatewayOrder {
    id: String,
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn open_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
        notes: &HashMap<String, String>,
    ) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt,
            "payment_capture": 1,
            "notes": notes,
        });

        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gateway order request failed");
                ServiceError::GatewayUnavailable(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "Gateway rejected order request");
            return Err(ServiceError::GatewayUnavailable(format!(
                "gateway returned {}",
                status
            )));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(e.to_string()))?;

        info!(order_id = %order.id, amount_minor, "Gateway order created");
        Ok(order.id)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Signature the gateway attaches to a completed checkout:
/// `HMAC-SHA256(secret, order_id + "|" + payment_id)`, hex-encoded.
pub fn expected_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison against the expected callback signature.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, supplied: &str) -> bool {
    constant_time_eq(&expected_signature(secret, order_id, payment_id), supplied)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub site_id: Uuid,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub key_id: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, message = "gateway order id is required"))]
    pub gateway_order_id: String,
    #[validate(length(min = 1, message = "gateway payment id is required"))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
    pub site_id: Uuid,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,
    /// Total the buyer was charged, as reported by the checkout client.
    pub claimed_total: Decimal,
}

/// Orchestrates order creation and payment verification with idempotent
/// booking creation.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    signing_secret: String,
    currency: String,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        signing_secret: String,
        currency: String,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            gateway,
            signing_secret,
            currency,
            event_sender,
        }
    }

    async fn load_site(&self, site_id: Uuid) -> Result<site::Model, ServiceError> {
        SiteEntity::find_by_id(site_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Site {} not found", site_id)))
    }

    fn charge_inputs(
        site: &site::Model,
        request_start: chrono::NaiveDate,
        request_end: chrono::NaiveDate,
        printing: Decimal,
        mounting: Decimal,
        discount: Decimal,
    ) -> Result<ChargeInputs, ServiceError> {
        let months = pricing::billing_months(request_start, request_end)?;
        Ok(ChargeInputs {
            base_monthly_rate: site.price_per_month,
            months,
            printing_charge: printing,
            mounting_charge: mounting,
            discount,
        })
    }

    /// Opens a gateway order for the quoted amount.
    #[instrument(skip(self, request), fields(site_id = %request.site_id, buyer_id = %buyer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        buyer_id: Uuid,
    ) -> Result<CreateOrderResponse, ServiceError> {
        request.validate()?;
        let site = self.load_site(request.site_id).await?;

        let charges = Self::charge_inputs(
            &site,
            request.start_date,
            request.end_date,
            request.printing_charge,
            request.mounting_charge,
            request.discount,
        )?;
        let quote = pricing::quote(&charges)?;
        let amount_minor = quote.total_minor_units()?;

        if amount_minor < MINOR_UNITS_PER_UNIT {
            return Err(ServiceError::ValidationError(
                "total must be at least one currency unit".into(),
            ));
        }

        let mut notes = HashMap::new();
        notes.insert("site_id".to_string(), site.id.to_string());
        notes.insert("buyer_id".to_string(), buyer_id.to_string());

        let receipt = format!("booking_user_{}", buyer_id);
        let order_id = self
            .gateway
            .open_order(amount_minor, &self.currency, &receipt, &notes)
            .await?;

        info!(order_id = %order_id, amount_minor, "Payment order created");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::OrderOpened {
                    order_id: order_id.clone(),
                    site_id: site.id,
                    buyer_id,
                    amount_minor,
                })
                .await
            {
                warn!(error = %e, "Failed to send order opened event");
            }
        }

        Ok(CreateOrderResponse {
            order_id,
            amount_minor,
            currency: self.currency.clone(),
            key_id: self.gateway.key_id().to_string(),
        })
    }

    /// Verifies a completed payment and creates exactly one CONFIRMED
    /// booking for it.
    ///
    /// The unique constraint on `bookings.order_id` is the concurrency
    /// mechanism: a duplicate or concurrent callback loses the insert race,
    /// is detected as a uniqueness violation and answered with the already
    /// confirmed booking, matching the gateway's retry semantics.
    #[instrument(skip(self, request), fields(order_id = %request.gateway_order_id, buyer_id = %buyer_id))]
    pub async fn confirm_after_payment(
        &self,
        request: ConfirmPaymentRequest,
        buyer_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        request.validate()?;
        let site = self.load_site(request.site_id).await?;

        // Re-derive the price from the raw callback inputs and the stored
        // site rate. Quote-time and verify-time totals are compared on
        // integral minor units.
        let charges = Self::charge_inputs(
            &site,
            request.start_date,
            request.end_date,
            request.printing_charge,
            request.mounting_charge,
            request.discount,
        )?;
        let quote = pricing::quote(&charges)?;

        let expected_minor = quote.total_minor_units()?;
        let claimed_minor = pricing::to_minor_units(request.claimed_total)?;
        if expected_minor != claimed_minor {
            warn!(
                order_id = %request.gateway_order_id,
                expected_minor,
                claimed_minor,
                "Claimed total does not match recomputed total; possible tampering"
            );
            return Err(ServiceError::PriceMismatch);
        }

        if !verify_signature(
            &self.signing_secret,
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.signature,
        ) {
            warn!(
                order_id = %request.gateway_order_id,
                payment_id = %request.gateway_payment_id,
                "Invalid payment signature"
            );
            return Err(ServiceError::SignatureInvalid);
        }

        let now = Utc::now();
        let today = now.date_naive();
        let booking_id = Uuid::new_v4();

        let model = BookingActiveModel {
            id: Set(booking_id),
            site_id: Set(site.id),
            buyer_id: Set(buyer_id),
            vendor_id: Set(site.owner_id),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            order_id: Set(Some(request.gateway_order_id.clone())),
            transaction_id: Set(Some(request.gateway_payment_id.clone())),
            status: Set(BookingStatus::Confirmed.as_str().to_string()),
            base_amount: Set(charges.base_monthly_rate * Decimal::from(charges.months)),
            printing_charge: Set(charges.printing_charge),
            mounting_charge: Set(charges.mounting_charge),
            discount: Set(charges.discount),
            gst: Set(quote.gst),
            paid_amount: Set(Some(quote.total)),
            settlement_amount: Set(Some(pricing::settlement_amount(&charges))),
            commission_amount: Set(Some(quote.commission)),
            media_downloaded: Set(false),
            media_download_date: Set(None),
            printing_started: Set(false),
            printing_start_date: Set(None),
            mounting_started: Set(false),
            mounting_start_date: Set(None),
            site_live: Set(false),
            site_live_date: Set(None),
            paid_25_on_live: Set(false),
            paid_25_on_mid: Set(false),
            paid_50_on_end: Set(false),
            payout_id: Set(None),
            payout_date: Set(None),
            booking_date: Set(today),
            payment_date: Set(Some(today)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = match model.insert(&*self.db).await {
            Ok(saved) => saved,
            Err(err) => {
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    info!(
                        order_id = %request.gateway_order_id,
                        "Duplicate payment callback; returning existing booking"
                    );
                    return BookingEntity::find()
                        .filter(booking::Column::OrderId.eq(request.gateway_order_id.clone()))
                        .one(&*self.db)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::InternalError(
                                "booking vanished after unique violation".into(),
                            )
                        });
                }
                error!(error = %err, order_id = %request.gateway_order_id, "Failed to insert confirmed booking");
                return Err(err.into());
            }
        };

        // First confirmation for this order: move the site to BOOKED and
        // announce the booking.
        bookings::mark_site_booked(&self.db, site.id, self.event_sender.as_deref()).await?;

        info!(
            booking_id = %inserted.id,
            order_id = %request.gateway_order_id,
            "Booking confirmed after verified payment"
        );

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::BookingConfirmed {
                    booking_id: inserted.id,
                    order_id: request.gateway_order_id.clone(),
                })
                .await
            {
                warn!(error = %e, "Failed to send booking confirmed event");
            }
        }

        Ok(inserted)
    }
}
