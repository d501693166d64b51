//! End-to-end payment verification: order creation, signature and amount
//! checks, idempotent confirmation.

mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use adspace_api::entities::booking::BookingStatus;
use adspace_api::entities::site::{self, SiteStatus};
use adspace_api::errors::ServiceError;
use adspace_api::services::payments::{
    expected_signature, ConfirmPaymentRequest, CreateOrderRequest,
};

use common::{seed_site, setup, TEST_KEY_ID, TEST_SECRET};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn order_request(site_id: Uuid) -> CreateOrderRequest {
    CreateOrderRequest {
        site_id,
        start_date: d(2025, 1, 1),
        end_date: d(2025, 4, 1),
        printing_charge: Decimal::from(500),
        mounting_charge: Decimal::from(500),
        discount: Decimal::ZERO,
    }
}

fn confirm_request(site_id: Uuid, order_id: &str, payment_id: &str) -> ConfirmPaymentRequest {
    ConfirmPaymentRequest {
        gateway_order_id: order_id.to_string(),
        gateway_payment_id: payment_id.to_string(),
        signature: expected_signature(TEST_SECRET, order_id, payment_id),
        site_id,
        start_date: d(2025, 1, 1),
        end_date: d(2025, 4, 1),
        printing_charge: Decimal::from(500),
        mounting_charge: Decimal::from(500),
        discount: Decimal::ZERO,
        // 3 months x 10,000 + 1,000 charges, +15% commission, +18% GST
        claimed_total: Decimal::from(42_067),
    }
}

#[tokio::test]
async fn order_amount_is_quoted_from_the_stored_rate() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let buyer = Uuid::new_v4();

    let response = app
        .services
        .payments
        .create_order(order_request(site.id), buyer)
        .await
        .expect("order");

    assert_eq!(response.amount_minor, 4_206_700);
    assert_eq!(response.currency, "INR");
    assert_eq!(response.key_id, TEST_KEY_ID);
    assert!(response.order_id.starts_with("order_test_"));
}

#[tokio::test]
async fn verified_payment_confirms_exactly_one_booking() {
    let app = setup().await;
    let vendor = Uuid::new_v4();
    let site = seed_site(&app, vendor, 10_000).await;
    let buyer = Uuid::new_v4();

    let order = app
        .services
        .payments
        .create_order(order_request(site.id), buyer)
        .await
        .expect("order");

    let booking = app
        .services
        .payments
        .confirm_after_payment(confirm_request(site.id, &order.order_id, "pay_1"), buyer)
        .await
        .expect("confirm");

    assert_eq!(booking.status, BookingStatus::Confirmed.as_str());
    assert_eq!(booking.order_id.as_deref(), Some(order.order_id.as_str()));
    assert_eq!(booking.vendor_id, vendor);
    assert_eq!(booking.settlement_amount, Some(Decimal::from(31_000)));
    assert_eq!(booking.commission_amount, Some(Decimal::new(465_000, 2)));

    let site_after = site::Entity::find_by_id(site.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(site_after.status, SiteStatus::Booked.as_str());

    // A retried callback returns the same booking instead of a duplicate.
    let replay = app
        .services
        .payments
        .confirm_after_payment(confirm_request(site.id, &order.order_id, "pay_1"), buyer)
        .await
        .expect("replay");
    assert_eq!(replay.id, booking.id);
}

#[tokio::test]
async fn claimed_total_must_match_recomputed_total() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let buyer = Uuid::new_v4();

    let mut request = confirm_request(site.id, "order_x", "pay_x");
    request.claimed_total = Decimal::from(42_066);

    let err = app
        .services
        .payments
        .confirm_after_payment(request, buyer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PriceMismatch);
}

#[tokio::test]
async fn forged_signature_creates_no_booking() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let buyer = Uuid::new_v4();

    let mut request = confirm_request(site.id, "order_x", "pay_x");
    request.signature = expected_signature("wrong_secret", "order_x", "pay_x");

    let err = app
        .services
        .payments
        .confirm_after_payment(request, buyer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SignatureInvalid);

    let bookings = adspace_api::entities::booking::Entity::find()
        .all(&*app.db)
        .await
        .unwrap();
    assert!(bookings.is_empty());
}

#[tokio::test]
async fn totals_below_one_currency_unit_are_rejected() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    site::Entity::update_many()
        .col_expr(site::Column::PricePerMonth, Expr::value(Decimal::new(1, 2)))
        .filter(site::Column::Id.eq(site.id))
        .exec(&*app.db)
        .await
        .unwrap();

    let request = CreateOrderRequest {
        site_id: site.id,
        start_date: d(2025, 1, 1),
        end_date: d(2025, 1, 15),
        printing_charge: Decimal::ZERO,
        mounting_charge: Decimal::ZERO,
        discount: Decimal::ZERO,
    };
    let err = app
        .services
        .payments
        .create_order(request, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn unknown_site_is_a_not_found() {
    let app = setup().await;
    let err = app
        .services
        .payments
        .create_order(order_request(Uuid::new_v4()), Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
