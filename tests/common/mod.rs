//! Shared harness for integration tests: an in-memory database with the
//! full schema applied, the service bundle wired to a scripted payment
//! gateway, and seed helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use adspace_api::config::{AppConfig, GatewayConfig};
use adspace_api::db::{self, DbConfig, DbPool};
use adspace_api::entities::booking::{self, BookingStatus};
use adspace_api::entities::site::{self, SiteStatus};
use adspace_api::errors::ServiceError;
use adspace_api::handlers::AppServices;
use adspace_api::services::payments::PaymentGateway;

pub const TEST_SECRET: &str = "test_gateway_secret";
pub const TEST_KEY_ID: &str = "rzp_test_key";

/// Deterministic stand-in for the payment gateway.
#[derive(Default)]
pub struct MockGateway {
    counter: AtomicU64,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn open_order(
        &self,
        _amount_minor: i64,
        _currency: &str,
        _receipt: &str,
        _notes: &HashMap<String, String>,
    ) -> Result<String, ServiceError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("order_test_{}", n))
    }

    fn key_id(&self) -> &str {
        TEST_KEY_ID
    }
}

pub fn test_config() -> AppConfig {
    AppConfig::new(
        "sqlite::memory:".into(),
        "127.0.0.1".into(),
        0,
        "test".into(),
        GatewayConfig {
            key_id: TEST_KEY_ID.into(),
            key_secret: TEST_SECRET.into(),
            api_base: "http://localhost:0".into(),
            timeout_secs: 1,
            currency: "INR".into(),
        },
    )
}

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub services: AppServices,
}

/// Fresh in-memory database with the schema applied. A single pooled
/// connection keeps every query on the same in-memory instance.
pub async fn setup() -> TestApp {
    let pool = db::establish_connection_with_config(&DbConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(600),
        acquire_timeout: Duration::from_secs(5),
    })
    .await
    .expect("connect");
    db::run_migrations(&pool).await.expect("migrate");

    let db = Arc::new(pool);
    let config = test_config();
    let services = AppServices::new(db.clone(), Arc::new(MockGateway::default()), &config, None);
    TestApp {
        db,
        config,
        services,
    }
}

pub async fn seed_site(app: &TestApp, owner_id: Uuid, monthly_rate: i64) -> site::Model {
    let now = Utc::now();
    site::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        name: Set("Highway hoarding 40x20".into()),
        location: Set("NH48 km 112".into()),
        city: Set(Some("Pune".into())),
        price_per_month: Set(Decimal::from(monthly_rate)),
        printing_charge: Set(Decimal::from(500)),
        mounting_charge: Set(Decimal::from(500)),
        status: Set(SiteStatus::Active.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.db)
    .await
    .expect("seed site")
}

/// Inserts a CONFIRMED booking directly, bypassing the payment flow, for
/// settlement and reconciliation scenarios that need specific dates.
pub async fn seed_confirmed_booking(
    app: &TestApp,
    site: &site::Model,
    buyer_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> booking::Model {
    let now = Utc::now();
    let base = Decimal::from(10_000);
    let subtotal = base + site.printing_charge + site.mounting_charge;
    booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        site_id: Set(site.id),
        buyer_id: Set(buyer_id),
        vendor_id: Set(site.owner_id),
        start_date: Set(start_date),
        end_date: Set(end_date),
        order_id: Set(Some(format!("order_seed_{}", Uuid::new_v4().simple()))),
        transaction_id: Set(Some(format!("pay_seed_{}", Uuid::new_v4().simple()))),
        status: Set(BookingStatus::Confirmed.as_str().to_string()),
        base_amount: Set(base),
        printing_charge: Set(site.printing_charge),
        mounting_charge: Set(site.mounting_charge),
        discount: Set(Decimal::ZERO),
        gst: Set(Decimal::ZERO),
        paid_amount: Set(Some(subtotal)),
        settlement_amount: Set(Some(subtotal)),
        commission_amount: Set(Some(subtotal * Decimal::new(15, 2))),
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
        booking_date: Set(now.date_naive()),
        payment_date: Set(Some(now.date_naive())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*app.db)
    .await
    .expect("seed booking")
}

pub fn days_ago(n: i64) -> NaiveDate {
    (Utc::now() - chrono::Duration::days(n)).date_naive()
}

pub fn days_ahead(n: i64) -> NaiveDate {
    (Utc::now() + chrono::Duration::days(n)).date_naive()
}
