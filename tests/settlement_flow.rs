//! Phased payout release: conditions, strict ordering, idempotency and the
//! immutable payout audit pair.

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use adspace_api::entities::booking::{self, BookingStatus};
use adspace_api::errors::ServiceError;
use adspace_api::services::bookings::AttachFileRequest;
use adspace_api::services::settlements::{midpoint_date, next_phase, released_total};

use common::{days_ago, days_ahead, seed_confirmed_booking, seed_site, setup, TestApp};

async fn make_live(app: &TestApp, booking_id: Uuid, vendor: Uuid) {
    for stage in [
        "MEDIA_DOWNLOADED",
        "PRINTING_STARTED",
        "MOUNTING_STARTED",
        "SITE_LIVE",
    ] {
        app.services
            .bookings
            .mark_milestone(booking_id, stage, vendor)
            .await
            .expect(stage);
    }
}

async fn attach_proof(app: &TestApp, booking_id: Uuid, vendor: Uuid) {
    app.services
        .bookings
        .attach_file(
            booking_id,
            AttachFileRequest {
                category: "EXECUTION_PROOF".into(),
                url: "https://cdn.example.com/proof.jpg".into(),
                name: None,
            },
            vendor,
        )
        .await
        .expect("proof");
}

#[tokio::test]
async fn phases_release_in_order_with_their_conditions() {
    let app = setup().await;
    let vendor = Uuid::new_v4();
    let site = seed_site(&app, vendor, 10_000).await;
    // Midpoint is already behind us; the end date is not.
    let b = seed_confirmed_booking(&app, &site, Uuid::new_v4(), days_ago(60), days_ahead(2)).await;
    let settlement = b.settlement_amount.unwrap();
    assert_eq!(settlement, Decimal::from(11_000));

    // Phase 1 requires the live milestone...
    let err = app
        .services
        .settlements
        .release_phase(b.id, 1, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    make_live(&app, b.id, vendor).await;

    // ...and execution proof on file.
    let err = app
        .services
        .settlements
        .release_phase(b.id, 1, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    attach_proof(&app, b.id, vendor).await;

    // Out-of-order release is rejected before condition checks.
    let err = app
        .services
        .settlements
        .release_phase(b.id, 3, None)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::OutOfOrderPayout {
            attempted: 3,
            required: 1
        }
    );

    let after_1 = app
        .services
        .settlements
        .release_phase(b.id, 1, Some("neft_123".into()))
        .await
        .expect("phase 1");
    assert!(after_1.paid_25_on_live);
    assert_eq!(after_1.payout_id.as_deref(), Some("neft_123"));
    assert!(after_1.payout_date.is_some());
    assert_eq!(released_total(&after_1), Decimal::new(2_750_00, 2));

    // Re-releasing phase 1 is a no-op and keeps the original audit pair.
    let replay = app
        .services
        .settlements
        .release_phase(b.id, 1, Some("neft_999".into()))
        .await
        .unwrap();
    assert_eq!(replay.payout_id.as_deref(), Some("neft_123"));
    assert_eq!(replay.payout_date, after_1.payout_date);

    // Phase 2: midpoint already passed.
    assert!(midpoint_date(after_1.start_date, after_1.end_date) <= Utc::now().date_naive());
    let after_2 = app
        .services
        .settlements
        .release_phase(b.id, 2, Some("neft_456".into()))
        .await
        .expect("phase 2");
    assert!(after_2.paid_25_on_mid);
    assert_eq!(after_2.payout_id.as_deref(), Some("neft_123"));
    assert_eq!(released_total(&after_2), Decimal::new(5_500_00, 2));

    // Phase 3 waits for the end date.
    let err = app
        .services
        .settlements
        .release_phase(b.id, 3, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    booking::Entity::update_many()
        .col_expr(booking::Column::EndDate, Expr::value(days_ago(1)))
        .filter(booking::Column::Id.eq(b.id))
        .exec(&*app.db)
        .await
        .unwrap();

    let after_3 = app
        .services
        .settlements
        .release_phase(b.id, 3, None)
        .await
        .expect("phase 3");
    assert!(after_3.paid_50_on_end);
    assert_eq!(released_total(&after_3), settlement);
    assert_eq!(next_phase(&after_3), None);
}

#[tokio::test]
async fn invalid_phase_numbers_and_pending_bookings_are_rejected() {
    let app = setup().await;
    let vendor = Uuid::new_v4();
    let site = seed_site(&app, vendor, 10_000).await;
    let b = seed_confirmed_booking(&app, &site, Uuid::new_v4(), days_ago(10), days_ahead(10)).await;

    let err = app
        .services
        .settlements
        .release_phase(b.id, 0, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = app
        .services
        .settlements
        .release_phase(Uuid::new_v4(), 1, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn no_payout_releases_once_the_booking_stops_being_confirmed() {
    let app = setup().await;
    let vendor = Uuid::new_v4();
    let site = seed_site(&app, vendor, 10_000).await;
    let b = seed_confirmed_booking(&app, &site, Uuid::new_v4(), days_ago(60), days_ahead(2)).await;

    // All phase-1 conditions hold before the status flips.
    make_live(&app, b.id, vendor).await;
    attach_proof(&app, b.id, vendor).await;

    booking::Entity::update_many()
        .col_expr(
            booking::Column::Status,
            Expr::value(BookingStatus::Cancelled.as_str()),
        )
        .filter(booking::Column::Id.eq(b.id))
        .exec(&*app.db)
        .await
        .unwrap();

    let err = app
        .services
        .settlements
        .release_phase(b.id, 1, Some("neft_777".into()))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let current = booking::Entity::find_by_id(b.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(!current.paid_25_on_live);
    assert_eq!(current.payout_id, None);
    assert_eq!(current.payout_date, None);
    assert_eq!(released_total(&current), Decimal::ZERO);
}

#[tokio::test]
async fn eligible_view_reports_the_next_phase_and_its_blocker() {
    let app = setup().await;
    let vendor = Uuid::new_v4();
    let site = seed_site(&app, vendor, 10_000).await;
    let b = seed_confirmed_booking(&app, &site, Uuid::new_v4(), days_ago(60), days_ahead(2)).await;

    let rows = app
        .services
        .settlements
        .eligible_payouts(Some(vendor))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].booking_id, b.id);
    assert_eq!(rows[0].phase, 1);
    assert!(!rows[0].ready);
    assert!(rows[0].blocked_on.is_some());
    assert_eq!(rows[0].amount, Decimal::new(2_750_00, 2));

    make_live(&app, b.id, vendor).await;
    attach_proof(&app, b.id, vendor).await;

    let rows = app
        .services
        .settlements
        .eligible_payouts(Some(vendor))
        .await
        .unwrap();
    assert!(rows[0].ready);

    // Another vendor sees nothing.
    let rows = app
        .services
        .settlements
        .eligible_payouts(Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(rows.is_empty());
}
