//! Buyer cart: quoted totals at add time, the one-row-per-site rule,
//! removal and the cart's freshness stamp.

mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use adspace_api::errors::ServiceError;
use adspace_api::services::cart::AddCartItemRequest;
use adspace_api::services::freshness::FreshnessScope;

use common::{seed_site, setup};

fn add_request(site_id: Uuid) -> AddCartItemRequest {
    // Exactly three whole billing months.
    AddCartItemRequest {
        site_id,
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        printing_charge: Decimal::from(500),
        mounting_charge: Decimal::from(500),
        discount: Decimal::ZERO,
    }
}

#[tokio::test]
async fn adding_quotes_the_total_and_rejects_duplicates() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let buyer = Uuid::new_v4();

    let item = app
        .services
        .cart
        .add_item(add_request(site.id), buyer)
        .await
        .expect("add");
    assert_eq!(item.months, 3);
    // 3 x 10,000 + 500 + 500, +15% commission, +18% GST
    assert_eq!(item.quoted_total, Decimal::from(42_067));

    let err = app
        .services
        .cart
        .add_item(add_request(site.id), buyer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // The same site in another buyer's cart is fine.
    app.services
        .cart
        .add_item(add_request(site.id), Uuid::new_v4())
        .await
        .expect("other buyer");
}

#[tokio::test]
async fn unknown_and_delisted_sites_cannot_be_carted() {
    let app = setup().await;
    let owner = Uuid::new_v4();
    let site = seed_site(&app, owner, 10_000).await;
    let buyer = Uuid::new_v4();

    let err = app
        .services
        .cart
        .add_item(add_request(Uuid::new_v4()), buyer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    app.services
        .sites
        .set_status(site.id, "NON_ACTIVE", owner)
        .await
        .unwrap();
    let err = app
        .services
        .cart
        .add_item(add_request(site.id), buyer)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn listing_joins_site_details_and_removal_empties_the_cart() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let buyer = Uuid::new_v4();

    app.services
        .cart
        .add_item(add_request(site.id), buyer)
        .await
        .unwrap();

    let items = app.services.cart.list_items(buyer).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].site_id, site.id);
    assert_eq!(items[0].site_name, site.name);
    assert_eq!(items[0].price_per_month, site.price_per_month);
    assert_eq!(items[0].quoted_total, Decimal::from(42_067));

    // Removing a site that was never carted is a 404.
    let err = app
        .services
        .cart
        .remove_item(buyer, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    app.services
        .cart
        .remove_item(buyer, site.id)
        .await
        .expect("remove");
    assert!(app.services.cart.list_items(buyer).await.unwrap().is_empty());

    let err = app
        .services
        .cart
        .remove_item(buyer, site.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn cart_scope_tracks_only_the_buyers_rows() {
    let app = setup().await;
    let site = seed_site(&app, Uuid::new_v4(), 10_000).await;
    let buyer = Uuid::new_v4();

    assert_eq!(
        app.services
            .freshness
            .max_mutated_at(FreshnessScope::BuyerCart(buyer))
            .await
            .unwrap(),
        None
    );

    app.services
        .cart
        .add_item(add_request(site.id), buyer)
        .await
        .unwrap();

    assert!(app
        .services
        .freshness
        .max_mutated_at(FreshnessScope::BuyerCart(buyer))
        .await
        .unwrap()
        .is_some());

    // Another buyer's cart stays empty.
    assert_eq!(
        app.services
            .freshness
            .max_mutated_at(FreshnessScope::BuyerCart(Uuid::new_v4()))
            .await
            .unwrap(),
        None
    );
}
