//! Buyer carts: shortlisted sites with a date range and a quoted total.
//!
//! A cart row is a preview, not a hold. The quoted total is computed with the
//! same pricing engine the payment path uses, but nothing is reserved and the
//! price is recomputed from scratch when the buyer books.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::cart_item::{self, ActiveModel as CartActiveModel, Entity as CartEntity},
    entities::site::{Entity as SiteEntity, SiteStatus},
    errors::ServiceError,
    services::pricing::{self, ChargeInputs},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddCartItemRequest {
    pub site_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub printing_charge: Decimal,
    #[serde(default)]
    pub mounting_charge: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

/// One cart row joined with the site it points at.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub site_id: Uuid,
    pub site_name: String,
    pub location: String,
    pub city: Option<String>,
    pub price_per_month: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,
    pub months: i32,
    pub quoted_total: Decimal,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Adds a site to the buyer's cart with a quoted total. At most one row
    /// per (buyer, site); a second add for the same site is a conflict, not
    /// an update.
    #[instrument(skip(self, request), fields(buyer_id = %buyer_id, site_id = %request.site_id))]
    pub async fn add_item(
        &self,
        request: AddCartItemRequest,
        buyer_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        let site = SiteEntity::find_by_id(request.site_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Site {} not found", request.site_id)))?;
        if SiteStatus::from_str(&site.status) == Ok(SiteStatus::NonActive) {
            return Err(ServiceError::InvalidOperation(
                "site is delisted and cannot be carted".into(),
            ));
        }

        let existing = CartEntity::find()
            .filter(cart_item::Column::BuyerId.eq(buyer_id))
            .filter(cart_item::Column::SiteId.eq(request.site_id))
            .count(&*self.db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict("site is already in the cart".into()));
        }

        let months = pricing::billing_months(request.start_date, request.end_date)?;
        // The same engine that prices real orders validates the charges and
        // computes the preview total.
        let quote = pricing::quote(&ChargeInputs {
            base_monthly_rate: site.price_per_month,
            months,
            printing_charge: request.printing_charge,
            mounting_charge: request.mounting_charge,
            discount: request.discount,
        })?;

        let now = Utc::now();
        let saved = CartActiveModel {
            id: Set(Uuid::new_v4()),
            buyer_id: Set(buyer_id),
            site_id: Set(request.site_id),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            printing_charge: Set(request.printing_charge),
            mounting_charge: Set(request.mounting_charge),
            discount: Set(request.discount),
            months: Set(months as i32),
            quoted_total: Set(quote.total),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(cart_item_id = %saved.id, "Site added to cart");
        Ok(saved)
    }

    /// The buyer's cart, newest first, each row joined with its site.
    #[instrument(skip(self))]
    pub async fn list_items(&self, buyer_id: Uuid) -> Result<Vec<CartItemView>, ServiceError> {
        let rows = CartEntity::find()
            .filter(cart_item::Column::BuyerId.eq(buyer_id))
            .find_also_related(SiteEntity)
            .order_by_desc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (item, site) in rows {
            let site = site.ok_or_else(|| {
                ServiceError::InternalError(format!("cart item {} points at no site", item.id))
            })?;
            out.push(CartItemView {
                id: item.id,
                site_id: site.id,
                site_name: site.name,
                location: site.location,
                city: site.city,
                price_per_month: site.price_per_month,
                start_date: item.start_date,
                end_date: item.end_date,
                printing_charge: item.printing_charge,
                mounting_charge: item.mounting_charge,
                discount: item.discount,
                months: item.months,
                quoted_total: item.quoted_total,
            });
        }
        Ok(out)
    }

    /// Removes a site from the buyer's cart. Removing a site that is not in
    /// the cart is a 404, matching the add-side duplicate check.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, buyer_id: Uuid, site_id: Uuid) -> Result<(), ServiceError> {
        let result = CartEntity::delete_many()
            .filter(cart_item::Column::BuyerId.eq(buyer_id))
            .filter(cart_item::Column::SiteId.eq(site_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Site {} is not in the cart",
                site_id
            )));
        }
        info!(site_id = %site_id, "Site removed from cart");
        Ok(())
    }
}
