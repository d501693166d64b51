//! Site inventory CRUD for vendors.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::site::{self, ActiveModel as SiteActiveModel, Entity as SiteEntity, SiteStatus},
    errors::ServiceError,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSiteRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1..=255 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 512, message = "location must be 1..=512 characters"))]
    pub location: String,
    pub city: Option<String>,
    pub price_per_month: Decimal,
    #[serde(default)]
    pub printing_charge: Decimal,
    #[serde(default)]
    pub mounting_charge: Decimal,
}

#[derive(Clone)]
pub struct SiteService {
    db: Arc<DbPool>,
}

impl SiteService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Creates an ACTIVE site owned by the calling vendor.
    #[instrument(skip(self, request), fields(owner_id = %owner_id))]
    pub async fn create_site(
        &self,
        request: CreateSiteRequest,
        owner_id: Uuid,
    ) -> Result<site::Model, ServiceError> {
        request.validate()?;
        if request.price_per_month <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "monthly rate must be positive".into(),
            ));
        }
        if request.printing_charge < Decimal::ZERO || request.mounting_charge < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "charges must not be negative".into(),
            ));
        }

        let now = Utc::now();
        let saved = SiteActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            name: Set(request.name),
            location: Set(request.location),
            city: Set(request.city),
            price_per_month: Set(request.price_per_month),
            printing_charge: Set(request.printing_charge),
            mounting_charge: Set(request.mounting_charge),
            status: Set(SiteStatus::Active.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        info!(site_id = %saved.id, "Site created");
        Ok(saved)
    }

    pub async fn get_site(&self, site_id: Uuid) -> Result<site::Model, ServiceError> {
        SiteEntity::find_by_id(site_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Site {} not found", site_id)))
    }

    /// Sites owned by a vendor, newest first.
    pub async fn list_vendor_sites(&self, owner_id: Uuid) -> Result<Vec<site::Model>, ServiceError> {
        Ok(SiteEntity::find()
            .filter(site::Column::OwnerId.eq(owner_id))
            .order_by_desc(site::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Browsable inventory: everything except NON_ACTIVE.
    pub async fn list_browsable(&self) -> Result<Vec<site::Model>, ServiceError> {
        Ok(SiteEntity::find()
            .filter(site::Column::Status.ne(SiteStatus::NonActive.as_str()))
            .order_by_desc(site::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Owner-only status change, e.g. delisting a site with NON_ACTIVE.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        site_id: Uuid,
        status: &str,
        actor_id: Uuid,
    ) -> Result<site::Model, ServiceError> {
        let status = SiteStatus::from_str(status)
            .map_err(|_| ServiceError::ValidationError(format!("unknown site status {}", status)))?;
        let existing = self.get_site(site_id).await?;
        if existing.owner_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only the site owner may change its status".into(),
            ));
        }

        SiteEntity::update_many()
            .col_expr(site::Column::Status, Expr::value(status.as_str()))
            .col_expr(site::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(site::Column::Id.eq(site_id))
            .exec(&*self.db)
            .await?;

        info!(site_id = %site_id, status = status.as_str(), "Site status updated");
        self.get_site(site_id).await
    }
}
