//! Freshness index for conditional reads.
//!
//! Every write path bumps the touched row's `updated_at`; the index answers
//! "when did anything in this scope last change" with a MAX(updated_at)
//! aggregate. Handlers compare that against `If-Modified-Since` at
//! whole-second precision, since HTTP dates carry no sub-second part.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::booking::{self, Entity as BookingEntity},
    entities::cart_item::{self, Entity as CartEntity},
    entities::site::{self, Entity as SiteEntity},
    errors::ServiceError,
};

/// Cache lifetime advertised on conditional read responses.
pub const CACHE_MAX_AGE_SECS: u32 = 60;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// What a conditional read covers.
#[derive(Copy, Clone, Debug)]
pub enum FreshnessScope {
    BuyerBookings(Uuid),
    BuyerCart(Uuid),
    VendorBookings(Uuid),
    VendorSites(Uuid),
    Site(Uuid),
    Booking(Uuid),
}

/// Formats an instant as an HTTP date (`Last-Modified` value).
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Parses an `If-Modified-Since` value. Unparsable input is treated as
/// absent, per RFC 9110.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whether a resource last mutated at `last` is unchanged for a client that
/// holds `if_modified_since`. Compared on whole seconds.
pub fn is_not_modified(last: DateTime<Utc>, if_modified_since: DateTime<Utc>) -> bool {
    last.timestamp() <= if_modified_since.timestamp()
}

#[derive(Clone)]
pub struct FreshnessService {
    db: Arc<DbPool>,
}

impl FreshnessService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Latest `updated_at` within the scope, or None for an empty scope.
    #[instrument(skip(self))]
    pub async fn max_mutated_at(
        &self,
        scope: FreshnessScope,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let max = match scope {
            FreshnessScope::BuyerBookings(buyer_id) => {
                self.max_booking_updated_at(booking::Column::BuyerId, buyer_id)
                    .await?
            }
            FreshnessScope::VendorBookings(vendor_id) => {
                self.max_booking_updated_at(booking::Column::VendorId, vendor_id)
                    .await?
            }
            FreshnessScope::Booking(booking_id) => {
                self.max_booking_updated_at(booking::Column::Id, booking_id)
                    .await?
            }
            FreshnessScope::BuyerCart(buyer_id) => {
                let row: Option<Option<DateTime<Utc>>> = CartEntity::find()
                    .select_only()
                    .column_as(cart_item::Column::UpdatedAt.max(), "max_updated_at")
                    .filter(cart_item::Column::BuyerId.eq(buyer_id))
                    .into_tuple()
                    .one(&*self.db)
                    .await?;
                row.flatten()
            }
            FreshnessScope::VendorSites(vendor_id) => {
                self.max_site_updated_at(site::Column::OwnerId, vendor_id)
                    .await?
            }
            FreshnessScope::Site(site_id) => {
                self.max_site_updated_at(site::Column::Id, site_id).await?
            }
        };
        Ok(max)
    }

    async fn max_booking_updated_at(
        &self,
        column: booking::Column,
        id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let row: Option<Option<DateTime<Utc>>> = BookingEntity::find()
            .select_only()
            .column_as(booking::Column::UpdatedAt.max(), "max_updated_at")
            .filter(column.eq(id))
            .into_tuple()
            .one(&*self.db)
            .await?;
        Ok(row.flatten())
    }

    async fn max_site_updated_at(
        &self,
        column: site::Column,
        id: Uuid,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        let row: Option<Option<DateTime<Utc>>> = SiteEntity::find()
            .select_only()
            .column_as(site::Column::UpdatedAt.max(), "max_updated_at")
            .filter(column.eq(id))
            .into_tuple()
            .one(&*self.db)
            .await?;
        Ok(row.flatten())
    }
}
