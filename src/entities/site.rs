use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A bookable outdoor-advertising inventory unit owned by a vendor.
///
/// `BOOKED` implies at least one CONFIRMED booking with an end date on or
/// after today; the reconciliation sweep converges the status back to
/// `AVAILABLE` once that stops holding.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Vendor that owns this site. Opaque id resolved by the upstream
    /// identity service; there is no local users table.
    pub owner_id: Uuid,

    pub name: String,
    pub location: String,
    pub city: Option<String>,
    pub price_per_month: Decimal,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub status: String,
    pub created_at: DateTimeUtc,
    /// Bumped on every write; feeds the freshness index for conditional reads.
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteStatus {
    Active,
    Available,
    Booked,
    NonActive,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Available => "AVAILABLE",
            Self::Booked => "BOOKED",
            Self::NonActive => "NON_ACTIVE",
        }
    }

    /// Statuses from which a confirmed booking may move the site to BOOKED.
    pub fn is_bookable(&self) -> bool {
        matches!(self, Self::Active | Self::Available)
    }
}
