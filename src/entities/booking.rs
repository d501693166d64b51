use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A buyer's reservation of a site for a date range, with the attached
/// payment, fulfillment and settlement record.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub site_id: Uuid,
    pub buyer_id: Uuid,
    /// Owner of the site at booking time, denormalized so payouts survive a
    /// later ownership change.
    pub vendor_id: Uuid,

    pub start_date: Date,
    pub end_date: Date,

    /// External gateway order id. Unique; assigned at most once. This column
    /// is the unit of idempotency for a payment: a duplicate insert is how a
    /// retried callback is detected.
    pub order_id: Option<String>,
    /// Gateway payment id captured at verification time.
    pub transaction_id: Option<String>,

    pub status: String,

    pub base_amount: Decimal,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,
    pub gst: Decimal,
    pub paid_amount: Option<Decimal>,

    /// Vendor's gross share, fixed at confirmation and never recomputed.
    pub settlement_amount: Option<Decimal>,
    pub commission_amount: Option<Decimal>,

    pub media_downloaded: bool,
    pub media_download_date: Option<Date>,
    pub printing_started: bool,
    pub printing_start_date: Option<Date>,
    pub mounting_started: bool,
    pub mounting_start_date: Option<Date>,
    pub site_live: bool,
    pub site_live_date: Option<Date>,

    pub paid_25_on_live: bool,
    pub paid_25_on_mid: bool,
    pub paid_50_on_end: bool,
    /// Payout audit pair, set by the first released phase and never changed.
    pub payout_id: Option<String>,
    pub payout_date: Option<DateTimeUtc>,

    pub booking_date: Date,
    pub payment_date: Option<Date>,

    pub created_at: DateTimeUtc,
    /// Bumped on every write; feeds the freshness index for conditional reads.
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::site::Entity",
        from = "Column::SiteId",
        to = "super::site::Column::Id"
    )]
    Site,
    #[sea_orm(has_many = "super::booking_file::Entity")]
    Files,
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl Related<super::booking_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()).unwrap(), status);
        }
    }
}
