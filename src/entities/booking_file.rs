use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// A file URL attached to a booking. The backing object store is an external
/// collaborator; only the URL is kept here. At most three files per booking
/// per category, enforced by the booking service.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub booking_id: Uuid,
    pub category: String,
    pub url: String,
    pub name: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileCategory {
    /// Creative assets uploaded by the buyer for the campaign.
    Creative,
    /// Photos proving the campaign is mounted and live.
    ExecutionProof,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creative => "CREATIVE",
            Self::ExecutionProof => "EXECUTION_PROOF",
        }
    }
}
