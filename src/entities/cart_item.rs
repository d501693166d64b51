use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A site a buyer has shortlisted with its date range and charges. At most
/// one row per (buyer, site); the quoted total is a preview, recomputed from
/// scratch when the buyer actually books.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub buyer_id: Uuid,
    pub site_id: Uuid,

    pub start_date: Date,
    pub end_date: Date,

    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,

    pub months: i32,
    /// Payable total as quoted at add time.
    pub quoted_total: Decimal,

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
}

impl Related<super::site::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Site.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
