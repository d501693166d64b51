//! Inventory reconciliation sweep.
//!
//! A BOOKED site should hold at least one CONFIRMED booking whose end date
//! is today or later. The sweep flips sites that no longer do back to
//! AVAILABLE. It runs only when triggered (admin endpoint), is idempotent,
//! and uses conditional updates so a confirmation racing the sweep wins.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::booking::{self, BookingStatus, Entity as BookingEntity},
    entities::site::{self, Entity as SiteEntity, SiteStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Outcome of one reconciliation sweep.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ReconciliationReport {
    /// BOOKED sites examined.
    pub examined: u64,
    /// Sites flipped BOOKED -> AVAILABLE.
    pub released: u64,
    /// Site ids that were released.
    pub released_site_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ReconciliationService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Sweeps every BOOKED site once and releases the ones with no active
    /// confirmed booking.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReconciliationReport, ServiceError> {
        let today = Utc::now().date_naive();
        let booked_sites = SiteEntity::find()
            .filter(site::Column::Status.eq(SiteStatus::Booked.as_str()))
            .all(&*self.db)
            .await?;

        let mut report = ReconciliationReport {
            examined: booked_sites.len() as u64,
            ..Default::default()
        };

        for s in booked_sites {
            let active = BookingEntity::find()
                .filter(booking::Column::SiteId.eq(s.id))
                .filter(booking::Column::Status.eq(BookingStatus::Confirmed.as_str()))
                .filter(booking::Column::EndDate.gte(today))
                .count(&*self.db)
                .await?;
            if active > 0 {
                continue;
            }

            // Conditional on the status still being BOOKED: a confirmation
            // that lands between the count and this write keeps the site.
            let result = SiteEntity::update_many()
                .col_expr(
                    site::Column::Status,
                    Expr::value(SiteStatus::Available.as_str()),
                )
                .col_expr(site::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(site::Column::Id.eq(s.id))
                .filter(site::Column::Status.eq(SiteStatus::Booked.as_str()))
                .exec(&*self.db)
                .await?;

            if result.rows_affected > 0 {
                info!(site_id = %s.id, "Site released to AVAILABLE");
                report.released += 1;
                report.released_site_ids.push(s.id);
                if let Some(sender) = &self.event_sender {
                    if let Err(e) = sender
                        .send(Event::SiteStatusChanged {
                            site_id: s.id,
                            old_status: SiteStatus::Booked.as_str().to_string(),
                            new_status: SiteStatus::Available.as_str().to_string(),
                        })
                        .await
                    {
                        warn!(error = %e, "Failed to send site status event");
                    }
                }
            }
        }

        info!(
            examined = report.examined,
            released = report.released,
            "Reconciliation sweep finished"
        );
        Ok(report)
    }
}
