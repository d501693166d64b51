//! Booking lifecycle: cash bookings, confirmation, cancellation, fulfillment
//! milestones and file attachments.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::booking::{self, ActiveModel as BookingActiveModel, BookingStatus, Entity as BookingEntity},
    entities::booking_file::{self, ActiveModel as FileActiveModel, Entity as FileEntity, FileCategory},
    entities::site::{self, Entity as SiteEntity, SiteStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::{self, ChargeInputs, COMMISSION_RATE},
};

/// Maximum attached file URLs per booking per category.
pub const MAX_FILES_PER_CATEGORY: u64 = 3;

/// Ordered fulfillment stages of a confirmed booking. Each stage requires all
/// earlier stages to be set; re-setting a stage is a no-op.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, AsRefStr, Serialize,
    Deserialize, ToSchema,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStage {
    MediaDownloaded,
    PrintingStarted,
    MountingStarted,
    SiteLive,
}

impl FulfillmentStage {
    pub const ALL: [FulfillmentStage; 4] = [
        Self::MediaDownloaded,
        Self::PrintingStarted,
        Self::MountingStarted,
        Self::SiteLive,
    ];

    fn is_set(&self, b: &booking::Model) -> bool {
        match self {
            Self::MediaDownloaded => b.media_downloaded,
            Self::PrintingStarted => b.printing_started,
            Self::MountingStarted => b.mounting_started,
            Self::SiteLive => b.site_live,
        }
    }

    fn flag_column(&self) -> booking::Column {
        match self {
            Self::MediaDownloaded => booking::Column::MediaDownloaded,
            Self::PrintingStarted => booking::Column::PrintingStarted,
            Self::MountingStarted => booking::Column::MountingStarted,
            Self::SiteLive => booking::Column::SiteLive,
        }
    }

    fn date_column(&self) -> booking::Column {
        match self {
            Self::MediaDownloaded => booking::Column::MediaDownloadDate,
            Self::PrintingStarted => booking::Column::PrintingStartDate,
            Self::MountingStarted => booking::Column::MountingStartDate,
            Self::SiteLive => booking::Column::SiteLiveDate,
        }
    }
}

/// Human-readable fulfillment progress: the first unset stage, or "Live".
pub fn progress_label(b: &booking::Model) -> &'static str {
    if !b.media_downloaded {
        "Pending for Media Download"
    } else if !b.printing_started {
        "Pending for Printing"
    } else if !b.mounting_started {
        "Pending for Mounting"
    } else if !b.site_live {
        "Pending for Live"
    } else {
        "Live"
    }
}

/// Moves a site to BOOKED if it is currently bookable (ACTIVE or AVAILABLE).
/// A site in any other state is left alone; the write is a conditional update
/// so a racing sweep cannot be overwritten blindly.
pub(crate) async fn mark_site_booked(
    db: &DbPool,
    site_id: Uuid,
    event_sender: Option<&EventSender>,
) -> Result<(), ServiceError> {
    let site = SiteEntity::find_by_id(site_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Site {} not found", site_id)))?;

    let old_status = match SiteStatus::from_str(&site.status) {
        Ok(s) if s.is_bookable() => s,
        _ => return Ok(()),
    };

    let result = SiteEntity::update_many()
        .col_expr(
            site::Column::Status,
            Expr::value(SiteStatus::Booked.as_str()),
        )
        .col_expr(site::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(site::Column::Id.eq(site_id))
        .filter(site::Column::Status.eq(old_status.as_str()))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(site_id = %site_id, from = old_status.as_str(), "Site marked BOOKED");
        if let Some(sender) = event_sender {
            if let Err(e) = sender
                .send(Event::SiteStatusChanged {
                    site_id,
                    old_status: old_status.as_str().to_string(),
                    new_status: SiteStatus::Booked.as_str().to_string(),
                })
                .await
            {
                warn!(error = %e, "Failed to send site status event");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    pub site_id: Uuid,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AttachFileRequest {
    #[validate(length(min = 1, message = "category is required"))]
    pub category: String,
    #[validate(length(min = 1, max = 2048, message = "url must be 1..=2048 characters"))]
    pub url: String,
    pub name: Option<String>,
}

/// A booking joined with its fulfillment progress label.
#[derive(Debug, Serialize)]
pub struct BookingWithProgress {
    #[serde(flatten)]
    pub booking: booking::Model,
    pub progress: String,
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    cancellation_window_hours: i64,
}

impl BookingService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        cancellation_window_hours: i64,
    ) -> Self {
        Self {
            db,
            event_sender,
            cancellation_window_hours,
        }
    }

    async fn load(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        BookingEntity::find_by_id(booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))
    }

    /// Creates a PENDING booking for the cash/offline flow. No payment is
    /// attached and the site status is untouched until confirmation.
    #[instrument(skip(self, request), fields(site_id = %request.site_id, buyer_id = %buyer_id))]
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
        buyer_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        request.validate()?;

        let site = SiteEntity::find_by_id(request.site_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Site {} not found", request.site_id)))?;

        let months = pricing::billing_months(request.start_date, request.end_date)?;
        let charges = ChargeInputs {
            base_monthly_rate: site.price_per_month,
            months,
            printing_charge: request.printing_charge,
            mounting_charge: request.mounting_charge,
            discount: request.discount,
        };
        let quote = pricing::quote(&charges)?;

        let now = Utc::now();
        let model = BookingActiveModel {
            id: Set(Uuid::new_v4()),
            site_id: Set(site.id),
            buyer_id: Set(buyer_id),
            vendor_id: Set(site.owner_id),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            order_id: Set(None),
            transaction_id: Set(None),
            status: Set(BookingStatus::Pending.as_str().to_string()),
            base_amount: Set(charges.base_monthly_rate * Decimal::from(charges.months)),
            printing_charge: Set(charges.printing_charge),
            mounting_charge: Set(charges.mounting_charge),
            discount: Set(charges.discount),
            gst: Set(quote.gst),
            paid_amount: Set(None),
            settlement_amount: Set(None),
            commission_amount: Set(None),
            media_downloaded: Set(false),
            media_download_date: Set(None),
            printing_started: Set(false),
            printing_start_date: Set(None),
            mounting_started: Set(false),
            mounting_start_date: Set(None),
            site_live: Set(false),
            site_live_date: Set(None),
            paid_25_on_live: Set(false),
            paid_25_on_mid: Set(false),
            paid_50_on_end: Set(false),
            payout_id: Set(None),
            payout_date: Set(None),
            booking_date: Set(now.date_naive()),
            payment_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = model.insert(&*self.db).await?;
        info!(booking_id = %saved.id, "Pending booking created");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::BookingCreated(saved.id)).await {
                warn!(error = %e, "Failed to send booking created event");
            }
        }
        Ok(saved)
    }

    /// Confirms a PENDING booking (cash received). Fixes the settlement and
    /// commission amounts and moves the site to BOOKED. Confirming an
    /// already-CONFIRMED booking is a no-op.
    #[instrument(skip(self))]
    pub async fn confirm_booking(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        let existing = self.load(booking_id).await?;
        match BookingStatus::from_str(&existing.status) {
            Ok(BookingStatus::Confirmed) => return Ok(existing),
            Ok(BookingStatus::Cancelled) => {
                return Err(ServiceError::InvalidOperation(
                    "cancelled bookings cannot be confirmed".into(),
                ))
            }
            Ok(BookingStatus::Pending) => {}
            Err(_) => {
                return Err(ServiceError::InternalError(format!(
                    "booking {} has unknown status {}",
                    booking_id, existing.status
                )))
            }
        }

        let subtotal = existing.base_amount + existing.printing_charge + existing.mounting_charge;
        let commission = subtotal * COMMISSION_RATE;
        let now = Utc::now();

        // CAS on the status column: only one of two racing confirms flips
        // PENDING to CONFIRMED and writes the settlement figures.
        let result = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Confirmed.as_str()),
            )
            .col_expr(booking::Column::SettlementAmount, Expr::value(subtotal))
            .col_expr(booking::Column::CommissionAmount, Expr::value(commission))
            .col_expr(booking::Column::PaymentDate, Expr::value(now.date_naive()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(now))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending.as_str()))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            mark_site_booked(&self.db, existing.site_id, self.event_sender.as_deref()).await?;
            info!(booking_id = %booking_id, "Booking confirmed");
        }
        self.load(booking_id).await
    }

    /// Cancels a booking within the cancellation window. The site status is
    /// left alone; the reconciliation sweep converges it.
    #[instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        actor_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        let existing = self.load(booking_id).await?;

        if existing.buyer_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only the buyer may cancel a booking".into(),
            ));
        }
        if existing.status == BookingStatus::Cancelled.as_str() {
            return Err(ServiceError::AlreadyCancelled);
        }

        let age = Utc::now() - existing.created_at;
        if age > Duration::hours(self.cancellation_window_hours) {
            return Err(ServiceError::CancellationWindowExpired(
                self.cancellation_window_hours,
            ));
        }

        let result = BookingEntity::update_many()
            .col_expr(
                booking::Column::Status,
                Expr::value(BookingStatus::Cancelled.as_str()),
            )
            .col_expr(booking::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.ne(BookingStatus::Cancelled.as_str()))
            .exec(&*self.db)
            .await?;

        // Zero rows means a concurrent cancel won the race.
        if result.rows_affected == 0 {
            return Err(ServiceError::AlreadyCancelled);
        }

        info!(booking_id = %booking_id, "Booking cancelled");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::BookingCancelled(booking_id)).await {
                warn!(error = %e, "Failed to send booking cancelled event");
            }
        }
        self.load(booking_id).await
    }

    /// Marks a fulfillment stage on a CONFIRMED booking. Vendor-owner only;
    /// stages must be reached in order; re-marking a set stage is a no-op.
    #[instrument(skip(self))]
    pub async fn mark_milestone(
        &self,
        booking_id: Uuid,
        stage_name: &str,
        actor_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        let stage = FulfillmentStage::from_str(stage_name)
            .map_err(|_| ServiceError::InvalidStep(stage_name.to_string()))?;

        let existing = self.load(booking_id).await?;
        if existing.vendor_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only the site vendor may update fulfillment".into(),
            ));
        }
        if existing.status != BookingStatus::Confirmed.as_str() {
            return Err(ServiceError::InvalidOperation(
                "fulfillment applies to confirmed bookings only".into(),
            ));
        }

        if stage.is_set(&existing) {
            return Ok(existing);
        }
        for earlier in FulfillmentStage::ALL.iter().take_while(|s| **s != stage) {
            if !earlier.is_set(&existing) {
                return Err(ServiceError::InvalidOperation(format!(
                    "stage {} requires {} first",
                    stage, earlier
                )));
            }
        }

        let now = Utc::now();
        // CAS on status plus the stage flag: the write lands only while the
        // booking is still CONFIRMED, and a racing retry keeps the first
        // writer's stage date.
        let result = BookingEntity::update_many()
            .col_expr(stage.flag_column(), Expr::value(true))
            .col_expr(stage.date_column(), Expr::value(now.date_naive()))
            .col_expr(booking::Column::UpdatedAt, Expr::value(now))
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed.as_str()))
            .filter(stage.flag_column().eq(false))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            // Lost a race: either a concurrent retry set the stage first, or
            // the booking stopped being CONFIRMED between the load and the
            // write. Re-read to tell the two apart.
            let current = self.load(booking_id).await?;
            if stage.is_set(&current) {
                return Ok(current);
            }
            return Err(ServiceError::InvalidOperation(
                "fulfillment applies to confirmed bookings only".into(),
            ));
        }

        info!(booking_id = %booking_id, stage = %stage, "Fulfillment stage reached");
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::MilestoneReached {
                    booking_id,
                    milestone: stage.as_ref().to_string(),
                })
                .await
            {
                warn!(error = %e, "Failed to send milestone event");
            }
        }
        self.load(booking_id).await
    }

    /// Attaches a file URL to a booking, capped at three per category.
    #[instrument(skip(self, request))]
    pub async fn attach_file(
        &self,
        booking_id: Uuid,
        request: AttachFileRequest,
        actor_id: Uuid,
    ) -> Result<booking_file::Model, ServiceError> {
        request.validate()?;
        let category = FileCategory::from_str(&request.category)
            .map_err(|_| ServiceError::ValidationError(format!(
                "unknown file category {}",
                request.category
            )))?;

        let booking = self.load(booking_id).await?;
        if booking.buyer_id != actor_id && booking.vendor_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only booking participants may attach files".into(),
            ));
        }

        let count = FileEntity::find()
            .filter(booking_file::Column::BookingId.eq(booking_id))
            .filter(booking_file::Column::Category.eq(category.as_str()))
            .count(&*self.db)
            .await?;
        if count >= MAX_FILES_PER_CATEGORY {
            return Err(ServiceError::ValidationError(format!(
                "at most {} files per category",
                MAX_FILES_PER_CATEGORY
            )));
        }

        let now = Utc::now();
        let saved = FileActiveModel {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking_id),
            category: Set(category.as_str().to_string()),
            url: Set(request.url),
            name: Set(request.name),
            created_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.touch(booking_id, now).await?;
        info!(booking_id = %booking_id, file_id = %saved.id, category = category.as_str(), "File attached");
        Ok(saved)
    }

    /// Removes an attached file URL.
    #[instrument(skip(self))]
    pub async fn delete_file(
        &self,
        booking_id: Uuid,
        file_id: Uuid,
        actor_id: Uuid,
    ) -> Result<(), ServiceError> {
        let booking = self.load(booking_id).await?;
        if booking.buyer_id != actor_id && booking.vendor_id != actor_id {
            return Err(ServiceError::Forbidden(
                "only booking participants may remove files".into(),
            ));
        }

        let result = FileEntity::delete_many()
            .filter(booking_file::Column::Id.eq(file_id))
            .filter(booking_file::Column::BookingId.eq(booking_id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("File {} not found", file_id)));
        }
        self.touch(booking_id, Utc::now()).await?;
        Ok(())
    }

    pub async fn list_files(
        &self,
        booking_id: Uuid,
        category: Option<FileCategory>,
    ) -> Result<Vec<booking_file::Model>, ServiceError> {
        let mut query = FileEntity::find().filter(booking_file::Column::BookingId.eq(booking_id));
        if let Some(category) = category {
            query = query.filter(booking_file::Column::Category.eq(category.as_str()));
        }
        Ok(query
            .order_by_asc(booking_file::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        self.load(booking_id).await
    }

    /// Booking detail for a gateway order id; vendor-ownership checked.
    #[instrument(skip(self))]
    pub async fn get_by_order_id(
        &self,
        order_id: &str,
        vendor_id: Uuid,
    ) -> Result<booking::Model, ServiceError> {
        let booking = BookingEntity::find()
            .filter(booking::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if booking.vendor_id != vendor_id {
            return Err(ServiceError::Forbidden(
                "order belongs to another vendor".into(),
            ));
        }
        Ok(booking)
    }

    /// A buyer's live bookings: CONFIRMED plus PENDING, newest first.
    pub async fn list_buyer_active(
        &self,
        buyer_id: Uuid,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        Ok(BookingEntity::find()
            .filter(booking::Column::BuyerId.eq(buyer_id))
            .filter(booking::Column::Status.is_in([
                BookingStatus::Confirmed.as_str(),
                BookingStatus::Pending.as_str(),
            ]))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn list_buyer_cancelled(
        &self,
        buyer_id: Uuid,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        Ok(BookingEntity::find()
            .filter(booking::Column::BuyerId.eq(buyer_id))
            .filter(booking::Column::Status.eq(BookingStatus::Cancelled.as_str()))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// A vendor's confirmed bookings that are not yet live, with progress
    /// labels for the fulfillment board.
    pub async fn list_vendor_in_progress(
        &self,
        vendor_id: Uuid,
    ) -> Result<Vec<BookingWithProgress>, ServiceError> {
        let rows = BookingEntity::find()
            .filter(booking::Column::VendorId.eq(vendor_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed.as_str()))
            .filter(booking::Column::SiteLive.eq(false))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|booking| BookingWithProgress {
                progress: progress_label(&booking).to_string(),
                booking,
            })
            .collect())
    }

    /// Occupied date ranges for a site's calendar: CONFIRMED and PENDING
    /// bookings, ordered by start date.
    pub async fn booked_dates(
        &self,
        site_id: Uuid,
    ) -> Result<Vec<(chrono::NaiveDate, chrono::NaiveDate)>, ServiceError> {
        let rows = BookingEntity::find()
            .filter(booking::Column::SiteId.eq(site_id))
            .filter(booking::Column::Status.is_in([
                BookingStatus::Confirmed.as_str(),
                BookingStatus::Pending.as_str(),
            ]))
            .order_by_asc(booking::Column::StartDate)
            .all(&*self.db)
            .await?;
        Ok(rows.into_iter().map(|b| (b.start_date, b.end_date)).collect())
    }

    async fn touch(&self, booking_id: Uuid, at: chrono::DateTime<Utc>) -> Result<(), ServiceError> {
        BookingEntity::update_many()
            .col_expr(booking::Column::UpdatedAt, Expr::value(at))
            .filter(booking::Column::Id.eq(booking_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_with_flags(media: bool, printing: bool, mounting: bool, live: bool) -> booking::Model {
        let now = Utc::now();
        booking::Model {
            id: Uuid::new_v4(),
            site_id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            start_date: now.date_naive(),
            end_date: now.date_naive(),
            order_id: None,
            transaction_id: None,
            status: BookingStatus::Confirmed.as_str().to_string(),
            base_amount: Decimal::from(1000),
            printing_charge: Decimal::ZERO,
            mounting_charge: Decimal::ZERO,
            discount: Decimal::ZERO,
            gst: Decimal::ZERO,
            paid_amount: None,
            settlement_amount: None,
            commission_amount: None,
            media_downloaded: media,
            media_download_date: None,
            printing_started: printing,
            printing_start_date: None,
            mounting_started: mounting,
            mounting_start_date: None,
            site_live: live,
            site_live_date: None,
            paid_25_on_live: false,
            paid_25_on_mid: false,
            paid_50_on_end: false,
            payout_id: None,
            payout_date: None,
            booking_date: now.date_naive(),
            payment_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn progress_label_names_first_unset_stage() {
        assert_eq!(
            progress_label(&booking_with_flags(false, false, false, false)),
            "Pending for Media Download"
        );
        assert_eq!(
            progress_label(&booking_with_flags(true, false, false, false)),
            "Pending for Printing"
        );
        assert_eq!(
            progress_label(&booking_with_flags(true, true, false, false)),
            "Pending for Mounting"
        );
        assert_eq!(
            progress_label(&booking_with_flags(true, true, true, false)),
            "Pending for Live"
        );
        assert_eq!(
            progress_label(&booking_with_flags(true, true, true, true)),
            "Live"
        );
    }

    #[test]
    fn stages_parse_from_storage_names() {
        assert_eq!(
            FulfillmentStage::from_str("MEDIA_DOWNLOADED").unwrap(),
            FulfillmentStage::MediaDownloaded
        );
        assert_eq!(
            FulfillmentStage::from_str("SITE_LIVE").unwrap(),
            FulfillmentStage::SiteLive
        );
        assert!(FulfillmentStage::from_str("TELEPORTED").is_err());
    }

    #[test]
    fn stage_ordering_follows_declaration() {
        assert!(FulfillmentStage::MediaDownloaded < FulfillmentStage::PrintingStarted);
        assert!(FulfillmentStage::MountingStarted < FulfillmentStage::SiteLive);
    }
}
