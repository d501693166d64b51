//! Phased vendor payouts against a booking's fixed settlement amount.
//!
//! The settlement amount (vendor's gross share) is fixed at confirmation and
//! released in three strictly ordered phases: 25% once the campaign is live
//! with execution proof on file, 25% at the campaign midpoint, and the final
//! 50% at the end date. Each phase releases at most once.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::booking::{self, BookingStatus, Entity as BookingEntity},
    entities::booking_file::{self, Entity as FileEntity, FileCategory},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// The three payout phases, in release order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PayoutPhase {
    LiveQuarter,
    MidpointQuarter,
    FinalHalf,
}

impl PayoutPhase {
    pub const ALL: [PayoutPhase; 3] = [Self::LiveQuarter, Self::MidpointQuarter, Self::FinalHalf];

    pub fn number(&self) -> u8 {
        match self {
            Self::LiveQuarter => 1,
            Self::MidpointQuarter => 2,
            Self::FinalHalf => 3,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::LiveQuarter),
            2 => Some(Self::MidpointQuarter),
            3 => Some(Self::FinalHalf),
            _ => None,
        }
    }

    /// Fraction of the settlement amount this phase releases.
    pub fn share(&self) -> Decimal {
        match self {
            Self::LiveQuarter | Self::MidpointQuarter => dec!(0.25),
            Self::FinalHalf => dec!(0.50),
        }
    }

    fn is_released(&self, b: &booking::Model) -> bool {
        match self {
            Self::LiveQuarter => b.paid_25_on_live,
            Self::MidpointQuarter => b.paid_25_on_mid,
            Self::FinalHalf => b.paid_50_on_end,
        }
    }

    fn flag_column(&self) -> booking::Column {
        match self {
            Self::LiveQuarter => booking::Column::Paid25OnLive,
            Self::MidpointQuarter => booking::Column::Paid25OnMid,
            Self::FinalHalf => booking::Column::Paid50OnEnd,
        }
    }
}

/// Date halfway through the campaign, rounded down to whole days.
pub fn midpoint_date(start: NaiveDate, end: NaiveDate) -> NaiveDate {
    let half = (end - start).num_days() / 2;
    start + Duration::days(half)
}

/// Sum already released for a booking.
pub fn released_total(b: &booking::Model) -> Decimal {
    let settlement = b.settlement_amount.unwrap_or(Decimal::ZERO);
    PayoutPhase::ALL
        .iter()
        .filter(|p| p.is_released(b))
        .map(|p| settlement * p.share())
        .sum()
}

/// First phase not yet released, if any.
pub fn next_phase(b: &booking::Model) -> Option<PayoutPhase> {
    PayoutPhase::ALL.into_iter().find(|p| !p.is_released(b))
}

/// One row of the eligible-payout view: the next releasable phase for a
/// confirmed booking and whether its conditions hold right now.
#[derive(Debug, Serialize, ToSchema)]
pub struct EligiblePayout {
    pub booking_id: Uuid,
    pub order_id: Option<String>,
    pub vendor_id: Uuid,
    pub phase: u8,
    pub amount: Decimal,
    pub ready: bool,
    pub blocked_on: Option<String>,
}

#[derive(Clone)]
pub struct SettlementService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl SettlementService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn load(&self, booking_id: Uuid) -> Result<booking::Model, ServiceError> {
        BookingEntity::find_by_id(booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))
    }

    async fn has_execution_proof(&self, booking_id: Uuid) -> Result<bool, ServiceError> {
        let count = FileEntity::find()
            .filter(booking_file::Column::BookingId.eq(booking_id))
            .filter(booking_file::Column::Category.eq(FileCategory::ExecutionProof.as_str()))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    /// Why the given phase cannot release today, or None if it can.
    async fn phase_blocker(
        &self,
        booking: &booking::Model,
        phase: PayoutPhase,
        today: NaiveDate,
    ) -> Result<Option<String>, ServiceError> {
        let blocker = match phase {
            PayoutPhase::LiveQuarter => {
                if !booking.site_live {
                    Some("campaign is not live".to_string())
                } else if !self.has_execution_proof(booking.id).await? {
                    Some("no execution proof on file".to_string())
                } else {
                    None
                }
            }
            PayoutPhase::MidpointQuarter => {
                let mid = midpoint_date(booking.start_date, booking.end_date);
                (today < mid).then(|| format!("campaign midpoint {} not reached", mid))
            }
            PayoutPhase::FinalHalf => (today < booking.end_date)
                .then(|| format!("campaign end date {} not reached", booking.end_date)),
        };
        Ok(blocker)
    }

    /// Releases one payout phase for a confirmed booking.
    ///
    /// Strictly ordered (1 then 2 then 3); re-releasing a phase is a no-op
    /// and the payout id/date written by the first release are never changed.
    #[instrument(skip(self, payout_ref))]
    pub async fn release_phase(
        &self,
        booking_id: Uuid,
        phase_number: u8,
        payout_ref: Option<String>,
    ) -> Result<booking::Model, ServiceError> {
        let phase = PayoutPhase::from_number(phase_number).ok_or_else(|| {
            ServiceError::ValidationError("payout phase must be 1, 2 or 3".into())
        })?;

        let existing = self.load(booking_id).await?;
        if BookingStatus::from_str(&existing.status) != Ok(BookingStatus::Confirmed) {
            return Err(ServiceError::InvalidOperation(
                "payouts apply to confirmed bookings only".into(),
            ));
        }
        let settlement = existing.settlement_amount.ok_or_else(|| {
            ServiceError::InvalidOperation("booking has no settlement amount".into())
        })?;

        if phase.is_released(&existing) {
            info!(booking_id = %booking_id, phase = phase_number, "Phase already released; no-op");
            return Ok(existing);
        }

        let required = next_phase(&existing)
            .map(|p| p.number())
            .unwrap_or(phase_number);
        if phase_number != required {
            return Err(ServiceError::OutOfOrderPayout {
                attempted: phase_number,
                required,
            });
        }

        let today = Utc::now().date_naive();
        if let Some(reason) = self.phase_blocker(&existing, phase, today).await? {
            return Err(ServiceError::InvalidOperation(reason));
        }

        let amount = settlement * phase.share();
        let now = Utc::now();
        let mut update = BookingEntity::update_many()
            .col_expr(phase.flag_column(), Expr::value(true))
            .col_expr(booking::Column::UpdatedAt, Expr::value(now));
        if existing.payout_id.is_none() {
            let payout_id =
                payout_ref.unwrap_or_else(|| format!("pout_{}", Uuid::new_v4().simple()));
            update = update
                .col_expr(booking::Column::PayoutId, Expr::value(payout_id))
                .col_expr(booking::Column::PayoutDate, Expr::value(now));
        }

        // CAS on status plus the phase flag: no tranche is ever released
        // against a booking that stopped being CONFIRMED between the load
        // and this write, and a concurrent release of the same phase loses
        // the race.
        let result = update
            .filter(booking::Column::Id.eq(booking_id))
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed.as_str()))
            .filter(phase.flag_column().eq(false))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            let current = self.load(booking_id).await?;
            if phase.is_released(&current) {
                return Ok(current);
            }
            return Err(ServiceError::InvalidOperation(
                "payouts apply to confirmed bookings only".into(),
            ));
        }

        info!(
            booking_id = %booking_id,
            phase = phase_number,
            amount = %amount,
            "Payout phase released"
        );
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::PayoutReleased {
                    booking_id,
                    phase: phase_number,
                    amount: amount.to_string(),
                })
                .await
            {
                warn!(error = %e, "Failed to send payout event");
            }
        }
        self.load(booking_id).await
    }

    /// Eligible-payout view for a vendor (or all vendors): each confirmed
    /// booking's next phase, its amount and whether it can release today.
    #[instrument(skip(self))]
    pub async fn eligible_payouts(
        &self,
        vendor_id: Option<Uuid>,
    ) -> Result<Vec<EligiblePayout>, ServiceError> {
        let mut query = BookingEntity::find()
            .filter(booking::Column::Status.eq(BookingStatus::Confirmed.as_str()))
            .filter(booking::Column::SettlementAmount.is_not_null());
        if let Some(vendor_id) = vendor_id {
            query = query.filter(booking::Column::VendorId.eq(vendor_id));
        }
        let rows = query
            .order_by_asc(booking::Column::EndDate)
            .all(&*self.db)
            .await?;

        let today = Utc::now().date_naive();
        let mut out = Vec::new();
        for booking in rows {
            let Some(phase) = next_phase(&booking) else {
                continue;
            };
            let settlement = booking.settlement_amount.unwrap_or(Decimal::ZERO);
            let blocked_on = self.phase_blocker(&booking, phase, today).await?;
            out.push(EligiblePayout {
                booking_id: booking.id,
                order_id: booking.order_id.clone(),
                vendor_id: booking.vendor_id,
                phase: phase.number(),
                amount: settlement * phase.share(),
                ready: blocked_on.is_none(),
                blocked_on,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn shares_sum_to_the_whole_settlement() {
        let total: Decimal = PayoutPhase::ALL.iter().map(|p| p.share()).sum();
        assert_eq!(total, Decimal::ONE);
    }

    #[test]
    fn midpoint_splits_the_campaign() {
        assert_eq!(midpoint_date(d(2024, 1, 1), d(2024, 1, 31)), d(2024, 1, 16));
        assert_eq!(midpoint_date(d(2024, 1, 1), d(2024, 3, 1)), d(2024, 1, 31));
        // Single-day campaign: midpoint is the day itself
        assert_eq!(midpoint_date(d(2024, 1, 1), d(2024, 1, 1)), d(2024, 1, 1));
    }

    #[test]
    fn phase_numbers_round_trip() {
        for phase in PayoutPhase::ALL {
            assert_eq!(PayoutPhase::from_number(phase.number()), Some(phase));
        }
        assert_eq!(PayoutPhase::from_number(0), None);
        assert_eq!(PayoutPhase::from_number(4), None);
    }
}
