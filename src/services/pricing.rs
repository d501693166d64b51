//! Pricing engine.
//!
//! Pure quote computation, run twice per transaction: once when the gateway
//! order is opened and again when the payment callback is verified. The two
//! runs must agree at minor-unit precision; a difference is treated as a
//! tampering signal, not a rounding artifact.

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Platform commission applied on top of the vendor's gross share.
pub const COMMISSION_RATE: Decimal = dec!(0.15);
/// GST applied after discount.
pub const GST_RATE: Decimal = dec!(0.18);
/// Minor units (paise) per currency unit.
pub const MINOR_UNITS_PER_UNIT: i64 = 100;
/// Ceiling on any single monetary input. Keeps every intermediate product
/// inside `Decimal` range and the minor-unit total inside `i64`.
pub const MAX_AMOUNT: Decimal = dec!(1_000_000_000);
/// Ceiling on billing months (a century); campaigns are months, not ages.
pub const MAX_BILLING_MONTHS: u32 = 1200;

/// Raw charge inputs for a quote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChargeInputs {
    pub base_monthly_rate: Decimal,
    pub months: u32,
    pub printing_charge: Decimal,
    pub mounting_charge: Decimal,
    pub discount: Decimal,
}

/// Full price breakdown for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PriceQuote {
    /// base_monthly_rate * months + printing + mounting
    pub subtotal: Decimal,
    /// 15% platform commission on the subtotal
    pub commission: Decimal,
    pub gross_total: Decimal,
    pub after_discount: Decimal,
    /// 18% GST on the discounted amount
    pub gst: Decimal,
    pub total: Decimal,
}

impl PriceQuote {
    /// Payable total in integral minor units. Rounded to the nearest paise,
    /// midpoint away from zero; quote-time and verify-time totals are
    /// compared on this value.
    pub fn total_minor_units(&self) -> Result<i64, ServiceError> {
        to_minor_units(self.total)
    }
}

/// Converts a currency amount to integral minor units, rounding the midpoint
/// away from zero. Amounts whose minor-unit value does not fit an `i64` are
/// rejected rather than saturated.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_UNIT))
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| {
            ServiceError::ValidationError("amount exceeds the supported maximum".into())
        })
}

/// Number of billing months for a date range: whole months between the two
/// dates (day-of-month aware), rounded up to at least one month.
pub fn billing_months(start: NaiveDate, end: NaiveDate) -> Result<u32, ServiceError> {
    if end < start {
        return Err(ServiceError::ValidationError(
            "end date must not be before start date".into(),
        ));
    }
    let mut months = (end.year() as i64 - start.year() as i64) * 12
        + (end.month() as i64 - start.month() as i64);
    if end.day() < start.day() {
        months -= 1;
    }
    Ok(months.max(1) as u32)
}

/// Computes the payable total and its breakdown from raw charges.
///
/// The algorithm is fixed and must be reproduced bit-for-bit on both the
/// order-creation and verification paths:
/// 1. subtotal = rate * months + printing + mounting
/// 2. commission = subtotal * 0.15
/// 3. gross = subtotal + commission
/// 4. after = gross - discount
/// 5. gst = after * 0.18
/// 6. total = after + gst
pub fn quote(charges: &ChargeInputs) -> Result<PriceQuote, ServiceError> {
    if charges.base_monthly_rate <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "base monthly rate must be positive".into(),
        ));
    }
    if charges.months == 0 {
        return Err(ServiceError::ValidationError(
            "months must be at least 1".into(),
        ));
    }
    if charges.months > MAX_BILLING_MONTHS {
        return Err(ServiceError::ValidationError(
            "campaign length exceeds the supported maximum".into(),
        ));
    }
    if charges.printing_charge < Decimal::ZERO || charges.mounting_charge < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "charges must not be negative".into(),
        ));
    }
    if charges.discount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "discount must not be negative".into(),
        ));
    }
    // Bounded inputs keep the arithmetic below inside Decimal range; without
    // this, Decimal's Add/Mul panic on overflow.
    for amount in [
        charges.base_monthly_rate,
        charges.printing_charge,
        charges.mounting_charge,
        charges.discount,
    ] {
        if amount > MAX_AMOUNT {
            return Err(ServiceError::ValidationError(
                "amount exceeds the supported maximum".into(),
            ));
        }
    }

    let subtotal = charges.base_monthly_rate * Decimal::from(charges.months)
        + charges.printing_charge
        + charges.mounting_charge;
    let commission = subtotal * COMMISSION_RATE;
    let gross_total = subtotal + commission;

    if charges.discount > gross_total {
        return Err(ServiceError::ValidationError(
            "discount exceeds gross total".into(),
        ));
    }

    let after_discount = gross_total - charges.discount;
    let gst = after_discount * GST_RATE;
    let total = after_discount + gst;

    if total <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "computed total must be positive".into(),
        ));
    }

    Ok(PriceQuote {
        subtotal,
        commission,
        gross_total,
        after_discount,
        gst,
        total,
    })
}

/// The vendor's gross share of a booking: pre-commission, pre-GST,
/// pre-discount. Fixed at confirmation time.
pub fn settlement_amount(charges: &ChargeInputs) -> Decimal {
    charges.base_monthly_rate * Decimal::from(charges.months)
        + charges.printing_charge
        + charges.mounting_charge
}
