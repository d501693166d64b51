pub mod bookings;
pub mod cart;
pub mod freshness;
pub mod payments;
pub mod pricing;
pub mod reconciliation;
pub mod settlements;
pub mod sites;
