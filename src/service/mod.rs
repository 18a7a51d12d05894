//! Availability probing and notification-state decisions.

pub mod availability;
pub mod availability_probe;
pub mod label_cache;
pub mod notification_state;

pub use availability::AvailabilityResult;
pub use availability::Slot;
pub use availability::UnavailableReason;
pub use availability_probe::AvailabilityProbe;
