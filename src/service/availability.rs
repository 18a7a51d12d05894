//! Normalized outcome of one availability probe.

use std::fmt;

/// An exam slot found for a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    /// First date listed by the upstream service. Doubles as the occurrence token.
    pub date: String,
    pub location_label: String,
    pub category_label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The subject already holds an active request with the authority.
    ActiveRequest,
    NoSlots,
    RateLimited,
    UpstreamError,
}

impl UnavailableReason {
    pub fn message(&self) -> &'static str {
        match self {
            UnavailableReason::ActiveRequest => "You already have an active request.",
            UnavailableReason::NoSlots => "No exam is available at the moment.",
            UnavailableReason::RateLimited => {
                "The exam service is rate limiting requests. Please try again in 30 minutes."
            }
            UnavailableReason::UpstreamError => "An error occurred while calling the exam service.",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AvailabilityResult {
    Available(Slot),
    Unavailable(UnavailableReason),
}

impl AvailabilityResult {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityResult::Available(_))
    }

    /// Token identifying which availability instance this is.
    pub fn occurrence_token(&self) -> Option<&str> {
        match self {
            AvailabilityResult::Available(slot) => Some(&slot.date),
            AvailabilityResult::Unavailable(_) => None,
        }
    }

    /// `false` when the upstream could not be asked, so availability is unknown.
    pub fn is_conclusive(&self) -> bool {
        !matches!(
            self,
            AvailabilityResult::Unavailable(
                UnavailableReason::RateLimited | UnavailableReason::UpstreamError
            )
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            AvailabilityResult::Available(_) => "Exam available!",
            AvailabilityResult::Unavailable(reason) => reason.message(),
        }
    }
}

impl fmt::Display for AvailabilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailabilityResult::Available(slot) => write!(
                f,
                "available on {} at {} ({})",
                slot.date, slot.location_label, slot.category_label
            ),
            AvailabilityResult::Unavailable(reason) => write!(f, "unavailable: {}", reason.message()),
        }
    }
}
