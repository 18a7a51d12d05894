//! Per-subscriber notification de-duplication.

use crate::entity::Subscriber;
use crate::entity::SubscriberPatch;
use crate::service::availability::AvailabilityResult;

/// What a probe result means for a subscriber's notification state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A new occurrence: deliver, then remember `occurrence`.
    Notify { occurrence: String },
    /// Already notified about this exact occurrence.
    AlreadyNotified,
    /// The notified occurrence disappeared; forget it so a reappearance notifies again.
    Reset,
    Unchanged,
}

impl Transition {
    /// State change to persist once the transition has been acted on.
    pub fn patch(&self) -> Option<SubscriberPatch> {
        match self {
            Transition::Notify { occurrence } => Some(SubscriberPatch::notified(occurrence.clone())),
            Transition::Reset => Some(SubscriberPatch::cleared()),
            Transition::AlreadyNotified | Transition::Unchanged => None,
        }
    }
}

/// Decides the transition for `subscriber` given a fresh probe `result`.
///
/// Inconclusive results (rate limited, upstream failure) never touch the state: the slot
/// may still be there, and clearing it would notify the same occurrence twice.
pub fn next_transition(subscriber: &Subscriber, result: &AvailabilityResult) -> Transition {
    match result.occurrence_token() {
        Some(token) => {
            if subscriber.notified && subscriber.notified_for_occurrence.as_deref() == Some(token) {
                Transition::AlreadyNotified
            } else {
                Transition::Notify {
                    occurrence: token.to_string(),
                }
            }
        }
        None if subscriber.notified && result.is_conclusive() => Transition::Reset,
        None => Transition::Unchanged,
    }
}
