//! Leech detection
//!
//! A card that keeps lapsing is costing more time than it returns.
//! After every review-state lapse the lapse count is checked against
//! the configured threshold and the card is suspended or tagged.

use crate::models::CardReviewState;
use crate::settings::{LeechAction, SrsSettings};

/// Apply the leech policy to a freshly lapsed card. Re-checking a card
/// that already crossed the threshold changes nothing.
pub fn check(state: &CardReviewState, settings: &SrsSettings) -> CardReviewState {
    let mut next = state.clone();

    if state.lapses >= settings.leech_threshold {
        match settings.leech_action {
            LeechAction::Suspend => {
                if !next.suspended {
                    log::info!(
                        "card {} crossed {} lapses, suspending",
                        next.card_id,
                        settings.leech_threshold
                    );
                }
                next.suspended = true;
            }
            LeechAction::Tag => {
                if !next.leech {
                    log::info!(
                        "card {} crossed {} lapses, tagging as leech",
                        next.card_id,
                        settings.leech_threshold
                    );
                }
                next.leech = true;
            }
        }
    }

    next
}
