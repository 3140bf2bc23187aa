//! Data models for the scheduling engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Answer rating for a reviewed card, on the study UI's 1-4 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rating {
    /// Failed to recall
    Again,
    /// Recalled with serious difficulty
    Hard,
    /// Recalled with some effort
    Good,
    /// Recalled instantly
    Easy,
}

impl Rating {
    /// Map a raw UI rating (1-4) to a `Rating`. Out-of-range values
    /// yield `None`; callers reject them instead of defaulting.
    pub fn from_value(value: i32) -> Option<Rating> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn value(&self) -> i32 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 2,
            Rating::Good => 3,
            Rating::Easy => 4,
        }
    }
}

/// Where a card sits in the learning lifecycle.
///
/// Scheduling fields live on the phase that gives them meaning: a card
/// has no ease before graduation and no step index outside the
/// learning phases, so those combinations are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum CardPhase {
    /// Never studied; the default for cards with no persisted state
    New,
    /// Working through the learning steps
    Learning {
        /// Index into the configured learning steps
        step: usize,
    },
    /// Graduated; on day-granularity spaced review
    Review {
        /// Current interval in days, always >= 1
        interval_days: u32,
        /// Ease factor applied on Good ratings
        ease: f32,
        /// Successful reviews since the last lapse
        repetitions: u32,
    },
    /// Lapsed out of review; working through the relearning steps
    Relearning {
        /// Index into the configured relearning steps
        step: usize,
        /// Interval held at the lapse, kept as the recovery base
        interval_days: u32,
        ease: f32,
    },
}

impl Default for CardPhase {
    fn default() -> Self {
        Self::New
    }
}

impl CardPhase {
    pub fn is_new(&self) -> bool {
        matches!(self, CardPhase::New)
    }

    /// Ease factor, if the card has graduated at least once
    pub fn ease(&self) -> Option<f32> {
        match self {
            CardPhase::Review { ease, .. } | CardPhase::Relearning { ease, .. } => Some(*ease),
            _ => None,
        }
    }

    /// Review interval in days, if one is in effect
    pub fn interval_days(&self) -> Option<u32> {
        match self {
            CardPhase::Review { interval_days, .. }
            | CardPhase::Relearning { interval_days, .. } => Some(*interval_days),
            _ => None,
        }
    }
}

/// Current spaced repetition state for one card, per user and project.
///
/// Created lazily the first time a card is drawn into a session; only
/// the review state machine produces new values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardReviewState {
    pub card_id: Uuid,
    #[serde(default)]
    pub phase: CardPhase,
    /// Next instant the card is eligible for review
    pub due: DateTime<Utc>,
    /// Lifetime count of Again ratings while in review
    #[serde(default)]
    pub lapses: u32,
    /// Suspended cards are excluded from every queue
    #[serde(default)]
    pub suspended: bool,
    /// Flagged as a leech without suspension
    #[serde(default)]
    pub leech: bool,
    /// Monotonic write version; stale writes are rejected on mismatch
    #[serde(default)]
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl CardReviewState {
    /// Materialize the virtual New state for a card with no record
    pub fn new(card_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            card_id,
            phase: CardPhase::New,
            due: now,
            lapses: 0,
            suspended: false,
            leech: false,
            version: 0,
            updated_at: now,
        }
    }

    /// Check if the card is eligible for review at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.suspended && self.due <= now
    }
}

/// Study-quota counters for one user, project and UTC calendar date.
///
/// A missing record for a date is equivalent to zero counts, so day
/// rollover needs no reset step; only the current day's record is ever
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCounters {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub new_cards_introduced: u32,
    #[serde(default)]
    pub reviews_completed: u32,
}

impl DailyCounters {
    pub fn new(user_id: Uuid, project_id: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id,
            project_id,
            date,
            new_cards_introduced: 0,
            reviews_completed: 0,
        }
    }
}

/// What the flashcard store knows about a card, as far as scheduling
/// is concerned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMeta {
    pub card_id: Uuid,
    /// Creation order within the project, for fifo new-card ordering
    #[serde(default)]
    pub position: i32,
    /// Cards generated from the same source note share a group and can
    /// be buried together
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sibling_group: Option<Uuid>,
}

impl CardMeta {
    pub fn new(card_id: Uuid, position: i32) -> Self {
        Self {
            card_id,
            position,
            sibling_group: None,
        }
    }

    pub fn with_sibling_group(mut self, group: Uuid) -> Self {
        self.sibling_group = Some(group);
        self
    }
}

/// Derived per-user card counts for dashboard display
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyCounts {
    pub total_cards: usize,
    pub new_cards: usize,
    pub learning_cards: usize,
    pub review_cards: usize,
    pub due_cards: usize,
    pub suspended_cards: usize,
}

/// Result of applying one rating: the card's next state plus the
/// day's quota counters after any consumption
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingOutcome {
    pub state: CardReviewState,
    pub counters: DailyCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_from_value() {
        assert_eq!(Rating::from_value(1), Some(Rating::Again));
        assert_eq!(Rating::from_value(2), Some(Rating::Hard));
        assert_eq!(Rating::from_value(3), Some(Rating::Good));
        assert_eq!(Rating::from_value(4), Some(Rating::Easy));
        assert_eq!(Rating::from_value(0), None);
        assert_eq!(Rating::from_value(5), None);
    }

    #[test]
    fn test_new_state_is_due_immediately() {
        let now = Utc::now();
        let state = CardReviewState::new(Uuid::new_v4(), now);
        assert!(state.phase.is_new());
        assert!(state.is_due(now));
        assert_eq!(state.version, 0);
    }

    #[test]
    fn test_suspended_card_never_due() {
        let now = Utc::now();
        let mut state = CardReviewState::new(Uuid::new_v4(), now);
        state.suspended = true;
        assert!(!state.is_due(now));
    }

    #[test]
    fn test_phase_payload_accessors() {
        assert_eq!(CardPhase::New.ease(), None);
        assert_eq!(CardPhase::Learning { step: 1 }.interval_days(), None);

        let review = CardPhase::Review {
            interval_days: 10,
            ease: 2.5,
            repetitions: 3,
        };
        assert_eq!(review.interval_days(), Some(10));
        assert_eq!(review.ease(), Some(2.5));
    }

    #[test]
    fn test_state_serde_defaults() {
        // Records written before the leech/version fields existed still load
        let json = r#"{
            "cardId": "6e1ab5c0-87a1-4c2b-9f6e-0d9f35b9a001",
            "phase": {"phase": "new"},
            "due": "2026-02-01T10:00:00Z",
            "updatedAt": "2026-02-01T10:00:00Z"
        }"#;
        let state: CardReviewState = serde_json::from_str(json).unwrap();
        assert!(state.phase.is_new());
        assert_eq!(state.lapses, 0);
        assert_eq!(state.version, 0);
        assert!(!state.suspended);
    }
}
