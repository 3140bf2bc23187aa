//! Per-project scheduler configuration
//!
//! Settings arrive from the project configuration screen and are
//! validated eagerly; the engine assumes well-formed values and never
//! clamps silently.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("learning steps must not be empty")]
    EmptyLearningSteps,

    #[error("relearning steps must not be empty")]
    EmptyRelearningSteps,

    #[error("steps must be at least one minute")]
    ZeroLengthStep,

    #[error("graduating interval must be at least one day")]
    GraduatingIntervalTooShort,

    #[error("easy interval must be at least one day")]
    EasyIntervalTooShort,

    #[error("starting ease {0} outside [1.3, 5.0]")]
    StartingEaseOutOfRange(f32),

    #[error("minimum ease {0} outside [1.3, starting ease]")]
    MinimumEaseOutOfRange(f32),

    #[error("maximum ease {0} below starting ease")]
    MaximumEaseBelowStarting(f32),

    #[error("easy bonus {0} outside [1.0, 3.0]")]
    EasyBonusOutOfRange(f32),

    #[error("hard interval factor {0} outside [1.0, 2.0]")]
    HardIntervalFactorOutOfRange(f32),

    #[error("lapse ease penalty {0} outside [0.0, 1.0]")]
    LapseEasePenaltyOutOfRange(f32),

    #[error("lapse recovery factor {0} outside (0.0, 1.0]")]
    LapseRecoveryFactorOutOfRange(f32),

    #[error("interval modifier {0} outside (0.0, 2.0]")]
    IntervalModifierOutOfRange(f32),

    #[error("max interval must be at least one day")]
    MaxIntervalTooShort,

    #[error("leech threshold {0} outside [1, 20]")]
    LeechThresholdOutOfRange(u32),
}

/// What to do with a card once its lapse count crosses the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeechAction {
    /// Remove the card from all queues until the user intervenes
    Suspend,
    /// Flag the card but keep scheduling it
    Tag,
}

impl Default for LeechAction {
    fn default() -> Self {
        Self::Suspend
    }
}

/// How the new-card bucket of a session is ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NewCardOrder {
    /// Creation order
    Fifo,
    /// Shuffled, with a seed derived from the session instant
    Random,
}

impl Default for NewCardOrder {
    fn default() -> Self {
        Self::Fifo
    }
}

/// Spaced-repetition settings for one project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsSettings {
    /// Learning steps in minutes, walked in order before graduation
    #[serde(default = "default_learning_steps")]
    pub learning_steps_minutes: Vec<u32>,
    /// Relearning steps in minutes, walked after a lapse
    #[serde(default = "default_relearning_steps")]
    pub relearning_steps_minutes: Vec<u32>,
    /// First review interval after graduating via Good
    #[serde(default = "default_graduating_interval")]
    pub graduating_interval_days: u32,
    /// First review interval after graduating via Easy
    #[serde(default = "default_easy_interval")]
    pub easy_interval_days: u32,
    #[serde(default = "default_starting_ease")]
    pub starting_ease: f32,
    #[serde(default = "default_minimum_ease")]
    pub minimum_ease: f32,
    /// Optional ceiling on ease growth from Easy ratings; none by default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_ease: Option<f32>,
    /// Extra interval multiplier on Easy ratings
    #[serde(default = "default_easy_bonus")]
    pub easy_bonus: f32,
    /// Interval multiplier on Hard ratings; ease is not applied
    #[serde(default = "default_hard_interval_factor")]
    pub hard_interval_factor: f32,
    /// Ease lost on a lapse
    #[serde(default = "default_lapse_ease_penalty")]
    pub lapse_ease_penalty: f32,
    /// Fraction of the pre-lapse interval restored on recovery
    #[serde(default = "default_lapse_recovery_factor")]
    pub lapse_recovery_factor: f32,
    /// Global multiplier applied to every review interval
    #[serde(default = "default_interval_modifier")]
    pub interval_modifier: f32,
    #[serde(default = "default_max_interval")]
    pub max_interval_days: u32,
    /// Lapse count at which a card becomes a leech
    #[serde(default = "default_leech_threshold")]
    pub leech_threshold: u32,
    #[serde(default)]
    pub leech_action: LeechAction,
    #[serde(default)]
    pub new_card_order: NewCardOrder,
    /// Pull review cards due within the look-ahead window into today's
    /// session
    #[serde(default)]
    pub review_ahead: bool,
    /// Look-ahead window in days when `review_ahead` is set
    #[serde(default = "default_review_ahead_days")]
    pub review_ahead_days: u32,
    /// Drop queue entries sharing a sibling group with an earlier entry
    #[serde(default)]
    pub bury_siblings: bool,
    #[serde(default = "default_new_cards_per_day")]
    pub new_cards_per_day: u32,
    #[serde(default = "default_reviews_per_day")]
    pub max_reviews_per_day: u32,
}

fn default_learning_steps() -> Vec<u32> {
    vec![1, 10]
}

fn default_relearning_steps() -> Vec<u32> {
    vec![10]
}

fn default_graduating_interval() -> u32 {
    1
}

fn default_easy_interval() -> u32 {
    4
}

fn default_starting_ease() -> f32 {
    2.5
}

fn default_minimum_ease() -> f32 {
    1.3
}

fn default_easy_bonus() -> f32 {
    1.3
}

fn default_hard_interval_factor() -> f32 {
    1.2
}

fn default_lapse_ease_penalty() -> f32 {
    0.2
}

fn default_lapse_recovery_factor() -> f32 {
    0.5
}

fn default_interval_modifier() -> f32 {
    1.0
}

fn default_max_interval() -> u32 {
    36500
}

fn default_leech_threshold() -> u32 {
    8
}

fn default_review_ahead_days() -> u32 {
    1
}

fn default_new_cards_per_day() -> u32 {
    20
}

fn default_reviews_per_day() -> u32 {
    100
}

impl Default for SrsSettings {
    fn default() -> Self {
        Self {
            learning_steps_minutes: default_learning_steps(),
            relearning_steps_minutes: default_relearning_steps(),
            graduating_interval_days: default_graduating_interval(),
            easy_interval_days: default_easy_interval(),
            starting_ease: default_starting_ease(),
            minimum_ease: default_minimum_ease(),
            maximum_ease: None,
            easy_bonus: default_easy_bonus(),
            hard_interval_factor: default_hard_interval_factor(),
            lapse_ease_penalty: default_lapse_ease_penalty(),
            lapse_recovery_factor: default_lapse_recovery_factor(),
            interval_modifier: default_interval_modifier(),
            max_interval_days: default_max_interval(),
            leech_threshold: default_leech_threshold(),
            leech_action: LeechAction::default(),
            new_card_order: NewCardOrder::default(),
            review_ahead: false,
            review_ahead_days: default_review_ahead_days(),
            bury_siblings: false,
            new_cards_per_day: default_new_cards_per_day(),
            max_reviews_per_day: default_reviews_per_day(),
        }
    }
}

impl SrsSettings {
    /// Check every configured range, rejecting the first violation.
    /// Run once when settings are loaded; the engine assumes validated
    /// input afterwards.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.learning_steps_minutes.is_empty() {
            return Err(SettingsError::EmptyLearningSteps);
        }
        if self.relearning_steps_minutes.is_empty() {
            return Err(SettingsError::EmptyRelearningSteps);
        }
        if self
            .learning_steps_minutes
            .iter()
            .chain(self.relearning_steps_minutes.iter())
            .any(|&m| m == 0)
        {
            return Err(SettingsError::ZeroLengthStep);
        }
        if self.graduating_interval_days < 1 {
            return Err(SettingsError::GraduatingIntervalTooShort);
        }
        if self.easy_interval_days < 1 {
            return Err(SettingsError::EasyIntervalTooShort);
        }
        if !(1.3..=5.0).contains(&self.starting_ease) {
            return Err(SettingsError::StartingEaseOutOfRange(self.starting_ease));
        }
        if self.minimum_ease < 1.3 || self.minimum_ease > self.starting_ease {
            return Err(SettingsError::MinimumEaseOutOfRange(self.minimum_ease));
        }
        if let Some(max) = self.maximum_ease {
            if max < self.starting_ease {
                return Err(SettingsError::MaximumEaseBelowStarting(max));
            }
        }
        if !(1.0..=3.0).contains(&self.easy_bonus) {
            return Err(SettingsError::EasyBonusOutOfRange(self.easy_bonus));
        }
        if !(1.0..=2.0).contains(&self.hard_interval_factor) {
            return Err(SettingsError::HardIntervalFactorOutOfRange(
                self.hard_interval_factor,
            ));
        }
        if !(0.0..=1.0).contains(&self.lapse_ease_penalty) {
            return Err(SettingsError::LapseEasePenaltyOutOfRange(
                self.lapse_ease_penalty,
            ));
        }
        if self.lapse_recovery_factor <= 0.0 || self.lapse_recovery_factor > 1.0 {
            return Err(SettingsError::LapseRecoveryFactorOutOfRange(
                self.lapse_recovery_factor,
            ));
        }
        if self.interval_modifier <= 0.0 || self.interval_modifier > 2.0 {
            return Err(SettingsError::IntervalModifierOutOfRange(
                self.interval_modifier,
            ));
        }
        if self.max_interval_days < 1 {
            return Err(SettingsError::MaxIntervalTooShort);
        }
        if !(1..=20).contains(&self.leech_threshold) {
            return Err(SettingsError::LeechThresholdOutOfRange(self.leech_threshold));
        }
        Ok(())
    }
}
