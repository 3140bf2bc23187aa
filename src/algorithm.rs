//! Review state machine
//!
//! Applies one rating to one card's review state and produces the next
//! state and due instant. Pure function of (state, rating, settings,
//! now); callers persist the result.
//!
//! Ease adjustments are the discrete kind: a fixed step down on Hard,
//! a fixed step up on Easy, the configured penalty on a lapse. On a
//! Hard rating the interval grows by the hard factor alone; ease is
//! not multiplied in.

use chrono::{DateTime, Duration, Utc};

use crate::models::{CardPhase, CardReviewState, Rating};
use crate::settings::SrsSettings;

/// Ease lost on a Hard rating of a review card
const HARD_EASE_STEP: f32 = 0.15;

/// Ease gained on an Easy rating of a review card
const EASY_EASE_STEP: f32 = 0.15;

/// Apply `rating` to `state`, producing the card's next state.
///
/// Settings are assumed validated; step indices that point past the
/// end of a step list (the list shrank between reviews) fall back to
/// the final step instead of panicking.
pub fn apply(
    state: &CardReviewState,
    rating: Rating,
    settings: &SrsSettings,
    now: DateTime<Utc>,
) -> CardReviewState {
    let mut next = state.clone();
    next.updated_at = now;

    match state.phase {
        CardPhase::New => answer_learning(&mut next, 0, rating, settings, now),
        CardPhase::Learning { step } => answer_learning(&mut next, step, rating, settings, now),
        CardPhase::Review {
            interval_days,
            ease,
            repetitions,
        } => answer_review(
            &mut next,
            interval_days,
            ease,
            repetitions,
            rating,
            settings,
            now,
        ),
        CardPhase::Relearning {
            step,
            interval_days,
            ease,
        } => answer_relearning(&mut next, step, interval_days, ease, rating, settings, now),
    }

    next
}

/// Preview the state each rating would produce, in Again..Easy order.
/// Lets the study UI show "10m / 1d / 3d / 8d" under the answer
/// buttons without committing anything.
pub fn preview(
    state: &CardReviewState,
    settings: &SrsSettings,
    now: DateTime<Utc>,
) -> [CardReviewState; 4] {
    [
        apply(state, Rating::Again, settings, now),
        apply(state, Rating::Hard, settings, now),
        apply(state, Rating::Good, settings, now),
        apply(state, Rating::Easy, settings, now),
    ]
}

fn answer_learning(
    next: &mut CardReviewState,
    step: usize,
    rating: Rating,
    settings: &SrsSettings,
    now: DateTime<Utc>,
) {
    let steps = &settings.learning_steps_minutes;

    match rating {
        Rating::Again => {
            next.phase = CardPhase::Learning { step: 0 };
            next.due = now + minutes(steps[0]);
        }
        Rating::Hard => {
            let step = step.min(steps.len() - 1);
            next.phase = CardPhase::Learning { step };
            next.due = now + minutes(steps[step]);
        }
        Rating::Good => {
            let advanced = step + 1;
            match steps.get(advanced) {
                Some(&step_minutes) => {
                    next.phase = CardPhase::Learning { step: advanced };
                    next.due = now + minutes(step_minutes);
                }
                None => graduate(next, settings.graduating_interval_days, settings, now),
            }
        }
        Rating::Easy => graduate(next, settings.easy_interval_days, settings, now),
    }
}

/// Move a card out of the learning steps into review
fn graduate(next: &mut CardReviewState, interval_days: u32, settings: &SrsSettings, now: DateTime<Utc>) {
    let interval_days = interval_days.clamp(1, settings.max_interval_days);
    next.phase = CardPhase::Review {
        interval_days,
        ease: settings.starting_ease,
        repetitions: 0,
    };
    next.due = now + days(interval_days);
}

fn answer_review(
    next: &mut CardReviewState,
    interval_days: u32,
    ease: f32,
    repetitions: u32,
    rating: Rating,
    settings: &SrsSettings,
    now: DateTime<Utc>,
) {
    match rating {
        Rating::Again => {
            // A lapse: drop ease, hold the interval as the recovery base
            next.lapses += 1;
            let ease = (ease - settings.lapse_ease_penalty).max(settings.minimum_ease);
            next.phase = CardPhase::Relearning {
                step: 0,
                interval_days,
                ease,
            };
            next.due = now + minutes(settings.relearning_steps_minutes[0]);
        }
        Rating::Hard => {
            let ease = (ease - HARD_EASE_STEP).max(settings.minimum_ease);
            let interval_days = scale_interval(interval_days, settings.hard_interval_factor, settings);
            next.phase = CardPhase::Review {
                interval_days,
                ease,
                repetitions: repetitions + 1,
            };
            next.due = now + days(interval_days);
        }
        Rating::Good => {
            let interval_days = scale_interval(interval_days, ease, settings);
            next.phase = CardPhase::Review {
                interval_days,
                ease,
                repetitions: repetitions + 1,
            };
            next.due = now + days(interval_days);
        }
        Rating::Easy => {
            // Interval grows from the pre-adjustment ease
            let interval_days =
                scale_interval(interval_days, ease * settings.easy_bonus, settings);
            let mut ease = ease + EASY_EASE_STEP;
            if let Some(max) = settings.maximum_ease {
                ease = ease.min(max);
            }
            next.phase = CardPhase::Review {
                interval_days,
                ease,
                repetitions: repetitions + 1,
            };
            next.due = now + days(interval_days);
        }
    }
}

fn answer_relearning(
    next: &mut CardReviewState,
    step: usize,
    interval_days: u32,
    ease: f32,
    rating: Rating,
    settings: &SrsSettings,
    now: DateTime<Utc>,
) {
    let steps = &settings.relearning_steps_minutes;

    match rating {
        Rating::Again => {
            next.phase = CardPhase::Relearning {
                step: 0,
                interval_days,
                ease,
            };
            next.due = now + minutes(steps[0]);
        }
        Rating::Hard => {
            let step = step.min(steps.len() - 1);
            next.phase = CardPhase::Relearning {
                step,
                interval_days,
                ease,
            };
            next.due = now + minutes(steps[step]);
        }
        Rating::Good => {
            let advanced = step + 1;
            match steps.get(advanced) {
                Some(&step_minutes) => {
                    next.phase = CardPhase::Relearning {
                        step: advanced,
                        interval_days,
                        ease,
                    };
                    next.due = now + minutes(step_minutes);
                }
                None => recover(next, interval_days, ease, settings, now),
            }
        }
        Rating::Easy => recover(next, interval_days, ease, settings, now),
    }
}

/// Return a relearned card to review at a fraction of its old interval
fn recover(
    next: &mut CardReviewState,
    interval_days: u32,
    ease: f32,
    settings: &SrsSettings,
    now: DateTime<Utc>,
) {
    let recovered = (interval_days as f32 * settings.lapse_recovery_factor).round() as u32;
    let interval_days = recovered.clamp(1, settings.max_interval_days);
    next.phase = CardPhase::Review {
        interval_days,
        ease,
        repetitions: 0,
    };
    next.due = now + days(interval_days);
}

/// Grow an interval by `factor`, apply the global modifier, and clamp
/// to [1, max]
fn scale_interval(interval_days: u32, factor: f32, settings: &SrsSettings) -> u32 {
    let scaled = (interval_days as f32 * factor * settings.interval_modifier).round() as u32;
    scaled.clamp(1, settings.max_interval_days)
}

fn minutes(m: u32) -> Duration {
    Duration::minutes(m as i64)
}

fn days(d: u32) -> Duration {
    Duration::days(d as i64)
}
