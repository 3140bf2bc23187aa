//! Study queue assembly
//!
//! Builds the ordered card list for one study session from a snapshot
//! of a project's review states. Bucket precedence is fixed: due
//! learning/relearning cards first (they are time-sensitive and are
//! never starved by quotas), then due reviews, then new cards up to
//! the day's remaining quota.
//!
//! The result reflects the snapshot it was built from; rating cards
//! and rebuilding may yield a different queue.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use uuid::Uuid;

use crate::models::{CardMeta, CardPhase, CardReviewState};
use crate::quota::DailyQuotaTracker;
use crate::settings::{NewCardOrder, SrsSettings};
use crate::storage::Result;

/// One card in the snapshot a queue is built from; `state` is `None`
/// for cards never studied by this user
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub meta: CardMeta,
    pub state: Option<CardReviewState>,
}

/// Assemble the session queue for `user_id` from a snapshot of the
/// project's cards.
pub fn build_queue(
    entries: &[QueueEntry],
    settings: &SrsSettings,
    quota: &DailyQuotaTracker,
    user_id: Uuid,
    project_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>> {
    let review_horizon = if settings.review_ahead {
        now + Duration::days(settings.review_ahead_days as i64)
    } else {
        now
    };

    let mut learning: Vec<&QueueEntry> = Vec::new();
    let mut review: Vec<&QueueEntry> = Vec::new();
    let mut fresh: Vec<&QueueEntry> = Vec::new();

    for entry in entries {
        match &entry.state {
            // Never studied: the virtual New default
            None => fresh.push(entry),
            Some(state) if state.suspended => {}
            Some(state) => match state.phase {
                CardPhase::New => fresh.push(entry),
                CardPhase::Learning { .. } | CardPhase::Relearning { .. } => {
                    if state.due <= now {
                        learning.push(entry);
                    }
                }
                CardPhase::Review { .. } => {
                    if state.due <= review_horizon {
                        review.push(entry);
                    }
                }
            },
        }
    }

    // Most overdue first; position breaks ties so assembly is stable
    learning.sort_by_key(|e| (due_of(e), e.meta.position));
    review.sort_by_key(|e| (due_of(e), e.meta.position));

    let review_budget = quota.remaining_review_slots(user_id, project_id, now.date_naive())?;
    review.truncate(review_budget as usize);

    fresh.sort_by_key(|e| e.meta.position);
    if settings.new_card_order == NewCardOrder::Random {
        // Seeded from the session instant: the same snapshot and clock
        // reproduce the same shuffle
        let mut rng = StdRng::seed_from_u64(now.timestamp() as u64);
        fresh.shuffle(&mut rng);
    }
    let new_budget = quota.remaining_new_slots(user_id, project_id, now.date_naive())?;
    fresh.truncate(new_budget as usize);

    let mut queue: Vec<&CardMeta> = learning
        .iter()
        .chain(review.iter())
        .chain(fresh.iter())
        .map(|e| &e.meta)
        .collect();

    if settings.bury_siblings {
        queue = bury_siblings(queue);
    }

    log::debug!(
        "assembled queue for user {}: {} learning, {} review, {} new",
        user_id,
        learning.len(),
        review.len(),
        fresh.len()
    );

    Ok(queue.into_iter().map(|m| m.card_id).collect())
}

fn due_of(entry: &QueueEntry) -> DateTime<Utc> {
    // Callers only sort buckets built from entries that carry a state
    entry
        .state
        .as_ref()
        .map(|s| s.due)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Keep only the first card of each sibling group, in queue order
fn bury_siblings(queue: Vec<&CardMeta>) -> Vec<&CardMeta> {
    let mut seen_groups: HashSet<Uuid> = HashSet::new();
    queue
        .into_iter()
        .filter(|meta| match meta.sibling_group {
            Some(group) => seen_groups.insert(group),
            None => true,
        })
        .collect()
}
