//! Scheduling service
//!
//! Composition root for the scheduling engine and the only surface
//! other subsystems call. Wires the review state machine, leech
//! detection, quota tracking and queue assembly over injected catalog,
//! storage and clock dependencies.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::models::{CardPhase, CardReviewState, Rating, RatingOutcome, StudyCounts};
use crate::queue::{self, QueueEntry};
use crate::quota::DailyQuotaTracker;
use crate::settings::{SettingsError, SrsSettings};
use crate::storage::{CardCatalog, ReviewStore, StoreError};
use crate::{algorithm, leech};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid rating value: {0} (expected 1-4)")]
    InvalidRating(i32),

    #[error("card {card_id} does not belong to project {project_id}")]
    UnknownCard { card_id: Uuid, project_id: Uuid },

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Scheduling engine for one project.
///
/// Each call loads its own state through the store, so any number of
/// callers may share the service; a concurrent write to the same card
/// surfaces as `StoreError::StaleWrite` and the caller reloads and
/// retries.
pub struct SchedulingService {
    project_id: Uuid,
    settings: SrsSettings,
    catalog: Arc<dyn CardCatalog>,
    store: Arc<dyn ReviewStore>,
    quota: DailyQuotaTracker,
    clock: Arc<dyn Clock>,
}

impl SchedulingService {
    /// Build a service over the given ports. Settings are validated
    /// here, eagerly; the engine assumes well-formed values afterwards.
    pub fn new(
        project_id: Uuid,
        settings: SrsSettings,
        catalog: Arc<dyn CardCatalog>,
        store: Arc<dyn ReviewStore>,
    ) -> Result<Self> {
        Self::with_clock(project_id, settings, catalog, store, Arc::new(SystemClock))
    }

    /// Like `new`, with an explicit clock for deterministic tests
    pub fn with_clock(
        project_id: Uuid,
        settings: SrsSettings,
        catalog: Arc<dyn CardCatalog>,
        store: Arc<dyn ReviewStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        settings.validate()?;

        let quota = DailyQuotaTracker::new(
            Arc::clone(&store),
            settings.new_cards_per_day,
            settings.max_reviews_per_day,
        );

        Ok(Self {
            project_id,
            settings,
            catalog,
            store,
            quota,
            clock,
        })
    }

    /// Assemble the ordered card list for a study session, from a
    /// snapshot of the project's current states
    pub fn build_queue(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let now = self.clock.now();
        let entries = self.load_entries(user_id)?;

        let queue = queue::build_queue(
            &entries,
            &self.settings,
            &self.quota,
            user_id,
            self.project_id,
            now,
        )?;

        log::info!(
            "built queue of {} cards for user {} in project {}",
            queue.len(),
            user_id,
            self.project_id
        );
        Ok(queue)
    }

    /// Apply one answer rating (1-4) to a card and persist the result.
    ///
    /// Consumes a new-card slot the first time a card leaves New and a
    /// review slot for every review-state rating. A concurrent write
    /// to the same card fails with `StaleWrite`; reload and retry.
    pub fn rate(&self, user_id: Uuid, card_id: Uuid, rating: i32) -> Result<RatingOutcome> {
        let rating = Rating::from_value(rating).ok_or(ScheduleError::InvalidRating(rating))?;

        if self.catalog.card_meta(self.project_id, card_id)?.is_none() {
            return Err(ScheduleError::UnknownCard {
                card_id,
                project_id: self.project_id,
            });
        }

        let now = self.clock.now();
        let current = self
            .store
            .load_state(user_id, self.project_id, card_id)?
            .unwrap_or_else(|| CardReviewState::new(card_id, now));
        let loaded_version = current.version;

        let was_new = current.phase.is_new();
        let was_review = matches!(current.phase, CardPhase::Review { .. });

        let mut next = algorithm::apply(&current, rating, &self.settings, now);
        if was_review && rating == Rating::Again {
            next = leech::check(&next, &self.settings);
        }

        // Persist first: a stale write must abort before any quota is
        // spent
        next.version = loaded_version + 1;
        self.store
            .save_state(user_id, self.project_id, &next, loaded_version)?;

        let date = now.date_naive();
        if was_new && !self.quota.try_consume_new_slot(user_id, self.project_id, date)? {
            // The queue should not have offered the card; record the
            // review anyway rather than losing the answer
            log::warn!("new-card quota already spent for user {} on {}", user_id, date);
        }
        if was_review && !self.quota.try_consume_review_slot(user_id, self.project_id, date)? {
            log::warn!("review quota already spent for user {} on {}", user_id, date);
        }

        log::debug!(
            "card {} rated {:?}: {:?}, due {}",
            card_id,
            rating,
            next.phase,
            next.due
        );

        let counters = self.quota.counters(user_id, self.project_id, date)?;
        Ok(RatingOutcome {
            state: next,
            counters,
        })
    }

    /// Per-user card counts for dashboard display; derived, never
    /// stored
    pub fn study_counts(&self, user_id: Uuid) -> Result<StudyCounts> {
        let now = self.clock.now();
        let entries = self.load_entries(user_id)?;

        let mut counts = StudyCounts {
            total_cards: entries.len(),
            ..Default::default()
        };

        for entry in &entries {
            match &entry.state {
                None => counts.new_cards += 1,
                Some(state) if state.suspended => counts.suspended_cards += 1,
                Some(state) => {
                    match state.phase {
                        CardPhase::New => counts.new_cards += 1,
                        CardPhase::Learning { .. } | CardPhase::Relearning { .. } => {
                            counts.learning_cards += 1
                        }
                        CardPhase::Review { .. } => counts.review_cards += 1,
                    }
                    if state.is_due(now) {
                        counts.due_cards += 1;
                    }
                }
            }
        }

        Ok(counts)
    }

    pub fn settings(&self) -> &SrsSettings {
        &self.settings
    }

    fn load_entries(&self, user_id: Uuid) -> Result<Vec<QueueEntry>> {
        let metas = self.catalog.project_cards(self.project_id)?;
        let mut entries = Vec::with_capacity(metas.len());
        for meta in metas {
            let state = self
                .store
                .load_state(user_id, self.project_id, meta.card_id)?;
            entries.push(QueueEntry { meta, state });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::CardMeta;
    use crate::settings::LeechAction;
    use crate::storage::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        service: SchedulingService,
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        project: Uuid,
        user: Uuid,
        cards: Vec<Uuid>,
    }

    fn fixture_with(settings: SrsSettings, card_count: i32) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(start()));
        let project = Uuid::new_v4();
        let user = Uuid::new_v4();

        let mut cards = Vec::new();
        for i in 0..card_count {
            let card_id = Uuid::new_v4();
            store.add_card(project, CardMeta::new(card_id, i));
            cards.push(card_id);
        }

        let service = SchedulingService::with_clock(
            project,
            settings,
            Arc::clone(&store) as Arc<dyn CardCatalog>,
            Arc::clone(&store) as Arc<dyn ReviewStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap();

        Fixture {
            service,
            store,
            clock,
            project,
            user,
            cards,
        }
    }

    fn fixture(card_count: i32) -> Fixture {
        fixture_with(SrsSettings::default(), card_count)
    }

    #[test]
    fn test_invalid_settings_rejected_at_construction() {
        let store = Arc::new(MemoryStore::new());
        let result = SchedulingService::new(
            Uuid::new_v4(),
            SrsSettings {
                leech_threshold: 0,
                ..Default::default()
            },
            Arc::clone(&store) as Arc<dyn CardCatalog>,
            store as Arc<dyn ReviewStore>,
        );
        assert!(matches!(result, Err(ScheduleError::InvalidSettings(_))));
    }

    #[test]
    fn test_invalid_rating_rejected_without_mutation() {
        let f = fixture(1);
        let result = f.service.rate(f.user, f.cards[0], 7);
        assert!(matches!(result, Err(ScheduleError::InvalidRating(7))));

        // Nothing was materialized
        assert!(f
            .store
            .load_state(f.user, f.project, f.cards[0])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unknown_card_rejected() {
        let f = fixture(1);
        let stranger = Uuid::new_v4();
        let result = f.service.rate(f.user, stranger, 3);
        assert!(matches!(result, Err(ScheduleError::UnknownCard { .. })));
    }

    #[test]
    fn test_rating_new_card_materializes_state_and_spends_slot() {
        let f = fixture(2);

        let outcome = f.service.rate(f.user, f.cards[0], 3).unwrap();
        assert_eq!(outcome.state.phase, CardPhase::Learning { step: 1 });
        assert_eq!(outcome.state.version, 1);
        assert_eq!(outcome.counters.new_cards_introduced, 1);
        assert_eq!(outcome.counters.reviews_completed, 0);

        let stored = f
            .store
            .load_state(f.user, f.project, f.cards[0])
            .unwrap()
            .unwrap();
        assert_eq!(stored.phase, CardPhase::Learning { step: 1 });
    }

    #[test]
    fn test_learning_rating_spends_no_further_slots() {
        let f = fixture(1);

        f.service.rate(f.user, f.cards[0], 3).unwrap();
        let outcome = f.service.rate(f.user, f.cards[0], 3).unwrap();

        // Second rating: already in learning, no longer a new card
        assert_eq!(outcome.counters.new_cards_introduced, 1);
        assert_eq!(outcome.counters.reviews_completed, 0);
        assert_eq!(outcome.state.version, 2);
    }

    #[test]
    fn test_review_rating_spends_review_slot() {
        let f = fixture(1);

        // Graduate straight to review, then answer once more
        f.service.rate(f.user, f.cards[0], 4).unwrap();
        f.clock.advance(Duration::days(4));
        let outcome = f.service.rate(f.user, f.cards[0], 3).unwrap();

        assert_eq!(outcome.counters.reviews_completed, 1);
        assert!(matches!(outcome.state.phase, CardPhase::Review { .. }));
    }

    #[test]
    fn test_full_study_round_trip() {
        let f = fixture(3);

        let queue = f.service.build_queue(f.user).unwrap();
        assert_eq!(queue.len(), 3, "all cards start in the new bucket");
        assert_eq!(queue, f.cards, "fifo keeps creation order");

        for card_id in &queue {
            f.service.rate(f.user, *card_id, 3).unwrap();
        }

        let counts = f.service.study_counts(f.user).unwrap();
        assert_eq!(counts.learning_cards, 3);
        assert_eq!(counts.new_cards, 0);

        // Steps are minutes away; nothing is due this instant
        assert!(f.service.build_queue(f.user).unwrap().is_empty());

        f.clock.advance(Duration::minutes(15));
        let queue = f.service.build_queue(f.user).unwrap();
        assert_eq!(queue.len(), 3, "learning steps became due");
    }

    #[test]
    fn test_new_quota_limits_queue_next_build() {
        let f = fixture_with(
            SrsSettings {
                new_cards_per_day: 2,
                ..Default::default()
            },
            5,
        );

        let queue = f.service.build_queue(f.user).unwrap();
        assert_eq!(queue.len(), 2);

        f.service.rate(f.user, queue[0], 3).unwrap();
        f.service.rate(f.user, queue[1], 3).unwrap();

        // Quota spent: no new cards today, learning cards not yet due
        assert!(f.service.build_queue(f.user).unwrap().is_empty());

        // Tomorrow the remaining new cards surface again
        f.clock.advance(Duration::days(1));
        let queue = f.service.build_queue(f.user).unwrap();
        assert_eq!(queue.len(), 4, "2 due learning + 2 fresh new");
    }

    #[test]
    fn test_leech_suspension_through_service() {
        let f = fixture_with(
            SrsSettings {
                leech_threshold: 2,
                relearning_steps_minutes: vec![10],
                ..Default::default()
            },
            1,
        );
        let card = f.cards[0];

        // Into review, then lapse-recover-lapse until the threshold
        f.service.rate(f.user, card, 4).unwrap();
        f.clock.advance(Duration::days(4));

        let outcome = f.service.rate(f.user, card, 1).unwrap();
        assert_eq!(outcome.state.lapses, 1);
        assert!(!outcome.state.suspended, "one lapse below threshold");

        f.clock.advance(Duration::minutes(10));
        f.service.rate(f.user, card, 3).unwrap(); // recover to review
        f.clock.advance(Duration::days(1));

        let outcome = f.service.rate(f.user, card, 1).unwrap();
        assert_eq!(outcome.state.lapses, 2);
        assert!(outcome.state.suspended, "threshold reached");

        // Suspended cards disappear from the queue
        assert!(f.service.build_queue(f.user).unwrap().is_empty());
    }

    #[test]
    fn test_leech_tag_keeps_card_in_rotation() {
        let f = fixture_with(
            SrsSettings {
                leech_threshold: 1,
                leech_action: LeechAction::Tag,
                ..Default::default()
            },
            1,
        );
        let card = f.cards[0];

        f.service.rate(f.user, card, 4).unwrap();
        f.clock.advance(Duration::days(4));
        let outcome = f.service.rate(f.user, card, 1).unwrap();

        assert!(outcome.state.leech);
        assert!(!outcome.state.suspended);

        // Still scheduled: the relearning step is due after 10 minutes
        f.clock.advance(Duration::minutes(10));
        assert_eq!(f.service.build_queue(f.user).unwrap(), vec![card]);
    }

    /// Store double that lets a competing session write the same card
    /// between this session's load and save
    struct ContendedStore {
        inner: MemoryStore,
        raced: Mutex<bool>,
    }

    impl ReviewStore for ContendedStore {
        fn load_state(
            &self,
            user_id: Uuid,
            project_id: Uuid,
            card_id: Uuid,
        ) -> crate::storage::Result<Option<CardReviewState>> {
            self.inner.load_state(user_id, project_id, card_id)
        }

        fn save_state(
            &self,
            user_id: Uuid,
            project_id: Uuid,
            state: &CardReviewState,
            expected_version: u64,
        ) -> crate::storage::Result<()> {
            let mut raced = self.raced.lock().unwrap();
            if !*raced {
                *raced = true;
                // The other tab answers first
                let mut winner = state.clone();
                winner.version = expected_version + 1;
                self.inner
                    .save_state(user_id, project_id, &winner, expected_version)?;
            }
            self.inner.save_state(user_id, project_id, state, expected_version)
        }

        fn load_counters(
            &self,
            user_id: Uuid,
            project_id: Uuid,
            date: chrono::NaiveDate,
        ) -> crate::storage::Result<Option<crate::models::DailyCounters>> {
            self.inner.load_counters(user_id, project_id, date)
        }

        fn save_counters(
            &self,
            counters: &crate::models::DailyCounters,
        ) -> crate::storage::Result<()> {
            self.inner.save_counters(counters)
        }
    }

    #[test]
    fn test_concurrent_write_surfaces_as_stale_write() {
        let catalog = Arc::new(MemoryStore::new());
        let store = Arc::new(ContendedStore {
            inner: MemoryStore::new(),
            raced: Mutex::new(false),
        });
        let project = Uuid::new_v4();
        let user = Uuid::new_v4();
        let card = Uuid::new_v4();
        catalog.add_card(project, CardMeta::new(card, 0));

        let service = SchedulingService::with_clock(
            project,
            SrsSettings::default(),
            catalog as Arc<dyn CardCatalog>,
            Arc::clone(&store) as Arc<dyn ReviewStore>,
            Arc::new(FixedClock::new(start())) as Arc<dyn Clock>,
        )
        .unwrap();

        let result = service.rate(user, card, 3);
        assert!(matches!(
            result,
            Err(ScheduleError::Store(StoreError::StaleWrite { .. }))
        ));

        // A retry reloads the winning state and succeeds
        assert!(service.rate(user, card, 3).is_ok());
    }

    #[test]
    fn test_queue_idempotent_without_ratings() {
        let f = fixture_with(
            SrsSettings {
                new_card_order: crate::settings::NewCardOrder::Random,
                ..Default::default()
            },
            8,
        );

        let first = f.service.build_queue(f.user).unwrap();
        let second = f.service.build_queue(f.user).unwrap();
        assert_eq!(first, second, "same snapshot and instant, same queue");
    }

    #[test]
    fn test_study_counts_cover_all_phases() {
        let f = fixture(4);

        // One learning, one review, one suspended-by-leech stays new
        f.service.rate(f.user, f.cards[0], 3).unwrap(); // learning
        f.service.rate(f.user, f.cards[1], 4).unwrap(); // review
        let mut suspended = f
            .store
            .load_state(f.user, f.project, f.cards[1])
            .unwrap()
            .unwrap();
        // fabricate a suspended third card
        suspended.card_id = f.cards[2];
        suspended.suspended = true;
        suspended.version = 1;
        f.store
            .save_state(f.user, f.project, &suspended, 0)
            .unwrap();

        let counts = f.service.study_counts(f.user).unwrap();
        assert_eq!(counts.total_cards, 4);
        assert_eq!(counts.new_cards, 1);
        assert_eq!(counts.learning_cards, 1);
        assert_eq!(counts.review_cards, 1);
        assert_eq!(counts.suspended_cards, 1);
    }
}
