//! Daily study quotas
//!
//! Tracks per-user, per-project counters of new cards introduced and
//! reviews completed for a UTC calendar date, and refuses increments
//! that would pass the configured caps. A missing record for a date
//! counts as zero, so midnight rollover needs no reset step.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::DailyCounters;
use crate::storage::{ReviewStore, Result};

/// Enforces the per-day caps on new-card introductions and completed
/// reviews. Running out of quota is a normal outcome, reported as
/// `false`, never an error.
pub struct DailyQuotaTracker {
    store: Arc<dyn ReviewStore>,
    new_cards_per_day: u32,
    max_reviews_per_day: u32,
    // check-then-increment must not interleave between two raters
    write_lock: Mutex<()>,
}

impl DailyQuotaTracker {
    pub fn new(store: Arc<dyn ReviewStore>, new_cards_per_day: u32, max_reviews_per_day: u32) -> Self {
        Self {
            store,
            new_cards_per_day,
            max_reviews_per_day,
            write_lock: Mutex::new(()),
        }
    }

    /// The day's counters, zero-initialized if no record exists yet
    pub fn counters(&self, user_id: Uuid, project_id: Uuid, date: NaiveDate) -> Result<DailyCounters> {
        Ok(self
            .store
            .load_counters(user_id, project_id, date)?
            .unwrap_or_else(|| DailyCounters::new(user_id, project_id, date)))
    }

    /// Consume one new-card slot, unless the day's cap is already spent
    pub fn try_consume_new_slot(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();

        let mut counters = self.counters(user_id, project_id, date)?;
        if counters.new_cards_introduced >= self.new_cards_per_day {
            return Ok(false);
        }

        counters.new_cards_introduced += 1;
        self.store.save_counters(&counters)?;
        Ok(true)
    }

    /// Consume one review slot, unless the day's cap is already spent
    pub fn try_consume_review_slot(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();

        let mut counters = self.counters(user_id, project_id, date)?;
        if counters.reviews_completed >= self.max_reviews_per_day {
            return Ok(false);
        }

        counters.reviews_completed += 1;
        self.store.save_counters(&counters)?;
        Ok(true)
    }

    pub fn remaining_new_slots(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<u32> {
        let counters = self.counters(user_id, project_id, date)?;
        Ok(self
            .new_cards_per_day
            .saturating_sub(counters.new_cards_introduced))
    }

    pub fn remaining_review_slots(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<u32> {
        let counters = self.counters(user_id, project_id, date)?;
        Ok(self
            .max_reviews_per_day
            .saturating_sub(counters.reviews_completed))
    }
}
