//! Mneme - spaced repetition scheduling engine
//!
//! The scheduling core of a flashcard study application:
//! - Per-card review state machine (learning steps, graduation,
//!   lapses, relearning recovery)
//! - Leech detection with suspend/tag policies
//! - Per-user daily quotas for new cards and reviews
//! - Study-queue assembly with fixed bucket precedence
//!
//! Card content, persistence technology and UI live elsewhere; the
//! engine consumes card identifiers and per-project settings through
//! injected ports and hands updated state back. `SchedulingService`
//! is the surface collaborators call.

pub mod algorithm;
pub mod clock;
pub mod leech;
pub mod models;
pub mod queue;
pub mod quota;
pub mod service;
pub mod settings;
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use models::{
    CardMeta, CardPhase, CardReviewState, DailyCounters, Rating, RatingOutcome, StudyCounts,
};
pub use queue::QueueEntry;
pub use quota::DailyQuotaTracker;
pub use service::{ScheduleError, SchedulingService};
pub use settings::{LeechAction, NewCardOrder, SettingsError, SrsSettings};
pub use storage::{CardCatalog, FileStore, MemoryStore, ReviewStore, StoreError};
