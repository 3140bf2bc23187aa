//! Storage ports and reference implementations
//!
//! The engine reads card identity from a `CardCatalog` and persists
//! review state and quota counters through a `ReviewStore`; both are
//! injected so the core stays testable without any app state.
//!
//! `FileStore` directory structure per project:
//! ```text
//! {root}/{project-id}/
//! ├── cards.json                    # CardMeta list in creation order
//! ├── states/{user-id}/{card-id}.json
//! └── counters/{user-id}/{date}.json
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CardMeta, CardReviewState, DailyCounters};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("card not found: {0}")]
    CardNotFound(Uuid),

    #[error("stale write for card {card_id}: stored version {stored}, expected {expected}")]
    StaleWrite {
        card_id: Uuid,
        stored: u64,
        expected: u64,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// The flashcard store's face: which cards exist in a project, in
/// creation order
pub trait CardCatalog: Send + Sync {
    fn project_cards(&self, project_id: Uuid) -> Result<Vec<CardMeta>>;

    fn card_meta(&self, project_id: Uuid, card_id: Uuid) -> Result<Option<CardMeta>>;
}

/// Persistence port for review state and daily counters.
///
/// `save_state` is a compare-and-swap: the write is rejected with
/// `StaleWrite` unless the stored version still matches
/// `expected_version` (0 for a card with no record). Counter writes
/// have a single writer, the quota tracker, and need no version.
pub trait ReviewStore: Send + Sync {
    fn load_state(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        card_id: Uuid,
    ) -> Result<Option<CardReviewState>>;

    fn save_state(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        state: &CardReviewState,
        expected_version: u64,
    ) -> Result<()>;

    fn load_counters(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyCounters>>;

    fn save_counters(&self, counters: &DailyCounters) -> Result<()>;
}

// ==================== In-memory implementation ====================

type StateKey = (Uuid, Uuid, Uuid);
type CounterKey = (Uuid, Uuid, NaiveDate);

/// Hash-map backed implementation of both ports; the default for
/// embedding and the engine's test double
#[derive(Default)]
pub struct MemoryStore {
    cards: Mutex<HashMap<Uuid, Vec<CardMeta>>>,
    states: Mutex<HashMap<StateKey, CardReviewState>>,
    counters: Mutex<HashMap<CounterKey, DailyCounters>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card in a project's catalog
    pub fn add_card(&self, project_id: Uuid, meta: CardMeta) {
        let mut cards = self.cards.lock().unwrap();
        cards.entry(project_id).or_default().push(meta);
    }
}

impl CardCatalog for MemoryStore {
    fn project_cards(&self, project_id: Uuid) -> Result<Vec<CardMeta>> {
        let cards = self.cards.lock().unwrap();
        let mut metas = cards.get(&project_id).cloned().unwrap_or_default();
        metas.sort_by_key(|m| m.position);
        Ok(metas)
    }

    fn card_meta(&self, project_id: Uuid, card_id: Uuid) -> Result<Option<CardMeta>> {
        let cards = self.cards.lock().unwrap();
        Ok(cards
            .get(&project_id)
            .and_then(|metas| metas.iter().find(|m| m.card_id == card_id).cloned()))
    }
}

impl ReviewStore for MemoryStore {
    fn load_state(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        card_id: Uuid,
    ) -> Result<Option<CardReviewState>> {
        let states = self.states.lock().unwrap();
        Ok(states.get(&(user_id, project_id, card_id)).cloned())
    }

    fn save_state(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        state: &CardReviewState,
        expected_version: u64,
    ) -> Result<()> {
        let mut states = self.states.lock().unwrap();
        let key = (user_id, project_id, state.card_id);
        let stored = states.get(&key).map(|s| s.version).unwrap_or(0);
        if stored != expected_version {
            return Err(StoreError::StaleWrite {
                card_id: state.card_id,
                stored,
                expected: expected_version,
            });
        }
        states.insert(key, state.clone());
        Ok(())
    }

    fn load_counters(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyCounters>> {
        let counters = self.counters.lock().unwrap();
        Ok(counters.get(&(user_id, project_id, date)).cloned())
    }

    fn save_counters(&self, counters: &DailyCounters) -> Result<()> {
        let mut map = self.counters.lock().unwrap();
        map.insert(
            (counters.user_id, counters.project_id, counters.date),
            counters.clone(),
        );
        Ok(())
    }
}

// ==================== File implementation ====================

/// JSON-file implementation of both ports, one file per record
pub struct FileStore {
    root: PathBuf,
    // save_state reads, compares and rewrites; the lock keeps two
    // writers from interleaving between those steps
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn project_dir(&self, project_id: Uuid) -> PathBuf {
        self.root.join(project_id.to_string())
    }

    fn cards_path(&self, project_id: Uuid) -> PathBuf {
        self.project_dir(project_id).join("cards.json")
    }

    fn states_dir(&self, project_id: Uuid, user_id: Uuid) -> PathBuf {
        self.project_dir(project_id)
            .join("states")
            .join(user_id.to_string())
    }

    fn state_path(&self, project_id: Uuid, user_id: Uuid, card_id: Uuid) -> PathBuf {
        self.states_dir(project_id, user_id)
            .join(format!("{}.json", card_id))
    }

    fn counters_dir(&self, project_id: Uuid, user_id: Uuid) -> PathBuf {
        self.project_dir(project_id)
            .join("counters")
            .join(user_id.to_string())
    }

    fn counters_path(&self, project_id: Uuid, user_id: Uuid, date: NaiveDate) -> PathBuf {
        self.counters_dir(project_id, user_id)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Create the project's directory skeleton and an empty catalog
    pub fn init(&self, project_id: Uuid) -> Result<()> {
        fs::create_dir_all(self.project_dir(project_id))?;

        let cards_path = self.cards_path(project_id);
        if !cards_path.exists() {
            let empty: Vec<CardMeta> = Vec::new();
            fs::write(&cards_path, serde_json::to_string_pretty(&empty)?)?;
        }

        Ok(())
    }

    /// Append a card to the project catalog
    pub fn add_card(&self, project_id: Uuid, meta: CardMeta) -> Result<()> {
        self.init(project_id)?;

        let mut metas = self.project_cards(project_id)?;
        metas.push(meta);
        fs::write(
            self.cards_path(project_id),
            serde_json::to_string_pretty(&metas)?,
        )?;

        Ok(())
    }
}

impl CardCatalog for FileStore {
    fn project_cards(&self, project_id: Uuid) -> Result<Vec<CardMeta>> {
        let cards_path = self.cards_path(project_id);
        if !cards_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&cards_path)?;
        let mut metas: Vec<CardMeta> = serde_json::from_str(&content)?;
        metas.sort_by_key(|m| m.position);
        Ok(metas)
    }

    fn card_meta(&self, project_id: Uuid, card_id: Uuid) -> Result<Option<CardMeta>> {
        let metas = self.project_cards(project_id)?;
        Ok(metas.into_iter().find(|m| m.card_id == card_id))
    }
}

impl ReviewStore for FileStore {
    fn load_state(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        card_id: Uuid,
    ) -> Result<Option<CardReviewState>> {
        let path = self.state_path(project_id, user_id, card_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let state: CardReviewState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    fn save_state(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        state: &CardReviewState,
        expected_version: u64,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();

        let stored = self
            .load_state(user_id, project_id, state.card_id)?
            .map(|s| s.version)
            .unwrap_or(0);
        if stored != expected_version {
            return Err(StoreError::StaleWrite {
                card_id: state.card_id,
                stored,
                expected: expected_version,
            });
        }

        fs::create_dir_all(self.states_dir(project_id, user_id))?;
        fs::write(
            self.state_path(project_id, user_id, state.card_id),
            serde_json::to_string_pretty(state)?,
        )?;

        Ok(())
    }

    fn load_counters(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<DailyCounters>> {
        let path = self.counters_path(project_id, user_id, date);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let counters: DailyCounters = serde_json::from_str(&content)?;
        Ok(Some(counters))
    }

    fn save_counters(&self, counters: &DailyCounters) -> Result<()> {
        fs::create_dir_all(self.counters_dir(counters.project_id, counters.user_id))?;
        fs::write(
            self.counters_path(counters.project_id, counters.user_id, counters.date),
            serde_json::to_string_pretty(counters)?,
        )?;

        Ok(())
    }
}
