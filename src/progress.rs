//! Learner progress, kept in an injected key-value store and keyed by
//! username. The story pipeline never touches this; handlers report
//! outcomes here after the fact.

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{collections::{BTreeMap, HashMap}, sync::Arc};
use thiserror::Error;
use tracing::warn;

const KEY_PREFIX: &str = "rupayasaathi_progress";
const HISTORY_DAYS: usize = 30;
const POINTS_PER_CORRECT: u64 = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    Write(String),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    pub completed: u64,
    pub correct_answers: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub stories_completed: u64,
    pub score: u64,
    pub accuracy: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProgress {
    pub username: String,
    pub total_stories_generated: u64,
    pub stories_completed: u64,
    pub total_questions_answered: u64,
    pub correct_answers: u64,
    pub incorrect_answers: u64,
    pub score: u64,
    pub daily_stories_completed: u64,
    pub last_completion_date: Option<NaiveDate>,
    pub daily_streak: u64,
    pub last_active_date: Option<NaiveDate>,
    pub story_difficulty_stats: BTreeMap<String, DifficultyStats>,
    pub history: Vec<HistoryEntry>,
}

impl UserProgress {
    fn new(username: &str) -> Self {
        Self { username: username.to_string(), ..Self::default() }
    }

    /// Percentage of answered questions that were correct, 0..=100.
    pub fn accuracy(&self) -> f64 {
        if self.total_questions_answered == 0 {
            return 0.0;
        }
        (self.correct_answers as f64 / self.total_questions_answered as f64 * 100.0).min(100.0)
    }

    /// Percentage of the current batch completed, 0..=100.
    pub fn progress_percent(&self) -> f64 {
        if self.total_stories_generated == 0 {
            return 0.0;
        }
        (self.stories_completed as f64 / self.total_stories_generated as f64 * 100.0).min(100.0)
    }

    fn touch_streak(&mut self, today: NaiveDate) {
        if self.last_active_date == Some(today) {
            return;
        }
        let yesterday = today.pred_opt();
        self.daily_streak = if self.last_active_date.is_some() && self.last_active_date == yesterday {
            self.daily_streak + 1
        } else {
            1
        };
        self.last_active_date = Some(today);
    }

    fn upsert_history(&mut self, today: NaiveDate) {
        if self.last_completion_date != Some(today) {
            self.daily_stories_completed = 0;
        }
        let entry = HistoryEntry {
            date: today,
            stories_completed: self.daily_stories_completed,
            score: self.score,
            accuracy: self.accuracy(),
        };
        match self.history.iter_mut().find(|h| h.date == today) {
            Some(existing) => *existing = entry,
            None => self.history.push(entry),
        }
        self.history.sort_by(|a, b| b.date.cmp(&a.date));
        self.history.truncate(HISTORY_DAYS);
    }
}

/// Progress plus derived percentages, as served to the dashboard.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub progress: UserProgress,
    pub accuracy: f64,
    pub progress_percent: f64,
}

impl From<UserProgress> for ProgressSnapshot {
    fn from(progress: UserProgress) -> Self {
        Self { accuracy: progress.accuracy(), progress_percent: progress.progress_percent(), progress }
    }
}

pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct ProgressTracker {
    store: Arc<dyn KeyValueStore>,
    today: Clock,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(|| Utc::now().date_naive()))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, today: Clock) -> Self {
        Self { store, today, write_lock: Mutex::new(()) }
    }

    fn key(username: &str) -> String {
        format!("{KEY_PREFIX}:{username}")
    }

    fn load(&self, username: &str) -> UserProgress {
        let Some(raw) = self.store.get(&Self::key(username)) else {
            return UserProgress::new(username);
        };
        match serde_json::from_str::<UserProgress>(&raw) {
            Ok(mut progress) => {
                progress.username = username.to_string();
                progress
            }
            Err(e) => {
                warn!(%username, error = %e, "⚠️ Stored progress unreadable, starting fresh");
                UserProgress::new(username)
            }
        }
    }

    fn save(&self, progress: &UserProgress) -> Result<(), StoreError> {
        let raw = serde_json::to_string(progress).map_err(|e| StoreError::Write(e.to_string()))?;
        self.store.set(&Self::key(&progress.username), raw)
    }

    fn update(&self, username: &str, apply: impl FnOnce(&mut UserProgress, NaiveDate)) -> Result<ProgressSnapshot, StoreError> {
        let _guard = self.write_lock.lock();
        let today = (self.today)();
        let mut progress = self.load(username);
        apply(&mut progress, today);
        self.save(&progress)?;
        Ok(self.view(progress, today))
    }

    fn view(&self, mut progress: UserProgress, today: NaiveDate) -> ProgressSnapshot {
        if progress.last_completion_date != Some(today) {
            progress.daily_stories_completed = 0;
        }
        progress.into()
    }

    pub fn snapshot(&self, username: &str) -> ProgressSnapshot {
        self.view(self.load(username), (self.today)())
    }

    /// A new batch of `count` stories was served; per-batch counters restart.
    pub fn start_batch(&self, username: &str, count: u64) -> Result<ProgressSnapshot, StoreError> {
        self.update(username, |p, _| {
            p.total_stories_generated = count;
            p.stories_completed = 0;
            p.total_questions_answered = 0;
            p.correct_answers = 0;
            p.incorrect_answers = 0;
        })
    }

    pub fn record_answer(&self, username: &str, correct: bool, difficulty: &str) -> Result<ProgressSnapshot, StoreError> {
        self.update(username, |p, today| {
            p.total_questions_answered += 1;
            let stats = p.story_difficulty_stats.entry(difficulty.to_string()).or_default();
            if correct {
                p.correct_answers += 1;
                p.score += POINTS_PER_CORRECT;
                stats.correct_answers += 1;
            } else {
                p.incorrect_answers += 1;
            }
            p.touch_streak(today);
            p.upsert_history(today);
        })
    }

    /// Marks one story of the current batch done. Ignored when no batch is
    /// active or the batch is already complete.
    pub fn complete_story(&self, username: &str, difficulty: &str) -> Result<ProgressSnapshot, StoreError> {
        self.update(username, |p, today| {
            let next = (p.stories_completed + 1).min(p.total_stories_generated);
            if p.total_stories_generated == 0 || next == p.stories_completed {
                return;
            }
            p.stories_completed = next;
            p.daily_stories_completed = if p.last_completion_date == Some(today) { p.daily_stories_completed + 1 } else { 1 };
            p.last_completion_date = Some(today);
            p.story_difficulty_stats.entry(difficulty.to_string()).or_default().completed += 1;
            p.touch_streak(today);
            p.upsert_history(today);
        })
    }
}
