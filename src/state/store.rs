//! Sharded subject → state map. One subject is locked per event; distinct subjects in
//! different shards proceed in parallel.

use super::EntityState;
use crate::config::StoreConfig;
use crate::error::ConfigError;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;

pub struct EntityStateStore {
    subjects: DashMap<String, EntityState>,
}

/// Exclusive access to one subject's state for the duration of one event.
///
/// Dropping the handle without calling [`SubjectHandle::commit`] leaves the state untouched.
/// The holder must not call back into the store while the handle is alive.
pub struct SubjectHandle<'a> {
    entry: RefMut<'a, String, EntityState>,
}

impl SubjectHandle<'_> {
    pub fn subject_id(&self) -> &str {
        self.entry.key()
    }

    pub fn state(&self) -> &EntityState {
        self.entry.value()
    }

    /// Apply the whole update for one event. `update` must not fail part-way.
    pub fn commit<R>(mut self, update: impl FnOnce(&mut EntityState) -> R) -> R {
        update(self.entry.value_mut())
    }
}

impl EntityStateStore {
    pub fn new(config: &StoreConfig) -> Result<Self, ConfigError> {
        if config.shards < 2 || !config.shards.is_power_of_two() {
            return Err(ConfigError::InvalidShardCount(config.shards));
        }
        Ok(Self {
            subjects: DashMap::with_shard_amount(config.shards),
        })
    }

    /// Lock the subject's state, creating an empty one on first sight.
    pub fn get_or_create(&self, subject_id: &str) -> SubjectHandle<'_> {
        let entry = match self.subjects.get_mut(subject_id) {
            Some(entry) => entry,
            None => self.subjects.entry(subject_id.to_string()).or_default(),
        };
        SubjectHandle { entry }
    }

    /// Copy of a subject's state, for inspection.
    pub fn snapshot(&self, subject_id: &str) -> Option<EntityState> {
        self.subjects.get(subject_id).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl Default for EntityStateStore {
    fn default() -> Self {
        Self {
            subjects: DashMap::new(),
        }
    }
}
