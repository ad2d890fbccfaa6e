//! Repetition guard
//!
//! Remembers the last few kinds served per partition so the same mini-game
//! type is not handed out over and over to one parameter combination.

use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

use crate::level::LevelKind;
use crate::params::PartitionKey;
use crate::ForgeError;

/// Bounded FIFO of recently served kinds per partition.
pub trait RepetitionGuard: Send + Sync {
    /// `true` if `kind` is among the recorded kinds for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Store`] if the backing store is unavailable.
    fn is_too_recent(&self, key: &PartitionKey, kind: LevelKind) -> Result<bool, ForgeError>;

    /// Append `kind`, evicting the oldest entry when full.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Store`] if the backing store is unavailable.
    fn record(&self, key: &PartitionKey, kind: LevelKind) -> Result<(), ForgeError>;

    /// Recorded kinds for `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Store`] if the backing store is unavailable.
    fn recent(&self, key: &PartitionKey) -> Result<Vec<LevelKind>, ForgeError>;
}

/// In-memory guard keeping the last `window` kinds per partition.
pub struct MemoryRepetitionGuard {
    recent: DashMap<PartitionKey, VecDeque<LevelKind>>,
    window: usize,
}

impl MemoryRepetitionGuard {
    /// Guard remembering `window` kinds per partition.
    pub fn new(window: usize) -> Self {
        Self {
            recent: DashMap::new(),
            window,
        }
    }
}

impl RepetitionGuard for MemoryRepetitionGuard {
    fn is_too_recent(&self, key: &PartitionKey, kind: LevelKind) -> Result<bool, ForgeError> {
        Ok(self
            .recent
            .get(key)
            .map(|kinds| kinds.contains(&kind))
            .unwrap_or(false))
    }

    fn record(&self, key: &PartitionKey, kind: LevelKind) -> Result<(), ForgeError> {
        let mut kinds = self.recent.entry(key.clone()).or_default();
        kinds.push_back(kind);
        while kinds.len() > self.window {
            kinds.pop_front();
        }
        debug!(partition = %key, kind = %kind, depth = kinds.len(), "kind recorded");
        Ok(())
    }

    fn recent(&self, key: &PartitionKey) -> Result<Vec<LevelKind>, ForgeError> {
        Ok(self
            .recent
            .get(key)
            .map(|kinds| kinds.iter().copied().collect())
            .unwrap_or_default())
    }
}
