//! Credential pools and per-batch rotation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{CredentialEntry, CredentialError};

/// Ordered list of credentials of one kind.
///
/// The persisted pool is only changed by [`add`](Self::add),
/// [`remove`](Self::remove) and [`select`](Self::select). Publishing batches
/// rotate over a [`RotationQueue`] obtained from [`working_copy`](Self::working_copy).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPool {
    secrets: Vec<String>,
    #[serde(default)]
    active_index: usize,
}

impl CredentialPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_secrets<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secrets: secrets.into_iter().map(Into::into).collect(),
            active_index: 0,
        }
    }

    /// Append a credential. Blank input is rejected.
    pub fn add(&mut self, secret: impl Into<String>) -> Result<CredentialEntry, CredentialError> {
        let secret = secret.into().trim().to_string();
        if secret.is_empty() {
            return Err(CredentialError::Empty);
        }
        self.secrets.push(secret.clone());
        Ok(CredentialEntry::new(self.secrets.len() - 1, secret))
    }

    /// Remove the credential at `index`.
    ///
    /// If the active selection falls off the end it resets to the first entry.
    pub fn remove(&mut self, index: usize) -> Result<CredentialEntry, CredentialError> {
        if index >= self.secrets.len() {
            return Err(CredentialError::IndexOutOfRange {
                index,
                len: self.secrets.len(),
            });
        }
        let secret = self.secrets.remove(index);
        if self.active_index >= self.secrets.len() {
            self.active_index = 0;
        }
        Ok(CredentialEntry::new(index, secret))
    }

    /// Pick the credential used by operations that need exactly one.
    pub fn select(&mut self, index: usize) -> Result<(), CredentialError> {
        if index >= self.secrets.len() {
            return Err(CredentialError::IndexOutOfRange {
                index,
                len: self.secrets.len(),
            });
        }
        self.active_index = index;
        Ok(())
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active(&self) -> Option<CredentialEntry> {
        self.secrets
            .get(self.active_index)
            .map(|s| CredentialEntry::new(self.active_index, s.clone()))
    }

    pub fn entries(&self) -> Vec<CredentialEntry> {
        self.secrets
            .iter()
            .enumerate()
            .map(|(i, s)| CredentialEntry::new(i, s.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Owned copy for one batch run.
    pub fn working_copy(&self) -> RotationQueue {
        RotationQueue {
            entries: self.entries().into(),
        }
    }
}

/// Session-scoped consumable view of a pool.
///
/// Failed credentials are discarded from the front; nothing flows back into
/// the pool the queue was copied from.
#[derive(Debug, Clone, Default)]
pub struct RotationQueue {
    entries: VecDeque<CredentialEntry>,
}

impl RotationQueue {
    pub fn head(&self) -> Option<&CredentialEntry> {
        self.entries.front()
    }

    pub fn discard_head(&mut self) -> Option<CredentialEntry> {
        self.entries.pop_front()
    }

    /// Drop the current head and return the next one, or `None` when exhausted.
    pub fn rotate_next(&mut self) -> Option<&CredentialEntry> {
        self.entries.pop_front();
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positions still available, front first.
    pub fn remaining_positions(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.position).collect()
    }
}
