//! Test admission queues.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use turnstile_core::error::DomainError;
use turnstile_core::queue::AdmissionQueueStore;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Members {
    seq: u64,
    // (score, insertion seq, user)
    entries: Vec<(i64, u64, Uuid)>,
}

impl Members {
    fn sorted(&mut self) -> &[(i64, u64, Uuid)] {
        self.entries.sort_unstable();
        &self.entries
    }
}

/// An in-memory sorted set per event. Equal scores are ordered by insertion.
#[derive(Debug, Default)]
pub struct InMemoryAdmissionQueue {
    queues: Mutex<HashMap<Uuid, Members>>,
}

impl InMemoryAdmissionQueue {
    /// Creates an empty queue store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the waiting users of an event, front first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn members(&self, event_id: Uuid) -> Vec<Uuid> {
        let mut queues = self.queues.lock().unwrap();
        queues
            .get_mut(&event_id)
            .map(|members| members.sorted().iter().map(|(_, _, user)| *user).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AdmissionQueueStore for InMemoryAdmissionQueue {
    async fn add(&self, event_id: Uuid, user_id: Uuid, score: i64) -> Result<(), DomainError> {
        let mut queues = self.queues.lock().unwrap();
        let members = queues.entry(event_id).or_default();
        if members.entries.iter().any(|(_, _, user)| *user == user_id) {
            return Ok(());
        }
        members.seq += 1;
        let seq = members.seq;
        members.entries.push((score, seq, user_id));
        Ok(())
    }

    async fn rank(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<u64>, DomainError> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.get_mut(&event_id).and_then(|members| {
            members
                .sorted()
                .iter()
                .position(|(_, _, user)| *user == user_id)
                .map(|index| index as u64)
        }))
    }

    async fn pop_min(&self, event_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        let mut queues = self.queues.lock().unwrap();
        let Some(members) = queues.get_mut(&event_id) else {
            return Ok(None);
        };
        if members.sorted().is_empty() {
            return Ok(None);
        }
        Ok(Some(members.entries.remove(0).2))
    }

    async fn len(&self, event_id: Uuid) -> Result<u64, DomainError> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get(&event_id)
            .map_or(0, |members| members.entries.len() as u64))
    }
}

/// An admission queue that always returns an infrastructure error.
#[derive(Debug)]
pub struct FailingAdmissionQueue;

#[async_trait]
impl AdmissionQueueStore for FailingAdmissionQueue {
    async fn add(&self, _event_id: Uuid, _user_id: Uuid, _score: i64) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn rank(&self, _event_id: Uuid, _user_id: Uuid) -> Result<Option<u64>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn pop_min(&self, _event_id: Uuid) -> Result<Option<Uuid>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn len(&self, _event_id: Uuid) -> Result<u64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
