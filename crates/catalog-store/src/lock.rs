//! Advisory study locks with lease semantics: a lock is held for a declared
//! duration and silently lapses when it expires, so a crashed holder cannot
//! wedge a study. Tokens are uuids; release with a stale or foreign token is
//! a no-op.

use catalog_types::{CatalogError, StudyId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use uuid::Uuid;

/// How long a lock is held before it lapses on its own.
pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(20);
/// How long an acquirer waits before giving up with `Timeout`.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Proof of a held study lock. Required by every mutating configuration
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    pub study_id: StudyId,
    pub uuid: Uuid,
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}:{}", self.study_id, self.uuid)
    }
}

impl std::str::FromStr for LockToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let (study, uuid) = s
            .split_once(':')
            .ok_or_else(|| format!("expected 'study:uuid', got '{s}'"))?;
        Ok(Self {
            study_id: study
                .parse()
                .map_err(|err| format!("invalid study id '{study}': {err}"))?,
            uuid: uuid
                .parse()
                .map_err(|err| format!("invalid lock uuid '{uuid}': {err}"))?,
        })
    }
}

struct Holder {
    uuid: Uuid,
    expires: Instant,
}

struct LockSet {
    holder: Mutex<Option<Holder>>,
    notify: Notify,
}

impl LockSet {
    fn new() -> Self {
        Self {
            holder: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn acquire_immediate(&self, uuid: Uuid, duration: Duration) -> bool {
        let mut holder = self.holder.lock();
        let now = Instant::now();
        if let Some(current) = &*holder {
            if current.expires > now {
                return false;
            }
        }
        *holder = Some(Holder {
            uuid,
            expires: now + duration,
        });
        true
    }

    async fn acquire(
        &self,
        uuid: Uuid,
        duration: Duration,
        deadline: Instant,
    ) -> Result<(), AcquireTimedOut> {
        loop {
            if self.acquire_immediate(uuid, duration) {
                return Ok(());
            }

            match tokio::time::timeout_at(deadline.into(), self.notify.notified()).await {
                Err(_) => {
                    // One last try: the holder may have lapsed while we slept.
                    if self.acquire_immediate(uuid, duration) {
                        return Ok(());
                    }
                    return Err(AcquireTimedOut);
                }
                Ok(_) => continue,
            }
        }
    }

    fn extend(&self, uuid: Uuid, duration: Duration) -> bool {
        let mut holder = self.holder.lock();
        match &mut *holder {
            Some(current) if current.uuid == uuid && current.expires > Instant::now() => {
                current.expires = Instant::now() + duration;
                true
            }
            _ => false,
        }
    }

    fn release(&self, uuid: Uuid) {
        let mut holder = self.holder.lock();
        if let Some(current) = &*holder {
            if current.uuid == uuid {
                *holder = None;
            }
        }
        drop(holder);
        self.notify.notify_one();
    }
}

pub(crate) struct AcquireTimedOut;

/// One lock set per study, created on first use.
pub struct StudyLocks {
    sets: Mutex<HashMap<StudyId, Arc<LockSet>>>,
}

impl StudyLocks {
    pub fn new() -> Self {
        Self {
            sets: Mutex::new(HashMap::new()),
        }
    }

    fn set_for(&self, study_id: StudyId) -> Arc<LockSet> {
        self.sets
            .lock()
            .entry(study_id)
            .or_insert_with(|| Arc::new(LockSet::new()))
            .clone()
    }

    pub async fn acquire(
        &self,
        study_id: StudyId,
        duration: Duration,
        timeout: Duration,
    ) -> Result<LockToken, CatalogError> {
        let uuid = Uuid::new_v4();
        let deadline = Instant::now() + timeout;
        let set = self.set_for(study_id);
        set.acquire(uuid, duration, deadline)
            .await
            .map_err(|AcquireTimedOut| CatalogError::Timeout { study_id })?;
        Ok(LockToken { study_id, uuid })
    }

    /// Idempotent; silently ignores expired or foreign tokens.
    pub fn release(&self, token: LockToken) {
        if let Some(set) = self.sets.lock().get(&token.study_id).cloned() {
            set.release(token.uuid);
        }
    }

    /// Push the expiry of a still-held lock out by `duration`. Fails when
    /// the token no longer holds the lock.
    pub fn extend(&self, token: LockToken, duration: Duration) -> Result<(), CatalogError> {
        let set = self.set_for(token.study_id);
        if set.extend(token.uuid, duration) {
            Ok(())
        } else {
            Err(CatalogError::Precondition(format!(
                "lock token {token} no longer holds the lock"
            )))
        }
    }

    /// Whether `token` currently holds its study's lock.
    pub fn is_held(&self, token: LockToken) -> bool {
        match self.sets.lock().get(&token.study_id) {
            Some(set) => match &*set.holder.lock() {
                Some(holder) => holder.uuid == token.uuid && holder.expires > Instant::now(),
                None => false,
            },
            None => false,
        }
    }
}

impl Default for StudyLocks {
    fn default() -> Self {
        Self::new()
    }
}
