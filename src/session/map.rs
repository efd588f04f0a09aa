//! Expiring keyed map shared by both session stores.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::error::SessionError;
use super::types::SessionId;

struct Entry<T> {
    value: T,
    last_access: Instant,
}

impl<T> Entry<T> {
    fn expired(&self, now: Instant, timeout: Duration) -> bool {
        now.duration_since(self.last_access) > timeout
    }
}

/// Records keyed by [`SessionId`], evicted after `timeout` without access.
///
/// Every read or update touches the entry. An entry found expired on access
/// is removed in the same critical section and reported as not found.
pub(crate) struct SessionMap<T> {
    entries: Mutex<HashMap<SessionId, Entry<T>>>,
    timeout: Duration,
    kind: &'static str,
}

impl<T: Clone> SessionMap<T> {
    pub(crate) fn new(timeout: Duration, kind: &'static str) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            timeout,
            kind,
        }
    }

    /// Mints a fresh id and stores the record built from it.
    pub(crate) fn insert_with(&self, build: impl FnOnce(SessionId) -> T) -> SessionId {
        let mut entries = self.entries.lock();
        let mut id = SessionId::new_v4();
        while entries.contains_key(&id) {
            id = SessionId::new_v4();
        }
        entries.insert(
            id,
            Entry {
                value: build(id),
                last_access: Instant::now(),
            },
        );
        debug!(session_id = %id, kind = self.kind, "Created session");
        id
    }

    fn live_entry<'a>(
        &self,
        entries: &'a mut HashMap<SessionId, Entry<T>>,
        id: &SessionId,
    ) -> Result<&'a mut Entry<T>, SessionError> {
        let now = Instant::now();
        let expired = match entries.get(id) {
            None => return Err(SessionError::NotFound { id: *id }),
            Some(entry) => entry.expired(now, self.timeout),
        };
        if expired {
            entries.remove(id);
            info!(session_id = %id, kind = self.kind, "Session expired on access");
            return Err(SessionError::NotFound { id: *id });
        }
        let entry = entries
            .get_mut(id)
            .ok_or(SessionError::NotFound { id: *id })?;
        entry.last_access = now;
        Ok(entry)
    }

    /// Runs `f` on the record under the lock.
    pub(crate) fn read<R>(&self, id: &SessionId, f: impl FnOnce(&T) -> R) -> Result<R, SessionError> {
        let mut entries = self.entries.lock();
        let entry = self.live_entry(&mut entries, id)?;
        Ok(f(&entry.value))
    }

    pub(crate) fn get(&self, id: &SessionId) -> Result<T, SessionError> {
        self.read(id, T::clone)
    }

    /// Applies `f` to a copy of the record and commits it only on success,
    /// so a failed update leaves no trace. Existence check and commit happen
    /// under one lock acquisition.
    pub(crate) fn update<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut T) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let mut entries = self.entries.lock();
        let entry = self.live_entry(&mut entries, id)?;
        let mut draft = entry.value.clone();
        let result = f(&mut draft)?;
        entry.value = draft;
        Ok(result)
    }

    /// Idempotent; returns whether a record was removed.
    pub(crate) fn remove(&self, id: &SessionId) -> bool {
        let removed = self.entries.lock().remove(id).is_some();
        if removed {
            debug!(session_id = %id, kind = self.kind, "Deleted session");
        }
        removed
    }

    /// Drops every expired record, returning how many went.
    pub(crate) fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(now, self.timeout));
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed, kind = self.kind, "Swept expired sessions");
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn contains(&self, id: &SessionId) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(id)
            .is_some_and(|entry| !entry.expired(now, self.timeout))
    }
}

/// Periodically sweeps `map` until it is dropped. Must be called from
/// within a tokio runtime.
pub(crate) fn spawn_sweeper<T>(map: &Arc<SessionMap<T>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    let weak: Weak<SessionMap<T>> = Arc::downgrade(map);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(map) = weak.upgrade() else {
                debug!("Session store dropped, stopping sweeper");
                break;
            };
            map.sweep_expired();
        }
    })
}
