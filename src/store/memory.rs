//! In-memory session store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::store::{Session, SessionStore};

/// In-memory implementation of [`SessionStore`].
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, id: &str) -> Option<Session> {
        self.read().get(id).cloned()
    }

    fn put(&self, session: Session) {
        self.write().insert(session.id.clone(), session);
    }

    fn insert(&self, session: Session) -> BridgeResult<()> {
        let mut sessions = self.write();
        if sessions.contains_key(&session.id) {
            return Err(BridgeError::AlreadyExists);
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn insert_with(&self, id: &str, build: &mut dyn FnMut() -> Session) -> BridgeResult<Session> {
        match self.write().entry(id.to_string()) {
            Entry::Occupied(_) => Err(BridgeError::AlreadyExists),
            Entry::Vacant(slot) => Ok(slot.insert(build()).clone()),
        }
    }

    fn update(&self, id: &str, incarnation: Uuid, f: &mut dyn FnMut(&mut Session)) -> bool {
        match self.write().get_mut(id) {
            Some(session) if session.incarnation == incarnation => {
                f(session);
                true
            }
            _ => false,
        }
    }

    fn remove(&self, id: &str) -> Option<Session> {
        self.write().remove(id)
    }

    fn remove_incarnation(&self, id: &str, incarnation: Uuid) -> Option<Session> {
        let mut sessions = self.write();
        match sessions.get(id) {
            Some(session) if session.incarnation == incarnation => sessions.remove(id),
            _ => None,
        }
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
