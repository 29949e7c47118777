//! Store trait for session records.

use uuid::Uuid;

use crate::error::BridgeResult;
use crate::store::Session;

/// Mapping from session identifier to session record.
///
/// Implementations only hold data; lifecycle rules live in the manager.
/// Methods taking an incarnation leave newer records of the same id alone.
pub trait SessionStore: Send + Sync {
    /// Get a copy of the record for `id`.
    fn get(&self, id: &str) -> Option<Session>;

    /// Store a record, replacing any existing one.
    fn put(&self, session: Session);

    /// Store a record unless one already exists for its id
    /// (`BridgeError::AlreadyExists`).
    fn insert(&self, session: Session) -> BridgeResult<()>;

    /// Build and store a record for `id` unless one already exists
    /// (`BridgeError::AlreadyExists`). `build` only runs while the id is
    /// claimed, so concurrent callers never build twice. Returns a copy of
    /// the stored record.
    fn insert_with(&self, id: &str, build: &mut dyn FnMut() -> Session) -> BridgeResult<Session>;

    /// Mutate the record for `id` if it belongs to `incarnation`.
    /// Returns whether the record was found.
    fn update(&self, id: &str, incarnation: Uuid, f: &mut dyn FnMut(&mut Session)) -> bool;

    /// Remove and return the record for `id`.
    fn remove(&self, id: &str) -> Option<Session>;

    /// Remove the record for `id` only if it belongs to `incarnation`.
    fn remove_incarnation(&self, id: &str, incarnation: Uuid) -> Option<Session>;

    /// Identifiers of every stored record.
    fn ids(&self) -> Vec<String>;
}
