//! Process-wide active-logger slot
//!
//! Collaborators that were never handed a SessionLogger (the prompt logger,
//! for one) check here whether a session is currently capturing output.
//! Exactly one slot, no general registry; clearing is compare-on-clear so
//! a nested or sequential instance cannot clear a registration it does not
//! own.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Snapshot of the SessionLogger currently in scope
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// Session identifier, second resolution
    pub session_id: String,
    /// Iteration identifier, microsecond resolution
    pub iteration_id: String,
    /// Directory this iteration logs into
    pub iteration_dir: PathBuf,
}

static ACTIVE: Mutex<Option<Arc<ActiveSession>>> = Mutex::new(None);

/// Replace the slot contents.
pub fn set(session: Option<Arc<ActiveSession>>) {
    let mut slot = ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = session;
}

/// The currently registered session, if any.
pub fn get() -> Option<Arc<ActiveSession>> {
    ACTIVE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Clear the slot only if it still holds `session`.
pub fn clear_if(session: &Arc<ActiveSession>) {
    let mut slot = ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, session)) {
        *slot = None;
    }
}
