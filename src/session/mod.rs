// Per-user session state bound to the current thread
// Author: kelexine (https://github.com/kelexine)
//
// A request handler binds the caller's session with `resume` (or lets
// `start`/`ensure_started` create one) and every session-aware component on
// that thread sees the same attributes until `end` is called.

use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::CacheValue;

/// Shared handle to one session's attributes. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    attributes: Arc<Mutex<HashMap<String, CacheValue>>>,
}

impl Session {
    /// A fresh, empty session with a random id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, name: &str) -> Option<CacheValue> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn insert(&self, name: impl Into<String>, value: CacheValue) {
        self.attributes.lock().insert(name.into(), value);
    }

    pub fn remove(&self, name: &str) -> Option<CacheValue> {
        self.attributes.lock().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.lock().contains_key(name)
    }

    /// Run `f` against one attribute while holding the session lock. The slot
    /// is `None` when the attribute is absent; leaving it `None` removes it.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut Option<CacheValue>) -> R) -> R {
        let mut attributes = self.attributes.lock();
        let mut slot = attributes.remove(name);
        let result = f(&mut slot);
        if let Some(value) = slot {
            attributes.insert(name.to_string(), value);
        }
        result
    }

    /// True if both handles point at the same attribute map.
    pub fn same_as(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.attributes, &other.attributes)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Session>> = const { RefCell::new(None) };
}

/// Session bound to this thread, if any.
pub fn current() -> Option<Session> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Bind a fresh session to this thread, replacing any previous one.
pub fn start() -> Session {
    let session = Session::new();
    debug!("Started session {}", session.id());
    resume(session.clone());
    session
}

/// Current session, starting one if none is bound.
pub fn ensure_started() -> Session {
    current().unwrap_or_else(start)
}

/// Bind an existing session (e.g. looked up from a request cookie).
pub fn resume(session: Session) {
    CURRENT.with(|current| *current.borrow_mut() = Some(session));
}

/// Unbind the current session and return it.
pub fn end() -> Option<Session> {
    CURRENT.with(|current| current.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_started_is_sticky() {
        end();
        assert!(current().is_none());

        let first = ensure_started();
        let second = ensure_started();
        assert!(first.same_as(&second));
        assert_eq!(first.id(), second.id());

        assert!(end().is_some());
        assert!(current().is_none());
    }

    #[test]
    fn test_resume_binds_existing_session() {
        let session = Session::with_id("abc");
        session.insert("user", CacheValue::from("alice"));

        resume(session.clone());
        let bound = current().unwrap();
        assert_eq!(bound.id(), "abc");
        assert_eq!(bound.get("user"), Some(CacheValue::from("alice")));
        end();
    }

    #[test]
    fn test_update_removes_when_emptied() {
        let session = Session::new();
        session.insert("k", CacheValue::Int(1));

        session.update("k", |slot| *slot = None);
        assert!(!session.contains("k"));

        let seen = session.update("k", |slot| {
            *slot = Some(CacheValue::Int(2));
            5
        });
        assert_eq!(seen, 5);
        assert_eq!(session.get("k"), Some(CacheValue::Int(2)));
    }
}
