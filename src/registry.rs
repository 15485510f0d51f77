use ractor::concurrency::JoinHandle;
use ractor::{ActorCell, ActorId};

use crate::child::{ChildRef, ChildSpec, StartError};

/// Runtime state of one registry entry. The live variant owns the cell and
/// the join handle the termination engine awaits.
#[derive(Debug)]
pub(crate) enum ChildState {
    Running {
        cell: ActorCell,
        join: JoinHandle<()>,
    },
    Restarting {
        last: ActorId,
    },
    Stopped,
    StartIgnored,
    StartFailed(StartError),
}

impl ChildState {
    pub fn is_live(&self) -> bool {
        matches!(self, ChildState::Running { .. } | ChildState::Restarting { .. })
    }

    /// Project the internal state onto the client-visible ref.
    pub fn as_child_ref(&self) -> ChildRef {
        match self {
            ChildState::Running { cell, .. } => ChildRef::Running(cell.get_id()),
            ChildState::Restarting { last } => ChildRef::Restarting(*last),
            ChildState::Stopped => ChildRef::Stopped,
            ChildState::StartIgnored => ChildRef::StartIgnored,
            ChildState::StartFailed(err) => ChildRef::StartFailed(err.clone()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ChildEntry {
    pub spec: ChildSpec,
    pub state: ChildState,
}

/// Insertion-ordered set of declared children. Keys are unique; order is
/// significant for group restarts. Single-writer: only the supervisor's
/// message loop touches it.
#[derive(Debug, Default)]
pub(crate) struct ChildRegistry {
    entries: Vec<ChildEntry>,
}

impl ChildRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.spec.key == key)
    }

    /// Insert a new spec with ref `Stopped`. Rejects duplicate keys,
    /// returning the existing entry's ref.
    pub fn insert(&mut self, spec: ChildSpec) -> Result<(), ChildRef> {
        if let Some(existing) = self.get(&spec.key) {
            return Err(existing.state.as_child_ref());
        }
        self.entries.push(ChildEntry {
            spec,
            state: ChildState::Stopped,
        });
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ChildEntry> {
        self.entries.iter().find(|e| e.spec.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ChildEntry> {
        self.entries.iter_mut().find(|e| e.spec.key == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ChildEntry> {
        let idx = self.entries.iter().position(|e| e.spec.key == key)?;
        Some(self.entries.remove(idx))
    }

    pub fn set_state(&mut self, key: &str, state: ChildState) {
        if let Some(entry) = self.get_mut(key) {
            entry.state = state;
        }
    }

    /// Take the live cell and join handle of `key`, leaving the entry
    /// `Stopped`. Returns `None` when no incarnation is running.
    pub fn take_running(&mut self, key: &str) -> Option<(ActorCell, JoinHandle<()>)> {
        let entry = self.get_mut(key)?;
        if !matches!(entry.state, ChildState::Running { .. }) {
            return None;
        }
        match std::mem::replace(&mut entry.state, ChildState::Stopped) {
            ChildState::Running { cell, join } => Some((cell, join)),
            _ => unreachable!("checked above"),
        }
    }

    /// The key of the entry whose current incarnation is `id`, if any.
    /// Stale ids (previous incarnations, removed entries) match nothing.
    pub fn key_of_running(&self, id: ActorId) -> Option<String> {
        self.entries.iter().find_map(|e| match &e.state {
            ChildState::Running { cell, .. } if cell.get_id() == id => Some(e.spec.key.clone()),
            _ => None,
        })
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.spec.key.clone()).collect()
    }

    /// Keys from `key` (inclusive) to the end, in insertion order.
    pub fn keys_from(&self, key: &str) -> Vec<String> {
        self.entries
            .iter()
            .skip_while(|e| e.spec.key != key)
            .map(|e| e.spec.key.clone())
            .collect()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> std::slice::Iter<'_, ChildEntry> {
        self.entries.iter()
    }

    /// Client-visible listing, in insertion order.
    pub fn list(&self) -> Vec<(String, ChildRef)> {
        self.entries
            .iter()
            .map(|e| (e.spec.key.clone(), e.state.as_child_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::ChildFactory;

    fn spec(key: &str) -> ChildSpec {
        ChildSpec::worker(
            key,
            ChildFactory::from_fn(|_cell, _name| async { Err(StartError::Ignore) }),
        )
    }

    #[test]
    fn insert_preserves_order_and_rejects_duplicates() {
        let mut reg = ChildRegistry::new();
        for key in ["alpha", "beta", "gamma"] {
            reg.insert(spec(key)).unwrap();
        }
        assert_eq!(reg.keys(), vec!["alpha", "beta", "gamma"]);

        let existing = reg.insert(spec("beta")).unwrap_err();
        assert_eq!(existing, ChildRef::Stopped);
        assert_eq!(reg.len(), 3, "duplicate insert must not grow the registry");
    }

    #[test]
    fn remove_forgets_the_key() {
        let mut reg = ChildRegistry::new();
        reg.insert(spec("alpha")).unwrap();
        reg.insert(spec("beta")).unwrap();

        assert!(reg.remove("alpha").is_some());
        assert!(!reg.contains("alpha"));
        assert!(reg.remove("alpha").is_none());
        assert_eq!(reg.keys(), vec!["beta"]);
    }

    #[test]
    fn keys_from_yields_the_tail() {
        let mut reg = ChildRegistry::new();
        for key in ["a", "b", "c", "d"] {
            reg.insert(spec(key)).unwrap();
        }
        assert_eq!(reg.keys_from("b"), vec!["b", "c", "d"]);
        assert_eq!(reg.keys_from("d"), vec!["d"]);
        assert!(reg.keys_from("nope").is_empty());
    }

    #[test]
    fn state_projection_tracks_updates() {
        let mut reg = ChildRegistry::new();
        reg.insert(spec("a")).unwrap();
        assert_eq!(reg.get("a").unwrap().state.as_child_ref(), ChildRef::Stopped);

        reg.set_state("a", ChildState::StartFailed(StartError::InitTimeout));
        assert_eq!(
            reg.list(),
            vec![("a".to_string(), ChildRef::StartFailed(StartError::InitTimeout))]
        );

        // No running incarnation: nothing to take, nothing matches an id.
        assert!(reg.take_running("a").is_none());
        assert!(reg.key_of_running(ActorId::Local(42)).is_none());
    }
}
