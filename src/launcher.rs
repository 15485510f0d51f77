//! Process-wide table of named child launchers.
//!
//! A [`ChildFactory::Named`](crate::ChildFactory::Named) label is resolved
//! through this table when the start engine runs. The table is built once,
//! at process startup, and is read-only afterwards; resolving an
//! unregistered label fails the start with
//! [`StartError::BadClosure`](crate::StartError::BadClosure).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures_util::future::FutureExt;
use ractor::{ActorCell, ActorName};
use thiserror::Error;

use crate::child::{SpawnFn, Spawned, StartError};

static LAUNCHERS: OnceLock<HashMap<String, SpawnFn>> = OnceLock::new();

/// The launcher table was already installed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("launcher table already installed")]
pub struct LaunchersInstalled;

/// One-time builder for the global launcher table.
#[derive(Default)]
pub struct Launchers {
    map: HashMap<String, SpawnFn>,
}

impl Launchers {
    /// Start an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a launcher under `label`, replacing any previous
    /// registration of the same label in this builder.
    pub fn register<F, Fut>(mut self, label: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActorCell, Option<ActorName>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Spawned, StartError>> + Send + 'static,
    {
        self.map
            .insert(label.into(), Arc::new(move |cell, name| f(cell, name).boxed()));
        self
    }

    /// Install the table process-wide. Fails if a table was installed
    /// before; the first installation wins.
    pub fn install(self) -> Result<(), LaunchersInstalled> {
        LAUNCHERS.set(self.map).map_err(|_| LaunchersInstalled)
    }
}

pub(crate) fn resolve(label: &str) -> Option<SpawnFn> {
    LAUNCHERS.get()?.get(label).cloned()
}
