use futures_util::future::FutureExt;
use ractor::concurrency::{Duration, JoinHandle};
use ractor::{ActorCell, ActorId, ActorName, ActorRef, Message, SpawnErr};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::core::ExitKind;
use crate::launcher;

/// Whether a supervised child is a regular worker or a nested supervisor.
///
/// The distinction only affects the default [`TerminationPolicy`]:
/// supervisor children default to an infinite graceful-exit timeout so
/// their own children can shut down first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildType {
    /// A regular actor doing application work.
    Worker,
    /// A nested supervisor managing its own children.
    Supervisor,
}

/// Which exits of a child provoke a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartType {
    /// Always restart, no matter how the child terminates.
    Permanent,
    /// Restart only after an abnormal exit; a normal or shutdown exit
    /// leaves the spec in place with ref `Stopped`.
    Transient,
    /// Never restart; the spec is removed as soon as the child terminates.
    Temporary,
    /// Like `Permanent` for abnormal exits, but a normal or shutdown exit
    /// of the child takes the whole supervisor down (normally).
    Intrinsic,
}

/// What the restart engine does with a child exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    /// Restart the child (subject to strategy and intensity).
    Restart,
    /// Keep the spec with ref `Stopped`.
    Keep,
    /// Remove the spec from the registry.
    Forget,
    /// Shut the supervisor itself down, normally.
    StopSupervisor,
}

impl RestartType {
    /// The restart decision matrix: restart type × exit kind → action.
    pub fn action_for(self, kind: ExitKind) -> ExitAction {
        match (self, kind) {
            (RestartType::Permanent, _) => ExitAction::Restart,

            (RestartType::Transient, ExitKind::Abnormal) => ExitAction::Restart,
            (RestartType::Transient, _) => ExitAction::Keep,

            (RestartType::Temporary, _) => ExitAction::Forget,

            (RestartType::Intrinsic, ExitKind::Abnormal) => ExitAction::Restart,
            (RestartType::Intrinsic, _) => ExitAction::StopSupervisor,
        }
    }
}

/// How long to wait for a graceful exit before falling back to a kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Wait forever.
    Infinite,
    /// Wait at most this long.
    Finite(Duration),
}

/// How a child is terminated when the supervisor wants it gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Brutal kill, no grace period.
    Immediate,
    /// Send a graceful-exit request, then wait up to the delay; on expiry
    /// the child is brutally killed.
    Timeout(Delay),
}

impl TerminationPolicy {
    /// Graceful exit with a finite grace period.
    pub fn timeout(delay: Duration) -> Self {
        TerminationPolicy::Timeout(Delay::Finite(delay))
    }

    /// Default policy for a child type: 5 seconds for workers (the OTP
    /// default), infinite for nested supervisors.
    pub fn default_for(child_type: ChildType) -> Self {
        match child_type {
            ChildType::Worker => TerminationPolicy::Timeout(Delay::Finite(Duration::from_secs(5))),
            ChildType::Supervisor => TerminationPolicy::Timeout(Delay::Infinite),
        }
    }
}

/// Runtime state of a declared child, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildRef {
    /// A live incarnation.
    Running(ActorId),
    /// A restart is in progress; the id is the previous incarnation.
    Restarting(ActorId),
    /// No incarnation exists; the spec is retained.
    Stopped,
    /// The factory signaled an intentional ignore; the spec is retained.
    StartIgnored,
    /// The last start attempt failed.
    StartFailed(StartError),
}

impl ChildRef {
    /// Whether this ref denotes a live (or mid-restart) incarnation.
    pub fn is_live(&self) -> bool {
        matches!(self, ChildRef::Running(_) | ChildRef::Restarting(_))
    }

    /// The actor id of the current (or previous, while restarting)
    /// incarnation, if any.
    pub fn pid(&self) -> Option<ActorId> {
        match self {
            ChildRef::Running(id) | ChildRef::Restarting(id) => Some(*id),
            _ => None,
        }
    }
}

/// Why a start attempt did not produce a running child.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    /// The factory declined to start the child. Not an error per se: the
    /// supervisor retains the spec with ref `StartIgnored` (or removes it
    /// for `Temporary` children).
    #[error("child start ignored")]
    Ignore,
    /// The factory could not be resolved to a launcher.
    #[error("bad closure: {0}")]
    BadClosure(String),
    /// The child's startup routine failed.
    #[error("child init failed: {0}")]
    InitFailed(String),
    /// The child's startup routine did not finish in time.
    #[error("child init timed out")]
    InitTimeout,
}

impl From<SpawnErr> for StartError {
    fn from(err: SpawnErr) -> Self {
        StartError::InitFailed(err.to_string())
    }
}

/// A freshly spawned child: its cell plus the join handle the termination
/// engine awaits to observe the child going down.
pub struct Spawned {
    pub(crate) cell: ActorCell,
    pub(crate) join: JoinHandle<()>,
}

impl Spawned {
    /// Wrap a spawned actor.
    pub fn new(cell: ActorCell, join: JoinHandle<()>) -> Self {
        Self { cell, join }
    }
}

impl<TMsg: Message> From<(ActorRef<TMsg>, JoinHandle<()>)> for Spawned {
    fn from((actor, join): (ActorRef<TMsg>, JoinHandle<()>)) -> Self {
        Spawned::new(actor.get_cell(), join)
    }
}

/// The future returned by a [`SpawnFn`].
pub type SpawnFuture = Pin<Box<dyn Future<Output = Result<Spawned, StartError>> + Send>>;

/// User-provided closure that spawns a child **linked** to the supervisor
/// cell it is given. The second argument is the spec's `registered_name`,
/// to pass through to the runtime's name registry.
pub type SpawnFn = Arc<dyn Fn(ActorCell, Option<ActorName>) -> SpawnFuture + Send + Sync>;

/// An opaque description of how to launch a child.
#[derive(Clone)]
pub enum ChildFactory {
    /// An inline spawn closure.
    Closure(SpawnFn),
    /// A label resolved through the global [`launcher`] table at start
    /// time. Unknown labels fail the start with [`StartError::BadClosure`].
    Named(String),
}

impl ChildFactory {
    /// Build a factory from a spawn closure.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(ActorCell, Option<ActorName>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Spawned, StartError>> + Send + 'static,
    {
        ChildFactory::Closure(Arc::new(move |cell, name| f(cell, name).boxed()))
    }

    /// Reference a launcher registered under `label`.
    pub fn named(label: impl Into<String>) -> Self {
        ChildFactory::Named(label.into())
    }

    pub(crate) fn resolve(&self) -> Result<SpawnFn, StartError> {
        match self {
            ChildFactory::Closure(f) => Ok(f.clone()),
            ChildFactory::Named(label) => launcher::resolve(label)
                .ok_or_else(|| StartError::BadClosure(format!("no launcher named '{label}'"))),
        }
    }
}

impl std::fmt::Debug for ChildFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChildFactory::Closure(_) => f.write_str("ChildFactory::Closure(..)"),
            ChildFactory::Named(label) => f.debug_tuple("ChildFactory::Named").field(label).finish(),
        }
    }
}

/// Declarative description of one supervised child.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    /// Unique key of this child within its supervisor. Must be non-empty.
    pub key: String,
    /// Worker or nested supervisor; affects the default termination policy.
    pub child_type: ChildType,
    /// Which exits provoke a restart.
    pub restart_type: RestartType,
    /// How the supervisor terminates this child.
    pub termination: TerminationPolicy,
    /// How the supervisor launches this child.
    pub factory: ChildFactory,
    /// Optional name to register the child under in the runtime's
    /// name registry, passed through to the factory.
    pub registered_name: Option<ActorName>,
}

impl ChildSpec {
    /// A worker child: `Permanent`, 5 second graceful-exit timeout.
    pub fn worker(key: impl Into<String>, factory: ChildFactory) -> Self {
        Self::with_type(key, factory, ChildType::Worker)
    }

    /// A nested-supervisor child: `Permanent`, infinite graceful-exit
    /// timeout.
    pub fn supervisor(key: impl Into<String>, factory: ChildFactory) -> Self {
        Self::with_type(key, factory, ChildType::Supervisor)
    }

    fn with_type(key: impl Into<String>, factory: ChildFactory, child_type: ChildType) -> Self {
        let key = key.into();
        assert!(!key.is_empty(), "child key must be non-empty");
        Self {
            key,
            child_type,
            restart_type: RestartType::Permanent,
            termination: TerminationPolicy::default_for(child_type),
            factory,
            registered_name: None,
        }
    }

    /// Set the restart type.
    pub fn restart_type(mut self, restart: RestartType) -> Self {
        self.restart_type = restart;
        self
    }

    /// Set the termination policy.
    pub fn termination(mut self, policy: TerminationPolicy) -> Self {
        self.termination = policy;
        self
    }

    /// Register the child under this name when it starts.
    pub fn registered_name(mut self, name: impl Into<ActorName>) -> Self {
        self.registered_name = Some(name.into());
        self
    }
}
