//! # ractor-foreman
//!
//! An **OTP-style supervisor** for the [`ractor`](https://docs.rs/ractor)
//! framework: declare children, pick a restart strategy, and let the
//! supervisor keep them alive, or take itself down when they churn too
//! hard.
//!
//! A supervisor owns an ordered set of **child specs**. Each spec says how
//! to launch the child (a [`ChildFactory`]), which exits provoke a restart
//! (a [`RestartType`]), and how the child is asked to go away (a
//! [`TerminationPolicy`]). Children are spawned linked to the supervisor,
//! so every exit comes back as a monitor notification and is fed through
//! the restart engine. Too many restarts inside the configured window and
//! the supervisor terminates everything and exits abnormally with
//! `ReachedMaxRestartIntensity`.
//!
//! ## Restart types
//! - [`RestartType::Permanent`]: always restart.
//! - [`RestartType::Transient`]: restart only after an abnormal exit.
//! - [`RestartType::Temporary`]: never restart; the spec is removed when
//!   the child terminates.
//! - [`RestartType::Intrinsic`]: like `Permanent` for crashes, but a
//!   clean exit of the child takes the whole supervisor down (normally).
//!
//! ## Restart strategies
//! - [`RestartStrategy::RestartOne`]: only the failed child is restarted.
//! - [`RestartStrategy::RestartRest`]: the failed child and every sibling
//!   inserted after it.
//! - [`RestartStrategy::RestartAll`]: every non-temporary sibling.
//!
//! Group strategies take a [`RestartMode`]: `RestartEach` terminates and
//! restarts one sibling at a time; `RestartInOrder` terminates the whole
//! group first and only then starts it again, both walking
//! [`Direction::LeftToRight`] (insertion order) or
//! [`Direction::RightToLeft`].
//!
//! ## Termination
//! [`TerminationPolicy::Immediate`] kills on the spot. A timeout policy
//! asks nicely first (the child sees a stop with reason `"shutdown"`) and
//! escalates to a kill when the grace period runs out. Workers default to
//! a 5 second grace period, nested supervisors to an infinite one.
//!
//! ## Example
//! ```no_run
//! use ractor::{Actor, ActorProcessingErr, ActorRef};
//! use ractor_foreman::{
//!     ChildFactory, ChildSpec, RestartStrategy, RestartLimit, Supervisor,
//!     SupervisorArguments,
//! };
//!
//! struct Ping;
//!
//! #[ractor::async_trait]
//! impl Actor for Ping {
//!     type Msg = ();
//!     type State = ();
//!     type Arguments = ();
//!
//!     async fn pre_start(
//!         &self,
//!         _myself: ActorRef<Self::Msg>,
//!         _args: Self::Arguments,
//!     ) -> Result<Self::State, ActorProcessingErr> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ping = ChildSpec::worker(
//!         "ping",
//!         ChildFactory::from_fn(|sup_cell, name| async move {
//!             let spawned = Supervisor::spawn_linked(name, Ping, (), sup_cell).await?;
//!             Ok(spawned.into())
//!         }),
//!     );
//!
//!     let (sup, handle) = Supervisor::spawn(
//!         "root".into(),
//!         SupervisorArguments {
//!             child_specs: vec![ping],
//!             strategy: RestartStrategy::RestartOne {
//!                 limit: RestartLimit::default(),
//!             },
//!         },
//!     )
//!     .await?;
//!
//!     let children = Supervisor::list_children(&sup).await?;
//!     assert_eq!(children.len(), 1);
//!
//!     Supervisor::shutdown(&sup).await?;
//!     let _ = handle.await;
//!     Ok(())
//! }
//! ```
//!
//! Children can also be managed at runtime: [`Supervisor::add_child`],
//! [`Supervisor::start_child`], [`Supervisor::terminate_child`],
//! [`Supervisor::restart_child`], [`Supervisor::delete_child`],
//! [`Supervisor::lookup_child`], [`Supervisor::list_children`], and
//! [`Supervisor::shutdown`] are synchronous request/reply calls against
//! the supervisor actor. One-shot async closures can run under
//! supervision through the [`task`] module.

pub mod api;
pub mod child;
pub mod core;
pub mod launcher;
mod registry;
pub mod strategy;
pub mod supervisor;
pub mod task;
pub mod window;

pub use api::{
    AddChildResult, ChildInfo, DeleteChildResult, RestartChildError, RestartChildResult,
    StartChildResult, SupervisorMsg, TerminateChildResult,
};
pub use child::{
    ChildFactory, ChildRef, ChildSpec, ChildType, Delay, ExitAction, RestartType, SpawnFn,
    SpawnFuture, Spawned, StartError, TerminationPolicy,
};
pub use self::core::{DiedReason, ExitKind, SupervisorError, EXIT_SHUTDOWN};
pub use launcher::{Launchers, LaunchersInstalled};
pub use strategy::{Direction, RestartMode, RestartStrategy};
pub use supervisor::{Supervisor, SupervisorArguments, SupervisorState};
pub use task::{Task, TaskActor, TaskFn, TaskOptions};
pub use window::{RestartLimit, DEFAULT_INTERVAL, DEFAULT_MAX_RESTARTS};
