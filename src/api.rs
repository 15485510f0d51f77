use ractor::{call, ActorProcessingErr, ActorRef, RpcReplyPort};

use crate::child::{ChildRef, ChildSpec, ChildType, RestartType, StartError};
use crate::supervisor::Supervisor;

/// One row of a `listChildren` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildInfo {
    /// The child's key.
    pub key: String,
    /// Worker or nested supervisor.
    pub child_type: ChildType,
    /// The restart policy on the spec.
    pub restart_type: RestartType,
    /// Current runtime state.
    pub child_ref: ChildRef,
}

/// Reply to `addChild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddChildResult {
    /// The spec was inserted (ref `Stopped`; the child is not started).
    ChildAdded(ChildRef),
    /// The key is already taken; carries the existing entry's ref.
    DuplicateChild(ChildRef),
}

/// Reply to `startChild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartChildResult {
    /// The child is registered; the ref reflects how the start went
    /// (`Running`, or `StartIgnored` when the factory declined).
    ChildAdded(ChildRef),
    /// The start attempt failed; the spec is retained with `StartFailed`.
    ChildFailedToStart(StartError),
    /// The key already names a live child.
    DuplicateChild(ChildRef),
}

/// Reply to `terminateChild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminateChildResult {
    /// The child is down (or was not running to begin with).
    ChildTerminated,
    /// No entry under that key.
    ChildNotFound,
}

/// Why an explicit `restartChild` failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartChildError {
    /// The child is currently live; terminate it first.
    AlreadyRunning(ChildRef),
    /// The start engine failed.
    Start(StartError),
}

/// Reply to `restartChild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartChildResult {
    /// The child was started; carries the new ref.
    ChildRestartOk(ChildRef),
    /// The restart was refused or failed.
    ChildRestartFailed(RestartChildError),
    /// No entry under that key.
    ChildRestartUnknownId,
}

/// Reply to `deleteChild`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteChildResult {
    /// The entry was removed.
    ChildDeleted,
    /// No entry under that key.
    ChildNotFound,
    /// The child is live; terminate it first.
    ChildNotStopped(ChildRef),
}

/// The supervisor's mailbox protocol: administrative request/reply pairs
/// plus the internal restart-retry tick.
pub enum SupervisorMsg {
    /// Insert a spec without starting it.
    AddChild {
        /// The spec to insert.
        spec: ChildSpec,
        /// Reply channel.
        reply: RpcReplyPort<AddChildResult>,
    },
    /// Insert (if new) and start a child.
    StartChild {
        /// The spec to insert and start.
        spec: ChildSpec,
        /// Reply channel.
        reply: RpcReplyPort<StartChildResult>,
    },
    /// Terminate a child per its termination policy.
    TerminateChild {
        /// Key of the child to terminate.
        key: String,
        /// Reply channel.
        reply: RpcReplyPort<TerminateChildResult>,
    },
    /// Start a stopped/ignored/failed child again.
    RestartChild {
        /// Key of the child to restart.
        key: String,
        /// Reply channel.
        reply: RpcReplyPort<RestartChildResult>,
    },
    /// Remove a non-live entry.
    DeleteChild {
        /// Key of the entry to delete.
        key: String,
        /// Reply channel.
        reply: RpcReplyPort<DeleteChildResult>,
    },
    /// Current ref of a child, if the key is known.
    LookupChild {
        /// Key to look up.
        key: String,
        /// Reply channel.
        reply: RpcReplyPort<Option<ChildRef>>,
    },
    /// All entries, in insertion order.
    ListChildren {
        /// Reply channel.
        reply: RpcReplyPort<Vec<ChildInfo>>,
    },
    /// Terminate all children (reverse insertion order) and stop.
    Shutdown {
        /// Replied to once the children are down.
        reply: RpcReplyPort<()>,
    },
    /// Internal: retry a restart whose start attempt failed.
    RetryRestart {
        /// Key of the child to retry.
        key: String,
    },
}

/// Synchronous request/reply wrappers over [`SupervisorMsg`].
impl Supervisor {
    /// Insert a spec with ref `Stopped`; the child is not started.
    pub async fn add_child(
        sup: &ActorRef<SupervisorMsg>,
        spec: ChildSpec,
    ) -> Result<AddChildResult, ActorProcessingErr> {
        Ok(call!(sup, |reply| SupervisorMsg::AddChild { spec, reply })?)
    }

    /// Insert (if new) and start a child.
    pub async fn start_child(
        sup: &ActorRef<SupervisorMsg>,
        spec: ChildSpec,
    ) -> Result<StartChildResult, ActorProcessingErr> {
        Ok(call!(sup, |reply| SupervisorMsg::StartChild { spec, reply })?)
    }

    /// Terminate a child; returns once the child is observed down.
    pub async fn terminate_child(
        sup: &ActorRef<SupervisorMsg>,
        key: impl Into<String>,
    ) -> Result<TerminateChildResult, ActorProcessingErr> {
        let key = key.into();
        Ok(call!(sup, |reply| SupervisorMsg::TerminateChild {
            key,
            reply
        })?)
    }

    /// Start a stopped/ignored/failed child again.
    pub async fn restart_child(
        sup: &ActorRef<SupervisorMsg>,
        key: impl Into<String>,
    ) -> Result<RestartChildResult, ActorProcessingErr> {
        let key = key.into();
        Ok(call!(sup, |reply| SupervisorMsg::RestartChild { key, reply })?)
    }

    /// Remove a non-live entry.
    pub async fn delete_child(
        sup: &ActorRef<SupervisorMsg>,
        key: impl Into<String>,
    ) -> Result<DeleteChildResult, ActorProcessingErr> {
        let key = key.into();
        Ok(call!(sup, |reply| SupervisorMsg::DeleteChild { key, reply })?)
    }

    /// Current ref of a child, or `None` for unknown keys.
    pub async fn lookup_child(
        sup: &ActorRef<SupervisorMsg>,
        key: impl Into<String>,
    ) -> Result<Option<ChildRef>, ActorProcessingErr> {
        let key = key.into();
        Ok(call!(sup, |reply| SupervisorMsg::LookupChild { key, reply })?)
    }

    /// All entries, in insertion order.
    pub async fn list_children(
        sup: &ActorRef<SupervisorMsg>,
    ) -> Result<Vec<ChildInfo>, ActorProcessingErr> {
        Ok(call!(sup, |reply| SupervisorMsg::ListChildren { reply })?)
    }

    /// Terminate all children and stop the supervisor; returns once the
    /// children are down.
    pub async fn shutdown(sup: &ActorRef<SupervisorMsg>) -> Result<(), ActorProcessingErr> {
        Ok(call!(sup, |reply| SupervisorMsg::Shutdown { reply })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::{ChildFactory, ChildRef};
    use crate::supervisor::{Supervisor, SupervisorArguments};
    use ractor::concurrency::{sleep, Duration};
    use ractor::{Actor, ActorProcessingErr, ActorRef};
    use serial_test::serial;

    struct IdleActor;

    #[ractor::async_trait]
    impl Actor for IdleActor {
        type Msg = ();
        type State = ();
        type Arguments = ();

        async fn pre_start(
            &self,
            _myself: ActorRef<Self::Msg>,
            _args: Self::Arguments,
        ) -> Result<Self::State, ActorProcessingErr> {
            Ok(())
        }
    }

    fn idle_child(key: &str) -> ChildSpec {
        ChildSpec::worker(
            key,
            ChildFactory::from_fn(|sup_cell, name| async move {
                let spawned = Supervisor::spawn_linked(name, IdleActor, (), sup_cell).await?;
                Ok(spawned.into())
            }),
        )
    }

    fn ignoring_child(key: &str, restart: RestartType) -> ChildSpec {
        ChildSpec::worker(
            key,
            ChildFactory::from_fn(|_cell, _name| async { Err(StartError::Ignore) }),
        )
        .restart_type(restart)
    }

    async fn empty_supervisor(
        name: &str,
    ) -> (
        ActorRef<SupervisorMsg>,
        ractor::concurrency::JoinHandle<()>,
    ) {
        Supervisor::spawn(
            name.to_string(),
            SupervisorArguments {
                child_specs: vec![],
                strategy: Default::default(),
            },
        )
        .await
        .expect("supervisor must spawn")
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn add_child_registers_without_starting() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-add").await;

        let res = Supervisor::add_child(&sup, idle_child("a")).await?;
        assert_eq!(res, AddChildResult::ChildAdded(ChildRef::Stopped));
        assert_eq!(
            Supervisor::lookup_child(&sup, "a").await?,
            Some(ChildRef::Stopped)
        );

        let dup = Supervisor::add_child(&sup, idle_child("a")).await?;
        assert_eq!(dup, AddChildResult::DuplicateChild(ChildRef::Stopped));

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn start_child_rejects_a_live_duplicate() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-start-dup").await;

        let res = Supervisor::start_child(&sup, idle_child("a")).await?;
        let StartChildResult::ChildAdded(ChildRef::Running(_)) = res else {
            panic!("expected a running child, got {res:?}");
        };

        let dup = Supervisor::start_child(&sup, idle_child("a")).await?;
        assert!(
            matches!(dup, StartChildResult::DuplicateChild(ChildRef::Running(_))),
            "got {dup:?}"
        );

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn start_child_revives_a_stopped_key() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-start-revive").await;

        Supervisor::start_child(&sup, idle_child("a")).await?;
        assert_eq!(
            Supervisor::terminate_child(&sup, "a").await?,
            TerminateChildResult::ChildTerminated
        );
        assert_eq!(
            Supervisor::lookup_child(&sup, "a").await?,
            Some(ChildRef::Stopped)
        );

        let res = Supervisor::start_child(&sup, idle_child("a")).await?;
        assert!(
            matches!(res, StartChildResult::ChildAdded(ChildRef::Running(_))),
            "got {res:?}"
        );

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn delete_child_refuses_live_and_converges_to_not_found(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-delete").await;

        Supervisor::start_child(&sup, idle_child("a")).await?;
        let res = Supervisor::delete_child(&sup, "a").await?;
        assert!(
            matches!(res, DeleteChildResult::ChildNotStopped(ChildRef::Running(_))),
            "got {res:?}"
        );

        Supervisor::terminate_child(&sup, "a").await?;
        assert_eq!(
            Supervisor::delete_child(&sup, "a").await?,
            DeleteChildResult::ChildDeleted
        );
        assert_eq!(
            Supervisor::delete_child(&sup, "a").await?,
            DeleteChildResult::ChildNotFound
        );
        assert_eq!(Supervisor::lookup_child(&sup, "a").await?, None);

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn restart_child_paths() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-restart").await;

        assert_eq!(
            Supervisor::restart_child(&sup, "ghost").await?,
            RestartChildResult::ChildRestartUnknownId
        );

        Supervisor::start_child(&sup, idle_child("a")).await?;
        let res = Supervisor::restart_child(&sup, "a").await?;
        assert!(
            matches!(
                res,
                RestartChildResult::ChildRestartFailed(RestartChildError::AlreadyRunning(
                    ChildRef::Running(_)
                ))
            ),
            "got {res:?}"
        );

        Supervisor::terminate_child(&sup, "a").await?;
        let res = Supervisor::restart_child(&sup, "a").await?;
        assert!(
            matches!(res, RestartChildResult::ChildRestartOk(ChildRef::Running(_))),
            "got {res:?}"
        );

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn terminate_child_unknown_key_is_not_found() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-term-unknown").await;

        assert_eq!(
            Supervisor::terminate_child(&sup, "ghost").await?,
            TerminateChildResult::ChildNotFound
        );

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn ignored_start_is_kept_unless_temporary() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-ignore").await;

        let res = Supervisor::start_child(&sup, ignoring_child("keepme", RestartType::Transient))
            .await?;
        assert_eq!(res, StartChildResult::ChildAdded(ChildRef::StartIgnored));
        assert_eq!(
            Supervisor::lookup_child(&sup, "keepme").await?,
            Some(ChildRef::StartIgnored)
        );

        let res = Supervisor::start_child(&sup, ignoring_child("dropme", RestartType::Temporary))
            .await?;
        assert_eq!(res, StartChildResult::ChildAdded(ChildRef::StartIgnored));
        assert_eq!(Supervisor::lookup_child(&sup, "dropme").await?, None);

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn unknown_launcher_label_fails_the_start() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-bad-closure").await;

        let spec = ChildSpec::worker("broken", ChildFactory::named("no-such-launcher"));
        let res = Supervisor::start_child(&sup, spec).await?;
        assert!(
            matches!(
                res,
                StartChildResult::ChildFailedToStart(StartError::BadClosure(_))
            ),
            "got {res:?}"
        );
        assert!(matches!(
            Supervisor::lookup_child(&sup, "broken").await?,
            Some(ChildRef::StartFailed(StartError::BadClosure(_)))
        ));

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn list_children_preserves_insertion_order() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-list").await;

        Supervisor::add_child(&sup, idle_child("one")).await?;
        Supervisor::start_child(&sup, idle_child("two")).await?;
        Supervisor::add_child(&sup, idle_child("three")).await?;

        let keys: Vec<String> = Supervisor::list_children(&sup)
            .await?
            .into_iter()
            .map(|info| info.key)
            .collect();
        assert_eq!(keys, vec!["one", "two", "three"]);

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn registered_name_reaches_the_runtime_registry(
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-names").await;

        let spec = idle_child("named").registered_name("well-known-worker");
        Supervisor::start_child(&sup, spec).await?;
        assert!(ractor::registry::where_is("well-known-worker".to_string()).is_some());

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        sleep(Duration::from_millis(50)).await;
        assert!(
            ractor::registry::where_is("well-known-worker".to_string()).is_none(),
            "the name is released once the child is down"
        );
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn shutdown_is_clean_with_live_children() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = empty_supervisor("api-shutdown").await;

        Supervisor::start_child(&sup, idle_child("a")).await?;
        Supervisor::start_child(&sup, idle_child("b")).await?;

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        assert_eq!(sup.get_status(), ractor::ActorStatus::Stopped);
        sleep(Duration::from_millis(10)).await;
        Ok(())
    }
}
