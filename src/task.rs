//! Run plain async closures as supervised children.
//!
//! A task is a child actor that executes one future and then stops
//! normally. Tasks default to [`RestartType::Temporary`], so a finished
//! task disappears from the supervisor; pick another restart type to have
//! the closure re-run when it fails.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use uuid::Uuid;

use crate::api::{StartChildResult, SupervisorMsg, TerminateChildResult};
use crate::child::{ChildFactory, ChildSpec, RestartType, TerminationPolicy};
use crate::supervisor::Supervisor;

/// The closure a task runs. Re-invoked on every (re)start of the task.
#[derive(Clone)]
pub struct TaskFn(Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>);

impl TaskFn {
    /// Wrap an async closure.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        TaskFn(Arc::new(move || Box::pin(factory())))
    }
}

/// The actor wrapping one task execution.
pub struct TaskActor;

#[ractor::async_trait]
impl Actor for TaskActor {
    type Msg = ();
    type State = TaskFn;
    type Arguments = TaskFn;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        task: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(task)
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        task: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        (task.0)().await;
        myself.stop(None);
        Ok(())
    }
}

/// Per-task knobs, builder style.
pub struct TaskOptions {
    /// Child key for the task; defaults to a fresh UUID.
    pub key: String,
    /// Restart policy; defaults to `Temporary`.
    pub restart: RestartType,
    /// Termination policy; defaults to the worker default.
    pub termination: Option<TerminationPolicy>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            key: Uuid::new_v4().to_string(),
            restart: RestartType::Temporary,
            termination: None,
        }
    }
}

impl TaskOptions {
    /// Defaults: random key, `Temporary`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this key instead of a generated one.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Restart the task per this policy.
    pub fn restart_type(mut self, restart: RestartType) -> Self {
        self.restart = restart;
        self
    }

    /// Terminate the task per this policy.
    pub fn termination(mut self, policy: TerminationPolicy) -> Self {
        self.termination = Some(policy);
        self
    }
}

/// Client helpers for supervised tasks.
pub struct Task;

impl Task {
    /// Build the child spec a task runs under, without starting it.
    pub fn child_spec<F, Fut>(options: TaskOptions, task: F) -> ChildSpec
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = TaskFn::new(task);
        let mut spec = ChildSpec::worker(
            options.key,
            ChildFactory::from_fn(move |sup_cell, name| {
                let task = task.clone();
                async move {
                    let spawned = Supervisor::spawn_linked(name, TaskActor, task, sup_cell).await?;
                    Ok(spawned.into())
                }
            }),
        )
        .restart_type(options.restart);
        if let Some(policy) = options.termination {
            spec = spec.termination(policy);
        }
        spec
    }

    /// Start `task` under `sup` and return its child key.
    pub async fn start<F, Fut>(
        sup: &ActorRef<SupervisorMsg>,
        options: TaskOptions,
        task: F,
    ) -> Result<String, ActorProcessingErr>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let spec = Self::child_spec(options, task);
        let key = spec.key.clone();
        match Supervisor::start_child(sup, spec).await? {
            StartChildResult::ChildAdded(_) => Ok(key),
            StartChildResult::ChildFailedToStart(err) => Err(err.into()),
            StartChildResult::DuplicateChild(_) => {
                Err(format!("task key '{key}' already in use").into())
            }
        }
    }

    /// Terminate a running task.
    pub async fn terminate(
        sup: &ActorRef<SupervisorMsg>,
        key: impl Into<String>,
    ) -> Result<TerminateChildResult, ActorProcessingErr> {
        Supervisor::terminate_child(sup, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::SupervisorArguments;
    use ractor::concurrency::{sleep, Duration};
    use serial_test::serial;
    use tokio::sync::mpsc;

    async fn task_supervisor(
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
    async fn task_runs_once_and_disappears() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = task_supervisor("task-once").await;

        let (tx, mut rx) = mpsc::channel(1);
        let key = Task::start(&sup, TaskOptions::new().key("background-task"), move || {
            let tx = tx.clone();
            async move {
                tx.send(()).await.unwrap();
            }
        })
        .await?;

        rx.recv().await.expect("task must run");
        sleep(Duration::from_millis(100)).await;

        // Temporary by default: the finished task leaves no entry behind.
        assert_eq!(Supervisor::lookup_child(&sup, key).await?, None);

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn terminated_task_never_completes() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = task_supervisor("task-terminate").await;

        let (tx, mut rx) = mpsc::channel(1);
        let key = Task::start(
            &sup,
            TaskOptions::new().termination(TerminationPolicy::Immediate),
            move || {
                let tx = tx.clone();
                async move {
                    sleep(Duration::from_secs(10)).await;
                    tx.send(()).await.unwrap();
                }
            },
        )
        .await?;

        Task::terminate(&sup, key.clone()).await?;
        let raced = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(raced.is_err(), "task must have been cut short");
        assert_eq!(Supervisor::lookup_child(&sup, key).await?, None);

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }

    #[ractor::concurrency::test]
    #[serial]
    async fn permanent_task_reruns_after_completion() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sup, handle) = task_supervisor("task-rerun").await;

        let (tx, mut rx) = mpsc::channel(8);
        Task::start(
            &sup,
            TaskOptions::new()
                .key("heartbeat")
                .restart_type(RestartType::Permanent)
                .termination(TerminationPolicy::Immediate),
            move || {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(()).await;
                    // Stay up long enough that reruns don't trip the
                    // restart window.
                    sleep(Duration::from_secs(30)).await;
                }
            },
        )
        .await?;

        rx.recv().await.expect("first run");
        Supervisor::terminate_child(&sup, "heartbeat").await?;
        // An administratively terminated permanent task stays stopped
        // until restarted explicitly.
        let res = Supervisor::restart_child(&sup, "heartbeat").await?;
        assert!(
            matches!(res, crate::api::RestartChildResult::ChildRestartOk(_)),
            "got {res:?}"
        );
        rx.recv().await.expect("second run");

        Supervisor::shutdown(&sup).await?;
        let _ = handle.await;
        Ok(())
    }
}
