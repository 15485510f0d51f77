use ractor::concurrency::{timeout, Instant, JoinHandle};
use ractor::{
    Actor, ActorCell, ActorName, ActorProcessingErr, ActorRef, SpawnErr, SupervisionEvent,
};

use crate::api::{
    AddChildResult, ChildInfo, DeleteChildResult, RestartChildError, RestartChildResult,
    StartChildResult, SupervisorMsg, TerminateChildResult,
};
use crate::child::{
    ChildRef, ChildSpec, Delay, ExitAction, RestartType, StartError, TerminationPolicy,
};
use crate::core::{DiedReason, SupervisorError, EXIT_SHUTDOWN};
use crate::registry::{ChildRegistry, ChildState};
use crate::strategy::{RestartMode, RestartStrategy};
use crate::window::RestartHistory;

/// Everything needed to spawn a supervisor: the children it starts at
/// boot (in order) and the restart strategy governing them.
pub struct SupervisorArguments {
    /// Children started at boot, in insertion order. May be empty; more
    /// can be added at runtime via `addChild`/`startChild`.
    pub child_specs: Vec<ChildSpec>,
    /// Which siblings a failure drags into a restart, and the intensity
    /// cap.
    pub strategy: RestartStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Terminating,
}

/// What one start-engine pass produced.
enum StartOutcome {
    Started(ChildRef),
    Ignored,
    Failed(StartError),
}

/// Live state of a supervisor: the ordered registry, the restart window,
/// and the configured strategy. Mutated only from the actor's own
/// message loop.
pub struct SupervisorState {
    registry: ChildRegistry,
    history: RestartHistory,
    strategy: RestartStrategy,
    phase: Phase,
}

impl SupervisorState {
    fn new(args: SupervisorArguments) -> Result<Self, SupervisorError> {
        let mut registry = ChildRegistry::new();
        for spec in args.child_specs {
            let key = spec.key.clone();
            if registry.insert(spec).is_err() {
                return Err(SupervisorError::DuplicateInitialKey(key));
            }
        }
        Ok(Self {
            registry,
            history: RestartHistory::default(),
            strategy: args.strategy,
            phase: Phase::Running,
        })
    }

    fn sup_name(myself: &ActorRef<SupervisorMsg>) -> String {
        myself
            .get_name()
            .unwrap_or_else(|| myself.get_id().to_string())
    }

    /// Whether `key` is present and eligible for a (re)start during a
    /// group restart.
    fn restartable(&self, key: &str) -> bool {
        self.registry
            .get(key)
            .map(|e| e.spec.restart_type != RestartType::Temporary)
            .unwrap_or(false)
    }

    // ---- start engine ----------------------------------------------------

    /// Resolve the factory of `key`, spawn and monitor the child, and
    /// record the outcome in the registry.
    async fn start_entry(
        &mut self,
        key: &str,
        myself: &ActorRef<SupervisorMsg>,
    ) -> StartOutcome {
        let spec = match self.registry.get(key) {
            Some(entry) => entry.spec.clone(),
            None => {
                return StartOutcome::Failed(StartError::BadClosure(format!(
                    "no spec registered for '{key}'"
                )))
            }
        };

        let spawn_fn = match spec.factory.resolve() {
            Ok(f) => f,
            Err(err) => {
                log::error!("cannot resolve factory for child '{key}': {err}");
                self.registry
                    .set_state(key, ChildState::StartFailed(err.clone()));
                return StartOutcome::Failed(err);
            }
        };

        match spawn_fn(myself.get_cell(), spec.registered_name.clone()).await {
            Ok(spawned) => {
                let id = spawned.cell.get_id();
                log::info!("child '{key}' started as {id}");
                self.registry.set_state(
                    key,
                    ChildState::Running {
                        cell: spawned.cell,
                        join: spawned.join,
                    },
                );
                StartOutcome::Started(ChildRef::Running(id))
            }
            Err(StartError::Ignore) => {
                log::info!("child '{key}' ignored its start");
                if spec.restart_type == RestartType::Temporary {
                    self.registry.remove(key);
                } else {
                    self.registry.set_state(key, ChildState::StartIgnored);
                }
                StartOutcome::Ignored
            }
            Err(err) => {
                log::error!("error starting child '{key}': {err}");
                self.registry
                    .set_state(key, ChildState::StartFailed(err.clone()));
                StartOutcome::Failed(err)
            }
        }
    }

    // ---- termination engine ----------------------------------------------

    /// Terminate the live incarnation of `key` per its policy and wait for
    /// it to be down. Not live: no-op. A live `Temporary` child is removed
    /// from the registry once down.
    async fn terminate_entry(
        &mut self,
        key: &str,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Option<DiedReason> {
        let (policy, temporary) = {
            let entry = self.registry.get(key)?;
            (
                entry.spec.termination,
                entry.spec.restart_type == RestartType::Temporary,
            )
        };
        let (cell, mut join) = self.registry.take_running(key)?;

        // This exit is expected: tear the monitor down first so it never
        // reaches the restart engine.
        cell.unlink(myself.get_cell());

        let died = match policy {
            TerminationPolicy::Immediate => {
                cell.kill();
                let _ = join.await;
                DiedReason::killed_by(myself.get_id())
            }
            TerminationPolicy::Timeout(Delay::Infinite) => {
                cell.stop(Some(EXIT_SHUTDOWN.to_string()));
                let _ = join.await;
                DiedReason::Shutdown
            }
            TerminationPolicy::Timeout(Delay::Finite(grace)) => {
                cell.stop(Some(EXIT_SHUTDOWN.to_string()));
                match timeout(grace, &mut join).await {
                    Ok(_) => DiedReason::Shutdown,
                    Err(_) => {
                        log::warn!("child '{key}' did not shut down within {grace:?}, killing it");
                        cell.kill();
                        let _ = join.await;
                        DiedReason::killed_by(myself.get_id())
                    }
                }
            }
        };

        log::debug!("terminated child '{key}': {died}");
        if temporary {
            self.registry.remove(key);
        }
        Some(died)
    }

    /// Terminate every live child, newest spec first.
    async fn terminate_all(&mut self, myself: &ActorRef<SupervisorMsg>) {
        let mut keys = self.registry.keys();
        keys.reverse();
        for key in keys {
            self.terminate_entry(&key, myself).await;
        }
    }

    /// Terminate everything and stop the supervisor normally.
    async fn shut_down(&mut self, myself: &ActorRef<SupervisorMsg>) {
        self.phase = Phase::Terminating;
        self.terminate_all(myself).await;
        myself.stop(None);
    }

    /// Terminate everything and fail the supervisor with
    /// `ReachedMaxRestartIntensity`.
    async fn escalate(
        &mut self,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Result<(), ActorProcessingErr> {
        let supervisor = Self::sup_name(myself);
        log::error!("supervisor '{supervisor}' reached max restart intensity, giving up");
        self.phase = Phase::Terminating;
        self.terminate_all(myself).await;
        Err(SupervisorError::ReachedMaxRestartIntensity { supervisor }.into())
    }

    // ---- restart engine --------------------------------------------------

    /// Feed one monitor notification through the decision matrix.
    async fn on_child_down(
        &mut self,
        cell: ActorCell,
        died: DiedReason,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Result<(), ActorProcessingErr> {
        if self.phase == Phase::Terminating {
            return Ok(());
        }
        let Some(key) = self.registry.key_of_running(cell.get_id()) else {
            // Stale monitor: a previous incarnation, or a child we already
            // processed. Never state-changing.
            log::debug!("ignoring down notification from stale monitor {}", cell.get_id());
            return Ok(());
        };
        let Some(entry) = self.registry.get(&key) else {
            return Ok(());
        };
        let restart_type = entry.spec.restart_type;
        log::info!("child '{key}' exited: {died}");

        match restart_type.action_for(died.kind()) {
            ExitAction::Keep => {
                self.registry.set_state(&key, ChildState::Stopped);
                Ok(())
            }
            ExitAction::Forget => {
                self.registry.remove(&key);
                Ok(())
            }
            ExitAction::StopSupervisor => {
                log::info!("intrinsic child '{key}' is done, supervisor follows");
                self.registry.set_state(&key, ChildState::Stopped);
                self.shut_down(myself).await;
                Ok(())
            }
            ExitAction::Restart => {
                self.registry
                    .set_state(&key, ChildState::Restarting { last: cell.get_id() });
                self.restart_after_exit(&key, myself).await
            }
        }
    }

    /// Charge the window and run the configured strategy for a warranted
    /// restart of `key`.
    async fn restart_after_exit(
        &mut self,
        key: &str,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Result<(), ActorProcessingErr> {
        if !self.history.record(Instant::now(), self.strategy.limit()) {
            return self.escalate(myself).await;
        }
        match self.strategy {
            RestartStrategy::RestartOne { .. } => self.restart_one(key, myself).await,
            RestartStrategy::RestartRest { mode, .. } => {
                let keys = self.registry.keys_from(key);
                self.group_restart(keys, mode, myself).await
            }
            RestartStrategy::RestartAll { mode, .. } => {
                let keys = self.registry.keys();
                self.group_restart(keys, mode, myself).await
            }
        }
    }

    async fn restart_one(
        &mut self,
        key: &str,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Result<(), ActorProcessingErr> {
        match self.start_entry(key, myself).await {
            StartOutcome::Started(_) | StartOutcome::Ignored => Ok(()),
            StartOutcome::Failed(err) => self.after_failed_restart(key, err, myself).await,
        }
    }

    /// A failed restart is churn too: charge the window again and retry
    /// through the mailbox, so pending requests interleave between
    /// attempts while the window still bounds the loop.
    async fn after_failed_restart(
        &mut self,
        key: &str,
        err: StartError,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Result<(), ActorProcessingErr> {
        log::warn!("restart of child '{key}' failed: {err}");
        if !self.history.record(Instant::now(), self.strategy.limit()) {
            return self.escalate(myself).await;
        }
        myself.send_message(SupervisorMsg::RetryRestart {
            key: key.to_string(),
        })?;
        Ok(())
    }

    /// Cycle a group of siblings per the mode. Temporary members are
    /// terminated (and removed) but never restarted.
    async fn group_restart(
        &mut self,
        keys: Vec<String>,
        mode: RestartMode,
        myself: &ActorRef<SupervisorMsg>,
    ) -> Result<(), ActorProcessingErr> {
        let ordered = mode.direction().order(keys);
        match mode {
            RestartMode::RestartEach(_) => {
                for key in ordered {
                    self.terminate_entry(&key, myself).await;
                    if self.restartable(&key) {
                        if let StartOutcome::Failed(err) = self.start_entry(&key, myself).await {
                            self.after_failed_restart(&key, err, myself).await?;
                        }
                    }
                }
            }
            RestartMode::RestartInOrder(_) => {
                for key in &ordered {
                    self.terminate_entry(key, myself).await;
                }
                for key in ordered {
                    if self.restartable(&key) {
                        if let StartOutcome::Failed(err) = self.start_entry(&key, myself).await {
                            self.after_failed_restart(&key, err, myself).await?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ---- admin operations ------------------------------------------------

    fn add_child(&mut self, spec: ChildSpec) -> AddChildResult {
        match self.registry.insert(spec) {
            Ok(()) => AddChildResult::ChildAdded(ChildRef::Stopped),
            Err(existing) => AddChildResult::DuplicateChild(existing),
        }
    }

    async fn start_child(
        &mut self,
        spec: ChildSpec,
        myself: &ActorRef<SupervisorMsg>,
    ) -> StartChildResult {
        let key = spec.key.clone();
        match self.registry.get_mut(&key) {
            Some(entry) if entry.state.is_live() => {
                return StartChildResult::DuplicateChild(entry.state.as_child_ref());
            }
            // Present but idle: adopt the caller's spec and start it.
            Some(entry) => entry.spec = spec,
            None => {
                // Fresh key; cannot collide, we just looked it up.
                let _ = self.registry.insert(spec);
            }
        }
        match self.start_entry(&key, myself).await {
            StartOutcome::Started(child_ref) => StartChildResult::ChildAdded(child_ref),
            StartOutcome::Ignored => StartChildResult::ChildAdded(ChildRef::StartIgnored),
            StartOutcome::Failed(err) => StartChildResult::ChildFailedToStart(err),
        }
    }

    async fn terminate_child(
        &mut self,
        key: &str,
        myself: &ActorRef<SupervisorMsg>,
    ) -> TerminateChildResult {
        if !self.registry.contains(key) {
            return TerminateChildResult::ChildNotFound;
        }
        self.terminate_entry(key, myself).await;
        // A queued restart retry must not revive an administratively
        // terminated child; the retry only fires on `StartFailed`.
        if matches!(
            self.registry.get(key).map(|e| &e.state),
            Some(ChildState::StartFailed(_))
        ) {
            self.registry.set_state(key, ChildState::Stopped);
        }
        TerminateChildResult::ChildTerminated
    }

    async fn restart_child(
        &mut self,
        key: &str,
        myself: &ActorRef<SupervisorMsg>,
    ) -> RestartChildResult {
        match self.registry.get(key) {
            None => return RestartChildResult::ChildRestartUnknownId,
            Some(entry) if entry.state.is_live() => {
                return RestartChildResult::ChildRestartFailed(RestartChildError::AlreadyRunning(
                    entry.state.as_child_ref(),
                ));
            }
            Some(_) => {}
        }
        match self.start_entry(key, myself).await {
            StartOutcome::Started(child_ref) => RestartChildResult::ChildRestartOk(child_ref),
            StartOutcome::Ignored => RestartChildResult::ChildRestartOk(ChildRef::StartIgnored),
            StartOutcome::Failed(err) => {
                RestartChildResult::ChildRestartFailed(RestartChildError::Start(err))
            }
        }
    }

    fn delete_child(&mut self, key: &str) -> DeleteChildResult {
        match self.registry.get(key) {
            None => DeleteChildResult::ChildNotFound,
            Some(entry) if entry.state.is_live() => {
                DeleteChildResult::ChildNotStopped(entry.state.as_child_ref())
            }
            Some(_) => {
                self.registry.remove(key);
                DeleteChildResult::ChildDeleted
            }
        }
    }

    fn lookup_child(&self, key: &str) -> Option<ChildRef> {
        self.registry.get(key).map(|e| e.state.as_child_ref())
    }

    fn list_children(&self) -> Vec<ChildInfo> {
        self.registry
            .entries()
            .map(|e| ChildInfo {
                key: e.spec.key.clone(),
                child_type: e.spec.child_type,
                restart_type: e.spec.restart_type,
                child_ref: e.state.as_child_ref(),
            })
            .collect()
    }
}

/// The supervisor actor. Spawns its initial children in `post_start`,
/// serves administrative requests, and feeds monitor notifications into
/// the restart engine. On meltdown it terminates the remaining children
/// and exits abnormally.
pub struct Supervisor;

impl Supervisor {
    /// Spawn an unsupervised (root) supervisor.
    pub async fn spawn(
        name: ActorName,
        args: SupervisorArguments,
    ) -> Result<(ActorRef<SupervisorMsg>, JoinHandle<()>), SpawnErr> {
        Actor::spawn(Some(name), Supervisor, args).await
    }

    /// Spawn any actor linked to (monitored by) the given supervisor
    /// cell. Child factories should spawn through this so the monitor is
    /// in place before the supervisor registers the child.
    pub async fn spawn_linked<T: Actor>(
        name: Option<ActorName>,
        handler: T,
        startup_args: T::Arguments,
        supervisor: ActorCell,
    ) -> Result<(ActorRef<T::Msg>, JoinHandle<()>), SpawnErr> {
        Actor::spawn_linked(name, handler, startup_args, supervisor).await
    }
}

#[ractor::async_trait]
impl Actor for Supervisor {
    type Msg = SupervisorMsg;
    type State = SupervisorState;
    type Arguments = SupervisorArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(SupervisorState::new(args)?)
    }

    /// Start the configured children in insertion order. A start failure
    /// is retried in place, charging the window each time; when the
    /// window runs out, everything started so far is torn down again and
    /// the supervisor fails.
    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut SupervisorState,
    ) -> Result<(), ActorProcessingErr> {
        for key in state.registry.keys() {
            loop {
                match state.start_entry(&key, &myself).await {
                    StartOutcome::Started(_) | StartOutcome::Ignored => break,
                    StartOutcome::Failed(err) => {
                        log::warn!("boot of child '{key}' failed: {err}");
                        if !state.history.record(Instant::now(), state.strategy.limit()) {
                            return state.escalate(&myself).await;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        msg: SupervisorMsg,
        state: &mut SupervisorState,
    ) -> Result<(), ActorProcessingErr> {
        match msg {
            SupervisorMsg::AddChild { spec, reply } => {
                let res = state.add_child(spec);
                if reply.send(res).is_err() {
                    log::debug!("addChild caller went away before the reply");
                }
            }
            SupervisorMsg::StartChild { spec, reply } => {
                let res = state.start_child(spec, &myself).await;
                if reply.send(res).is_err() {
                    log::debug!("startChild caller went away before the reply");
                }
            }
            SupervisorMsg::TerminateChild { key, reply } => {
                let res = state.terminate_child(&key, &myself).await;
                if reply.send(res).is_err() {
                    log::debug!("terminateChild caller went away before the reply");
                }
            }
            SupervisorMsg::RestartChild { key, reply } => {
                let res = state.restart_child(&key, &myself).await;
                if reply.send(res).is_err() {
                    log::debug!("restartChild caller went away before the reply");
                }
            }
            SupervisorMsg::DeleteChild { key, reply } => {
                let res = state.delete_child(&key);
                if reply.send(res).is_err() {
                    log::debug!("deleteChild caller went away before the reply");
                }
            }
            SupervisorMsg::LookupChild { key, reply } => {
                if reply.send(state.lookup_child(&key)).is_err() {
                    log::debug!("lookupChild caller went away before the reply");
                }
            }
            SupervisorMsg::ListChildren { reply } => {
                if reply.send(state.list_children()).is_err() {
                    log::debug!("listChildren caller went away before the reply");
                }
            }
            SupervisorMsg::Shutdown { reply } => {
                log::info!("supervisor '{}' shutting down", SupervisorState::sup_name(&myself));
                state.shut_down(&myself).await;
                if reply.send(()).is_err() {
                    log::debug!("shutdown caller went away before the reply");
                }
            }
            SupervisorMsg::RetryRestart { key } => {
                let pending = matches!(
                    state.registry.get(&key).map(|e| &e.state),
                    Some(ChildState::StartFailed(_))
                );
                if state.phase == Phase::Running && pending {
                    state.restart_one(&key, &myself).await?;
                }
            }
        }
        Ok(())
    }

    /// Monitor notifications from linked children.
    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        evt: SupervisionEvent,
        state: &mut SupervisorState,
    ) -> Result<(), ActorProcessingErr> {
        match evt {
            SupervisionEvent::ActorStarted(cell) => {
                log::debug!("actor {} started under this supervisor", cell.get_id());
            }
            SupervisionEvent::ActorTerminated(cell, _final_state, reason) => {
                let died = DiedReason::from_stop_reason(reason);
                state.on_child_down(cell, died, &myself).await?;
            }
            SupervisionEvent::ActorFailed(cell, err) => {
                let died = DiedReason::Exception(err.to_string());
                state.on_child_down(cell, died, &myself).await?;
            }
            SupervisionEvent::ProcessGroupChanged(_group) => {}
        }
        Ok(())
    }

    /// Best-effort cleanup for externally requested stops; after a normal
    /// shutdown there is nothing live left to terminate. Meltdown exits
    /// skip this (children were already terminated by the escalation).
    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut SupervisorState,
    ) -> Result<(), ActorProcessingErr> {
        state.phase = Phase::Terminating;
        state.terminate_all(&myself).await;
        Ok(())
    }
}
