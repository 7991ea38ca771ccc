// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Aurelia runtime: startup, the heartbeat loop, and shutdown.
//!
//! The orchestrator is a single logical loop. Workers run as background
//! tasks holding external processes; all mutation of runtime state,
//! tasks, candidates, and evaluations happens here, between suspension
//! points. Completion handles are polled at the top of each tick.

mod pipeline;
mod recovery;
#[cfg(test)]
mod test_support;

use crate::components::{run_component, WorkerContext};
use crate::config::load_runtime_config;
use crate::dispatch::{DefaultDispatcher, DispatchContext, Dispatcher, PlanDispatcher};
use crate::error::RuntimeError;
use crate::events::{EventSink, WorkerEvent};
use aurelia_adapters::subprocess::process_alive;
use aurelia_adapters::{DockerClient, GitRepo, WorktreeManager};
use aurelia_core::{
    Candidate, DispatcherKind, Evaluation, Event, IdGenerator, RuntimeConfig, RuntimeState,
    RuntimeStatus, Task, TaskResult, TaskStatus, TerminationCondition,
};
use aurelia_storage::{EventLog, StateStore};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Reserved branch for planner runs.
pub(crate) const PLANNER_BRANCH: &str = "aurelia/planner";

/// Grace period for a worker to observe cancellation during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The orchestrator.
pub struct Runtime {
    pub(crate) project_dir: PathBuf,
    pub(crate) aurelia_dir: PathBuf,
    pub(crate) config: RuntimeConfig,
    pub(crate) condition: TerminationCondition,
    /// Problem statement text from the project README.
    pub(crate) instruction: String,

    pub(crate) store: StateStore,
    pub(crate) event_log: EventLog,
    pub(crate) state: RuntimeState,
    pub(crate) tasks: Vec<Task>,
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) evaluations: Vec<Evaluation>,

    pub(crate) dispatcher: Box<dyn Dispatcher>,
    pub(crate) git: GitRepo,
    pub(crate) worktrees: WorktreeManager,
    pub(crate) docker: DockerClient,

    /// Join handles of in-flight workers, keyed by task ID.
    pub(crate) running: HashMap<String, JoinHandle<TaskResult>>,
    /// The planner task of the current planning round, if any.
    pub(crate) planner_task_id: Option<String>,

    pub(crate) shutdown: CancellationToken,
    pub(crate) worker_events: EventSink,
    pub(crate) worker_events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl Runtime {
    /// Load configuration and persisted state for a project directory.
    pub fn new(project_dir: impl Into<PathBuf>) -> Result<Self, RuntimeError> {
        let project_dir = project_dir.into();
        let aurelia_dir = project_dir.join(".aurelia");

        let config = load_runtime_config(&aurelia_dir)?;
        let condition = TerminationCondition::parse(&config.termination_condition);

        let store = StateStore::new(&aurelia_dir);
        store.initialize()?;
        let event_log = EventLog::new(aurelia_dir.join("logs").join("events.jsonl"));

        let state = store.load_runtime();
        let tasks = store.load_tasks();
        let candidates = store.load_candidates();
        let evaluations = store.load_evaluations();

        let git = GitRepo::new(&project_dir);
        let worktrees = WorktreeManager::new(git.clone(), aurelia_dir.join("worktrees"));

        let instruction = std::fs::read_to_string(project_dir.join("README.md")).unwrap_or_default();

        let mut dispatcher: Box<dyn Dispatcher> = match config.dispatcher {
            DispatcherKind::Default => Box::new(DefaultDispatcher::new()),
            DispatcherKind::Planner => Box::new(PlanDispatcher::new(store.load_plan())),
        };
        dispatcher.initialize(DispatchContext {
            project_dir: project_dir.clone(),
            instruction: instruction.clone(),
            candidates: candidates.clone(),
            evaluations: evaluations.clone(),
            config: config.clone(),
        });

        let planner_task_id = tasks
            .iter()
            .rev()
            .find(|t| t.component == aurelia_core::Component::Planner)
            .map(|t| t.id.clone());

        let (worker_events, worker_events_rx) = EventSink::channel();

        Ok(Self {
            project_dir,
            aurelia_dir,
            config,
            condition,
            instruction,
            store,
            event_log,
            state,
            tasks,
            candidates,
            evaluations,
            dispatcher,
            git,
            worktrees,
            docker: DockerClient::new(),
            running: HashMap::new(),
            planner_task_id,
            shutdown: CancellationToken::new(),
            worker_events,
            worker_events_rx,
        })
    }

    /// Token that stops the heartbeat loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signal the runtime to shut down gracefully.
    pub fn stop(&self) {
        info!("shutdown requested");
        self.shutdown.cancel();
    }

    /// Initialize all infrastructure and run the heartbeat loop until
    /// shutdown.
    pub async fn start(&mut self) -> Result<(), RuntimeError> {
        self.check_pid_sentinel()?;
        self.git.init().await?;

        // Crash recovery must complete before the status flips to running
        let recovered = self.recover().await?;
        if recovered > 0 {
            info!(tasks_recovered = recovered, "crash recovery complete");
        }

        self.state.status = RuntimeStatus::Running;
        self.state.started_at = Some(Utc::now());
        std::fs::write(self.store.pid_path(), std::process::id().to_string())?;

        self.install_signal_handlers()?;
        self.emit("runtime.started", json!({"pid": std::process::id()}))?;
        self.persist()?;
        info!(pid = std::process::id(), "aurelia runtime started");

        self.heartbeat_loop().await;
        self.shutdown_sequence().await;
        info!("aurelia runtime stopped");
        Ok(())
    }

    /// Enforce single-orchestrator-per-project via the PID sentinel.
    ///
    /// A sentinel naming a live process fails startup; a stale sentinel is
    /// removed and startup continues into crash recovery.
    fn check_pid_sentinel(&self) -> Result<(), RuntimeError> {
        let pid_path = self.store.pid_path();
        let raw = match std::fs::read_to_string(&pid_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match raw.trim().parse::<i32>() {
            Ok(pid) if process_alive(pid) => Err(RuntimeError::AlreadyRunning { pid }),
            Ok(pid) => {
                info!(pid, "removing stale pid sentinel");
                std::fs::remove_file(&pid_path)?;
                Ok(())
            }
            Err(_) => {
                warn!(path = %pid_path.display(), "unparseable pid sentinel; removing");
                std::fs::remove_file(&pid_path)?;
                Ok(())
            }
        }
    }

    fn install_signal_handlers(&self) -> Result<(), RuntimeError> {
        let token = self.shutdown.clone();
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("received SIGINT, shutting down"),
            }
            token.cancel();
        });
        Ok(())
    }

    async fn heartbeat_loop(&mut self) {
        while !self.shutdown.is_cancelled() {
            if let Err(e) = self.tick().await {
                // The tick is abandoned; the next interval retries
                error!(error = %e, "heartbeat tick failed");
            }
            if self.shutdown.is_cancelled() {
                break;
            }
            let interval = Duration::from_secs(self.config.heartbeat_interval_s.max(1));
            tokio::select! {
                _ = self.shutdown.cancelled() => {}
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// One heartbeat: collect completions, advance pipelines, decide
    /// termination, plan, fill slots, persist.
    async fn tick(&mut self) -> Result<(), RuntimeError> {
        self.state.heartbeat_count += 1;
        self.state.last_heartbeat_at = Some(Utc::now());
        self.emit("heartbeat", json!({"count": self.state.heartbeat_count}))?;

        self.drain_worker_events()?;
        self.collect_completions().await?;
        self.advance_pipelines().await?;

        if !self.check_termination()? {
            self.run_planning().await?;
            self.fill_slots().await?;
        }

        self.drain_worker_events()?;
        self.persist()?;
        Ok(())
    }

    /// Reap finished background workers and finalize their tasks.
    async fn collect_completions(&mut self) -> Result<(), RuntimeError> {
        let finished: Vec<String> = self
            .running
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(task_id, _)| task_id.clone())
            .collect();

        for task_id in finished {
            let Some(handle) = self.running.remove(&task_id) else {
                continue;
            };
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(%task_id, error = %e, "worker crashed");
                    TaskResult::failed(format!("worker crashed: {e}"))
                }
            };
            // Sequence the worker's own events before its completion event
            self.drain_worker_events()?;
            self.finish_task(&task_id, result)?;
        }
        Ok(())
    }

    fn finish_task(&mut self, task_id: &str, result: TaskResult) -> Result<(), RuntimeError> {
        if let Some(usage) = &result.usage {
            self.state.total_tokens_used += usage.total_tokens();
            self.state.total_cost_usd += usage.cost_usd;
        }

        let failed = result.is_err();
        let summary = result.summary.clone();
        let error = result.error.clone();

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            warn!(%task_id, "completion for unknown task");
            return Ok(());
        };
        task.completed_at = Some(Utc::now());
        task.result = Some(result);
        if failed {
            task.status = TaskStatus::Failed;
            self.state.total_tasks_failed += 1;
            self.emit("task.failed", json!({"task_id": task_id, "error": error}))?;
        } else {
            task.status = TaskStatus::Success;
            self.state.total_tasks_completed += 1;
            self.emit(
                "task.completed",
                json!({"task_id": task_id, "summary": summary}),
            )?;
        }
        Ok(())
    }

    /// Check the termination rules. Never fires while work is in flight.
    fn check_termination(&mut self) -> Result<bool, RuntimeError> {
        if !self.running.is_empty() {
            return Ok(false);
        }

        if !self.condition.is_empty() && self.evaluations.iter().any(|e| e.passed) {
            self.emit(
                "runtime.terminated",
                json!({"reason": "termination_condition_met"}),
            )?;
            self.shutdown.cancel();
            return Ok(true);
        }

        let failed = self
            .candidates
            .iter()
            .filter(|c| c.status == aurelia_core::CandidateStatus::Failed)
            .count();
        if self.config.candidate_abandon_threshold > 0
            && failed >= self.config.candidate_abandon_threshold
        {
            self.emit(
                "runtime.terminated",
                json!({"reason": "abandon_threshold_reached"}),
            )?;
            self.shutdown.cancel();
            return Ok(true);
        }

        Ok(false)
    }

    /// Launch a worker for `task` and track its handle.
    pub(crate) fn spawn_task(&mut self, mut task: Task) -> Result<(), RuntimeError> {
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
        self.emit("task.started", json!({"task_id": task.id}))?;

        let ctx = WorkerContext {
            task: task.clone(),
            config: self.config.clone(),
            project_dir: self.project_dir.clone(),
            aurelia_dir: self.aurelia_dir.clone(),
            events: self.worker_events.clone(),
            docker: self.docker.clone(),
            cancel: self.shutdown.child_token(),
        };
        let timeout = Duration::from_secs(self.config.task_timeout_s.max(1));
        let task_id = task.id.clone();
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(timeout, run_component(ctx)).await {
                Ok(result) => result,
                Err(_) => TaskResult::failed(format!("task timed out after {}s", timeout.as_secs())),
            }
        });

        self.tasks.push(task);
        self.running.insert(task_id, handle);
        Ok(())
    }

    /// Append an event with the next global sequence number.
    pub(crate) fn emit(&mut self, kind: &str, data: Value) -> Result<(), RuntimeError> {
        let seq = IdGenerator::next_event_seq(&mut self.state);
        self.event_log.append(&Event::new(seq, kind, data))?;
        Ok(())
    }

    /// Sequence and append events queued by workers, in arrival order.
    pub(crate) fn drain_worker_events(&mut self) -> Result<(), RuntimeError> {
        while let Ok((kind, data)) = self.worker_events_rx.try_recv() {
            self.emit(&kind, data)?;
        }
        Ok(())
    }

    /// Snapshot all entity kinds. Runs at the end of every tick, so the
    /// snapshots reflect every event emitted through this tick.
    pub(crate) fn persist(&mut self) -> Result<(), RuntimeError> {
        self.store.save_runtime(&self.state)?;
        self.store.save_tasks(&self.tasks)?;
        self.store.save_candidates(&self.candidates)?;
        self.store.save_evaluations(&self.evaluations)?;
        if let Some(plan) = self.dispatcher.current_plan() {
            self.store.save_plan(plan)?;
        }
        Ok(())
    }

    /// Graceful shutdown: cancel workers, mark their tasks cancelled,
    /// persist, and release the PID sentinel.
    async fn shutdown_sequence(&mut self) {
        self.shutdown.cancel();

        let handles: Vec<(String, JoinHandle<TaskResult>)> = self.running.drain().collect();
        for (task_id, mut handle) in handles {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!(%task_id, "worker ignored cancellation; aborting");
                handle.abort();
                let _ = handle.await;
            }
            if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
                if !task.status.is_terminal() {
                    task.status = TaskStatus::Cancelled;
                    task.completed_at = Some(Utc::now());
                }
            }
        }

        if let Err(e) = self.drain_worker_events() {
            warn!(error = %e, "could not flush worker events during shutdown");
        }

        self.state.status = RuntimeStatus::Stopped;
        self.state.stopped_at = Some(Utc::now());
        if let Err(e) = self.emit("runtime.stopped", json!({})) {
            warn!(error = %e, "could not emit runtime.stopped");
        }
        if let Err(e) = self.persist() {
            error!(error = %e, "could not persist final state");
        }
        if let Err(e) = std::fs::remove_file(self.store.pid_path()) {
            warn!(error = %e, "could not remove pid sentinel");
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
