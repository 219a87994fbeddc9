// SPDX-License-Identifier: MIT

//! Workflow runner
//!
//! Drives threads through a compiled [`Workflow`]: execute the node under the
//! cursor, merge its delta, route, checkpoint, persist, repeat. A node that
//! asks for a decision stops the loop; the thread is persisted with its
//! interrupt records and the first record is handed back to the caller.
//!
//! How an invocation is interpreted depends on the thread:
//!
//! | thread        | `Values`                   | `Resume`                 | `Continue`          |
//! |---------------|----------------------------|--------------------------|---------------------|
//! | new           | seed state, start          | `NoPendingInterrupt`     | `ThreadNotFound`    |
//! | `Ready`       | merge, continue at cursor  | `NoPendingInterrupt`     | continue at cursor  |
//! | `Completed`   | merge, restart at start    | `NoPendingInterrupt`     | return final state  |
//! | `Interrupted` | `InvalidResumeInput`       | resolve the next record  | `InvalidResumeInput`|
//! | `Resumable`   | `InvalidResumeInput`       | `NoPendingInterrupt`     | re-enter paused node|
//!
//! A decision can also arrive separately from the invocation that applies
//! it: [`InterruptBroker::submit_resume`] (via [`WorkflowRunner::broker`])
//! resolves the record and leaves the thread `Resumable`, and a following
//! `invoke(.., Continue)` runs the paused node with that decision. Sending
//! `Resume` at that point is `NoPendingInterrupt`, since the record is
//! already resolved.

use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use crate::adk::error::{Result, TollgateError};
use crate::adk::model::Content;
use crate::tollgate::config::RunnerConfig;
use crate::tollgate::workflow::executor::StepExecutor;
use crate::tollgate::workflow::graph::{NodeOutcome, Workflow, END};
use crate::tollgate::workflow::interrupt::{
    InterruptBroker, InterruptRecord, ResumeDecision, ResumeStatus,
};
use crate::tollgate::workflow::state::{StateDelta, StateSnapshot};
use crate::tollgate::workflow::store::{
    Checkpoint, Thread, ThreadGuard, ThreadLocks, ThreadStatus, ThreadStore,
};

/// What the caller sends with an invocation
#[derive(Debug, Clone, PartialEq)]
pub enum RunInput {
    /// New state values, merged through the schema's reducers
    Values(StateDelta),
    /// Answer to the thread's oldest pending interrupt
    Resume(ResumeDecision),
    /// Run from the stored cursor without new input
    Continue,
}

impl RunInput {
    /// A single user message
    pub fn message(text: impl Into<String>) -> Result<Self> {
        Ok(Self::Values(StateDelta::new().message(&Content::user(text))?))
    }
}

/// Where an invocation stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { state: StateSnapshot },
    Interrupted { interrupt: InterruptRecord },
}

impl RunOutcome {
    pub fn interrupt(&self) -> Option<&InterruptRecord> {
        match self {
            RunOutcome::Interrupted { interrupt } => Some(interrupt),
            RunOutcome::Completed { .. } => None,
        }
    }

    pub fn state(&self) -> Option<&StateSnapshot> {
        match self {
            RunOutcome::Completed { state } => Some(state),
            RunOutcome::Interrupted { .. } => None,
        }
    }
}

/// One item of [`WorkflowRunner::stream`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A node committed a step
    Update {
        step: u64,
        node: String,
        delta: StateDelta,
        next: Option<String>,
    },
    /// The thread paused
    Interrupt { interrupt: InterruptRecord },
    /// The thread reached a terminal node
    End { state: StateSnapshot },
}

impl From<RunOutcome> for StreamEvent {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed { state } => StreamEvent::End { state },
            RunOutcome::Interrupted { interrupt } => StreamEvent::Interrupt { interrupt },
        }
    }
}

enum Prepared {
    Run(Thread),
    Done(RunOutcome),
}

enum Advance {
    Step(StreamEvent),
    Finished(RunOutcome),
}

enum StreamState {
    Start {
        runner: WorkflowRunner,
        thread_id: String,
        input: RunInput,
    },
    Running {
        runner: WorkflowRunner,
        guard: ThreadGuard,
        thread: Box<Thread>,
        steps: u32,
    },
    Done,
}

#[derive(Clone)]
pub struct WorkflowRunner {
    workflow: Arc<Workflow>,
    executor: StepExecutor,
    store: Arc<dyn ThreadStore>,
    locks: Arc<ThreadLocks>,
    broker: Arc<InterruptBroker>,
    config: RunnerConfig,
}

impl WorkflowRunner {
    pub fn new(
        workflow: Workflow,
        executor: StepExecutor,
        store: Arc<dyn ThreadStore>,
        config: RunnerConfig,
    ) -> Self {
        let locks = Arc::new(ThreadLocks::new());
        let broker = Arc::new(InterruptBroker::new(
            store.clone(),
            locks.clone(),
            config.busy_policy,
        ));
        Self {
            workflow: Arc::new(workflow),
            executor,
            store,
            locks,
            broker,
            config,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Broker sharing this runner's store and locks
    pub fn broker(&self) -> Arc<InterruptBroker> {
        self.broker.clone()
    }

    /// Run until a terminal node or an interrupt
    pub async fn invoke(&self, thread_id: &str, input: RunInput) -> Result<RunOutcome> {
        let _guard = self.locks.acquire(thread_id, self.config.busy_policy).await?;
        let mut thread = match self.prepare(thread_id, input).await? {
            Prepared::Run(thread) => thread,
            Prepared::Done(outcome) => return Ok(outcome),
        };

        let mut steps = 0;
        loop {
            if let Advance::Finished(outcome) = self.advance(&mut thread, &mut steps).await? {
                return Ok(outcome);
            }
        }
    }

    /// Like [`invoke`](Self::invoke), yielding one event per committed step.
    ///
    /// Nothing runs until the stream is polled. Each step is persisted before
    /// its event is yielded, so dropping the stream leaves the thread at the
    /// last yielded step. The stream ends after an `Interrupt`, an `End` or an
    /// error.
    pub fn stream(
        &self,
        thread_id: impl Into<String>,
        input: RunInput,
    ) -> BoxStream<'static, Result<StreamEvent>> {
        let start = StreamState::Start {
            runner: self.clone(),
            thread_id: thread_id.into(),
            input,
        };
        stream::unfold(start, |state| async move {
            match state {
                StreamState::Start {
                    runner,
                    thread_id,
                    input,
                } => {
                    let guard = match runner
                        .locks
                        .acquire(&thread_id, runner.config.busy_policy)
                        .await
                    {
                        Ok(guard) => guard,
                        Err(e) => return Some((Err(e), StreamState::Done)),
                    };
                    match runner.prepare(&thread_id, input).await {
                        Ok(Prepared::Run(thread)) => {
                            runner.stream_step(guard, Box::new(thread), 0).await
                        }
                        Ok(Prepared::Done(outcome)) => Some((Ok(outcome.into()), StreamState::Done)),
                        Err(e) => Some((Err(e), StreamState::Done)),
                    }
                }
                StreamState::Running {
                    runner,
                    guard,
                    thread,
                    steps,
                } => runner.stream_step(guard, thread, steps).await,
                StreamState::Done => None,
            }
        })
        .boxed()
    }

    async fn stream_step(
        self,
        guard: ThreadGuard,
        mut thread: Box<Thread>,
        mut steps: u32,
    ) -> Option<(Result<StreamEvent>, StreamState)> {
        match self.advance(&mut thread, &mut steps).await {
            Ok(Advance::Step(event)) => Some((
                Ok(event),
                StreamState::Running {
                    runner: self,
                    guard,
                    thread,
                    steps,
                },
            )),
            Ok(Advance::Finished(outcome)) => Some((Ok(outcome.into()), StreamState::Done)),
            Err(e) => Some((Err(e), StreamState::Done)),
        }
    }

    /// Interpret the input against the stored thread and commit it
    async fn prepare(&self, thread_id: &str, input: RunInput) -> Result<Prepared> {
        let schema = self.workflow.schema();
        let Some(mut thread) = self.store.get(thread_id).await? else {
            return match input {
                RunInput::Values(delta) => {
                    let mut snapshot = StateSnapshot::new(schema);
                    snapshot.apply(&delta, schema)?;
                    let mut thread = Thread::new(
                        thread_id,
                        snapshot,
                        Some(self.workflow.start().to_string()),
                    );
                    thread.checkpoint(None, self.config.history_limit);
                    self.store.put(&thread).await?;
                    log::info!(
                        "Thread {} started at '{}'",
                        thread_id,
                        self.workflow.start()
                    );
                    Ok(Prepared::Run(thread))
                }
                RunInput::Resume(_) => Err(TollgateError::no_pending(thread_id)),
                RunInput::Continue => Err(TollgateError::thread_not_found(thread_id)),
            };
        };

        match (thread.status, input) {
            (ThreadStatus::Interrupted, RunInput::Resume(decision)) => {
                let status = self.broker.resolve(&mut thread, decision)?;
                self.store.put(&thread).await?;
                self.broker.notify(thread_id).await;
                match status {
                    ResumeStatus::Pending(next) => {
                        Ok(Prepared::Done(RunOutcome::Interrupted { interrupt: next }))
                    }
                    _ => Ok(Prepared::Run(thread)),
                }
            }
            (_, RunInput::Resume(_)) => Err(TollgateError::no_pending(thread_id)),
            (ThreadStatus::Interrupted, _) => {
                let waiting = thread
                    .pending
                    .front()
                    .map(|r| r.id.clone())
                    .unwrap_or_default();
                Err(TollgateError::invalid_resume(format!(
                    "thread '{}' is waiting on interrupt '{}'; send a resume decision",
                    thread_id, waiting
                )))
            }
            (ThreadStatus::Resumable, RunInput::Values(_)) => {
                Err(TollgateError::invalid_resume(format!(
                    "thread '{}' has resolved decisions waiting; continue it before sending new input",
                    thread_id
                )))
            }
            (status, RunInput::Values(delta)) => {
                thread.snapshot.apply(&delta, schema)?;
                if status == ThreadStatus::Completed {
                    thread.cursor = Some(self.workflow.start().to_string());
                    thread.status = ThreadStatus::Ready;
                }
                thread.step += 1;
                thread.checkpoint(None, self.config.history_limit);
                self.store.put(&thread).await?;
                Ok(Prepared::Run(thread))
            }
            (ThreadStatus::Completed, RunInput::Continue) => {
                Ok(Prepared::Done(RunOutcome::Completed {
                    state: thread.snapshot,
                }))
            }
            (_, RunInput::Continue) => Ok(Prepared::Run(thread)),
        }
    }

    /// Execute the node under the cursor and commit the result
    async fn advance(&self, thread: &mut Thread, steps: &mut u32) -> Result<Advance> {
        let Some(name) = thread.cursor.clone() else {
            return Ok(Advance::Finished(RunOutcome::Completed {
                state: thread.snapshot.clone(),
            }));
        };
        if *steps >= self.config.recursion_limit {
            return Err(TollgateError::RecursionLimit {
                limit: self.config.recursion_limit,
            });
        }
        *steps += 1;

        let node = self.workflow.node(&name)?.clone();
        let outcome = self
            .executor
            .execute(
                &thread.id,
                &name,
                node.as_ref(),
                &thread.snapshot,
                thread.resolved.clone(),
            )
            .await?;

        match outcome {
            NodeOutcome::Interrupt(requests) => {
                thread.resolved.clear();
                let records: Vec<InterruptRecord> = requests
                    .into_iter()
                    .map(|request| self.broker.raise_interrupt(thread, &name, request))
                    .collect();
                thread.updated_at = Utc::now();
                self.store.put(thread).await?;
                let first = records
                    .into_iter()
                    .next()
                    .ok_or_else(|| TollgateError::node(&name, "interrupt raised without any request"))?;
                Ok(Advance::Finished(RunOutcome::Interrupted { interrupt: first }))
            }
            NodeOutcome::Update(delta) => self.commit(thread, name, delta, false).await,
            NodeOutcome::Halt(delta) => self.commit(thread, name, delta, true).await,
        }
    }

    /// Merge a node's delta, route, checkpoint and persist
    async fn commit(
        &self,
        thread: &mut Thread,
        name: String,
        delta: StateDelta,
        halt: bool,
    ) -> Result<Advance> {
        let mut snapshot = thread.snapshot.clone();
        snapshot.apply(&delta, self.workflow.schema())?;
        let next = if halt {
            None
        } else {
            self.workflow.next(&name, &snapshot)?
        };

        thread.snapshot = snapshot;
        thread.resolved.clear();
        thread.cursor = next.clone();
        thread.status = if next.is_some() {
            ThreadStatus::Ready
        } else {
            ThreadStatus::Completed
        };
        thread.step += 1;
        thread.checkpoint(Some(&name), self.config.history_limit);
        self.store.put(thread).await?;

        log::info!(
            "Thread {} step {}: {} -> {}",
            thread.id,
            thread.step,
            name,
            next.as_deref().unwrap_or(END)
        );
        Ok(Advance::Step(StreamEvent::Update {
            step: thread.step,
            node: name,
            delta,
            next,
        }))
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        self.store
            .get(thread_id)
            .await?
            .ok_or_else(|| TollgateError::thread_not_found(thread_id))
    }

    pub async fn get_state(&self, thread_id: &str) -> Result<StateSnapshot> {
        Ok(self.get_thread(thread_id).await?.snapshot)
    }

    /// Retained checkpoints, oldest first
    pub async fn get_history(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(self.get_thread(thread_id).await?.history)
    }

    pub async fn pending_interrupt(&self, thread_id: &str) -> Result<ResumeStatus> {
        self.broker.await_resume(thread_id).await
    }

    pub async fn list_threads(&self) -> Result<Vec<String>> {
        self.store.list().await
    }

    /// Reset a thread to the checkpoint taken at `step`, dropping later
    /// checkpoints and any pending interrupts
    pub async fn rewind(&self, thread_id: &str, step: u64) -> Result<Thread> {
        let _guard = self.locks.acquire(thread_id, self.config.busy_policy).await?;
        let mut thread = self.get_thread(thread_id).await?;
        let checkpoint = thread
            .checkpoint_at(step)
            .cloned()
            .ok_or_else(|| TollgateError::CheckpointNotFound {
                thread_id: thread_id.to_string(),
                step,
            })?;

        thread.history.retain(|cp| cp.step <= step);
        restore(&mut thread, checkpoint);
        self.store.put(&thread).await?;
        log::info!("Thread {} rewound to step {}", thread_id, step);
        Ok(thread)
    }

    /// Copy the checkpoint at `step` into a new thread
    pub async fn fork(&self, thread_id: &str, step: u64, new_thread_id: &str) -> Result<Thread> {
        let _guard = self
            .locks
            .acquire(new_thread_id, self.config.busy_policy)
            .await?;
        if self.store.get(new_thread_id).await?.is_some() {
            return Err(TollgateError::store(format!(
                "thread '{}' already exists",
                new_thread_id
            )));
        }
        let source = self.get_thread(thread_id).await?;
        let checkpoint = source.checkpoint_at(step).cloned().ok_or_else(|| {
            TollgateError::CheckpointNotFound {
                thread_id: thread_id.to_string(),
                step,
            }
        })?;

        let mut thread = Thread::new(new_thread_id, StateSnapshot::empty(), None);
        thread.history = source
            .history
            .into_iter()
            .filter(|cp| cp.step <= step)
            .collect();
        restore(&mut thread, checkpoint);
        self.store.put(&thread).await?;
        log::info!(
            "Thread {} forked from {} at step {}",
            new_thread_id,
            thread_id,
            step
        );
        Ok(thread)
    }

    /// Merge a caller-supplied delta into a thread that is not running
    pub async fn update_state(&self, thread_id: &str, delta: StateDelta) -> Result<StateSnapshot> {
        let _guard = self.locks.acquire(thread_id, self.config.busy_policy).await?;
        let mut thread = self.get_thread(thread_id).await?;
        thread.snapshot.apply(&delta, self.workflow.schema())?;
        thread.step += 1;
        thread.checkpoint(None, self.config.history_limit);
        self.store.put(&thread).await?;
        Ok(thread.snapshot)
    }

    /// Delete a thread and everything it holds, including its lock and
    /// wake-up signal
    pub async fn evict(&self, thread_id: &str) -> Result<bool> {
        let existed = {
            let _guard = self.locks.acquire(thread_id, self.config.busy_policy).await?;
            self.store.delete(thread_id).await?
        };
        self.locks.forget(thread_id).await;
        self.broker.forget(thread_id).await;
        if existed {
            log::info!("Thread {} evicted", thread_id);
        }
        Ok(existed)
    }
}

fn restore(thread: &mut Thread, checkpoint: Checkpoint) {
    thread.snapshot = checkpoint.snapshot;
    thread.cursor = checkpoint.cursor;
    thread.step = checkpoint.step;
    thread.pending.clear();
    thread.resolved.clear();
    thread.status = if thread.cursor.is_some() {
        ThreadStatus::Ready
    } else {
        ThreadStatus::Completed
    };
    thread.updated_at = Utc::now();
}
