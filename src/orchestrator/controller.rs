//! Run lifecycle controller.
//!
//! Turns a fire-and-forget backend job into a bounded, observable task: one
//! orchestrator per [`RunHandle`], polling sequentially while a separate tick
//! advances synthetic progress, ending in exactly one terminal event.

use super::progress::{self, PROGRESS_COMPLETE};
use super::readiness::is_materialized;
use crate::backend::JobStatusClient;
use crate::error::CoreError;
use crate::model::{AnalysisResult, InfoEvent, RunConfig, RunEvent, RunHandle, RunState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Timing and bounds for one orchestration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PollSettings {
    pub poll_interval: Duration,
    pub progress_interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            progress_interval: Duration::from_millis(500),
            max_attempts: 240,
        }
    }
}

impl PollSettings {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            progress_interval: cfg.progress_interval,
            max_attempts: cfg.max_attempts.max(1),
        }
    }
}

/// Run ids currently watched in this process. Passed explicitly; there is no
/// global current run.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActiveRuns {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ActiveRuns {
    pub fn claim(&self, run_id: &str) -> Result<ActiveRunGuard, CoreError> {
        let mut active = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(run_id.to_string()) {
            return Err(CoreError::AlreadyActive(run_id.to_string()));
        }
        Ok(ActiveRunGuard {
            registry: self.inner.clone(),
            run_id: run_id.to_string(),
        })
    }

    #[cfg(test)]
    pub fn is_active(&self, run_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(run_id)
    }
}

/// Releases a claimed run id when the orchestration ends or is dropped.
pub(crate) struct ActiveRunGuard {
    registry: Arc<Mutex<HashSet<String>>>,
    run_id: String,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.run_id);
    }
}

enum PollOutcome {
    Ready(AnalysisResult),
    NotReady,
    Fatal(CoreError),
}

fn classify(fetched: Result<serde_json::Value, CoreError>) -> PollOutcome {
    match fetched {
        Ok(value) if is_materialized(&value) => PollOutcome::Ready(AnalysisResult::new(value)),
        Ok(_) | Err(CoreError::NotReadyYet) => PollOutcome::NotReady,
        Err(e) => PollOutcome::Fatal(e),
    }
}

pub(crate) struct RunOrchestrator<C> {
    handle: RunHandle,
    client: Arc<C>,
    settings: PollSettings,
    state: RunState,
    rng: StdRng,
    event_tx: UnboundedSender<RunEvent>,
    cancel: CancellationToken,
}

impl<C: JobStatusClient + 'static> RunOrchestrator<C> {
    /// Claim the run id and start polling on a new task.
    pub fn start(
        handle: RunHandle,
        client: Arc<C>,
        settings: PollSettings,
        registry: &ActiveRuns,
        event_tx: UnboundedSender<RunEvent>,
    ) -> Result<RunTask, CoreError> {
        let guard = registry.claim(&handle.run_id)?;
        let cancel = CancellationToken::new();
        let run_id = handle.run_id.clone();
        let orchestrator = RunOrchestrator {
            handle,
            client,
            settings,
            state: RunState::Idle,
            rng: StdRng::from_entropy(),
            event_tx,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run().await
        });
        Ok(RunTask {
            run_id,
            cancel,
            join: Some(join),
        })
    }

    async fn run(mut self) -> RunState {
        let run_id = self.handle.run_id.clone();
        let max_attempts = self.settings.max_attempts;
        tracing::info!(
            run_id = %run_id,
            submitted_at = %self.handle.submitted_at_rfc3339(),
            max_attempts,
            "polling started"
        );
        self.state = RunState::Polling {
            progress: 0.0,
            attempts: 0,
        };
        self.emit(RunEvent::Progress { percent: 0.0 });

        let period = self.settings.progress_interval;
        let mut progress_tick = tokio::time::interval_at(Instant::now() + period, period);
        progress_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.cancel.clone();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            tracing::debug!(run_id = %run_id, attempt, "polling for result");
            self.emit(RunEvent::Info(InfoEvent::PollAttempt {
                attempt,
                max_attempts,
            }));

            // The fetch owns its inputs so progress ticks can mutate state while it is in flight.
            let client = self.client.clone();
            let fetch_id = run_id.clone();
            let fetch = async move { client.fetch(&fetch_id).await };
            tokio::pin!(fetch);

            let outcome = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.abandoned(),
                    fetched = &mut fetch => break classify(fetched),
                    _ = progress_tick.tick() => self.advance_progress(),
                }
            };

            match outcome {
                PollOutcome::Ready(result) => return self.succeed(result, attempt),
                PollOutcome::Fatal(error) => return self.fail(error),
                PollOutcome::NotReady => self.record_not_ready(attempt),
            }

            let wait = tokio::time::sleep(self.settings.poll_interval);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.abandoned(),
                    _ = &mut wait => break,
                    _ = progress_tick.tick() => self.advance_progress(),
                }
            }

            if attempt >= max_attempts {
                return self.time_out(attempt);
            }
        }
    }

    /// Send an event unless the run has been abandoned.
    fn emit(&self, event: RunEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        let _ = self.event_tx.send(event);
    }

    fn advance_progress(&mut self) {
        let RunState::Polling { progress, .. } = &mut self.state else {
            return;
        };
        let next = progress::next_estimate(*progress, &mut self.rng);
        if next <= *progress {
            return;
        }
        *progress = next;
        self.emit(RunEvent::Progress { percent: next });
    }

    fn record_not_ready(&mut self, attempt: u32) {
        if let RunState::Polling { attempts, .. } = &mut self.state {
            *attempts = attempt;
        }
        tracing::debug!(run_id = %self.handle.run_id, attempt, "run still processing");
        self.emit(RunEvent::Info(InfoEvent::NotReady { attempt }));
        self.advance_progress();
    }

    fn succeed(&mut self, result: AnalysisResult, attempts: u32) -> RunState {
        tracing::info!(
            run_id = %self.handle.run_id,
            attempts,
            scenes = result.scene_count(),
            "run completed"
        );
        self.state = RunState::Succeeded(result.clone());
        self.emit(RunEvent::Progress {
            percent: PROGRESS_COMPLETE,
        });
        self.emit(RunEvent::Succeeded {
            result: Box::new(result),
            attempts,
        });
        self.state.clone()
    }

    fn time_out(&mut self, attempts: u32) -> RunState {
        tracing::warn!(run_id = %self.handle.run_id, attempts, "run polling timed out");
        self.state = RunState::TimedOut { attempts };
        self.emit(RunEvent::TimedOut { attempts });
        self.state.clone()
    }

    fn fail(&mut self, error: CoreError) -> RunState {
        tracing::warn!(run_id = %self.handle.run_id, error = %error, "run polling failed");
        self.state = RunState::Failed(error.clone());
        self.emit(RunEvent::Failed { error });
        self.state.clone()
    }

    fn abandoned(&mut self) -> RunState {
        if let RunState::Polling { progress, attempts } = &self.state {
            tracing::debug!(
                run_id = %self.handle.run_id,
                progress = *progress,
                attempts = *attempts,
                "polling stopped by cancellation"
            );
        }
        self.state.clone()
    }
}

/// Handle to a running orchestration.
pub(crate) struct RunTask {
    run_id: String,
    cancel: CancellationToken,
    join: Option<JoinHandle<RunState>>,
}

impl RunTask {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wait for the final state. Safe to use in `select!`: the task is only
    /// consumed once it has finished. Returns `None` if it was already awaited
    /// or the task died.
    pub async fn wait(&mut self) -> Option<RunState> {
        let join = self.join.as_mut()?;
        let joined = join.await;
        self.join = None;
        match joined {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::error!(run_id = %self.run_id, "run task failed: {e}");
                None
            }
        }
    }

    /// Stop polling and progress ticking. No event is emitted after this returns.
    pub async fn abandon(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            join.abort();
            let _ = join.await;
        }
        tracing::info!(run_id = %self.run_id, "run abandoned");
    }
}

/// Cancels and aborts without waiting. An event the task was already sending
/// can still arrive after the drop; only [`RunTask::abandon`] guarantees that
/// nothing follows.
impl Drop for RunTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = &self.join {
            join.abort();
        }
    }
}
