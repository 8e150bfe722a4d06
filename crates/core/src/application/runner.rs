// Job Runner - lifecycle of one job execution

use crate::application::worker::constants::DEFAULT_HEARTBEAT_INTERVAL;
use crate::application::worker::{spawn_guarded, PanicGuardResult};
use crate::domain::{DomainError, MessageLevel};
use crate::error::Result;
use crate::port::{
    ExecutionError, JobEvent, JobEventListener, JobMessageSink, JobRunnable, JobState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Runner states: Created -> Started -> (Executing <-> Restarting) -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    Started,
    Executing,
    Restarting,
    Stopped,
}

impl RunnerState {
    fn can_transition_to(self, next: RunnerState) -> bool {
        use RunnerState::*;
        matches!(
            (self, next),
            (Created, Started)
                | (Started, Executing)
                | (Executing, Restarting)
                | (Restarting, Executing)
                | (Started | Executing | Restarting, Stopped)
        )
    }
}

/// How an execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Skipped,
    /// Failed after the restart budget was used up
    Failed(ExecutionError),
}

struct Lifecycle {
    state: RunnerState,
    heartbeat: Option<JoinHandle<()>>,
}

impl Lifecycle {
    fn transition(&mut self, next: RunnerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", next),
            }
            .into());
        }
        self.state = next;
        Ok(())
    }
}

/// Executes one job: publishes START, keeps the job alive with a periodic
/// KEEP_ALIVE, retries failed executions up to the definition's restart
/// budget and always finishes with exactly one STOP.
///
/// `start`, state changes on error or restart, and `stop` run in one
/// critical section per runner; the heartbeat only publishes events.
pub struct JobRunner {
    job_id: String,
    job_type: String,
    runnable: Arc<dyn JobRunnable>,
    events: Arc<dyn JobEventListener>,
    heartbeat_interval: Duration,
    lifecycle: Mutex<Lifecycle>,
    execution: Mutex<()>,
}

impl JobRunner {
    pub fn new(
        job_id: impl Into<String>,
        runnable: Arc<dyn JobRunnable>,
        events: Arc<dyn JobEventListener>,
    ) -> Self {
        let job_type = runnable.definition().job_type.clone();
        Self {
            job_id: job_id.into(),
            job_type,
            runnable,
            events,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            lifecycle: Mutex::new(Lifecycle {
                state: RunnerState::Created,
                heartbeat: None,
            }),
            execution: Mutex::new(()),
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub async fn state(&self) -> RunnerState {
        self.lifecycle.lock().await.state
    }

    pub async fn heartbeat_active(&self) -> bool {
        self.lifecycle.lock().await.heartbeat.is_some()
    }

    /// Start, execute with retries, stop
    pub async fn run(&self) -> Result<RunOutcome> {
        self.start().await?;
        self.finish().await
    }

    /// Execute with retries and stop a runner that is already started.
    ///
    /// The heartbeat keeps running from `start` on, so a job that waits for
    /// a worker between `start` and `finish` is never taken for dead.
    pub async fn finish(&self) -> Result<RunOutcome> {
        let outcome = self.execute_with_retry().await;
        let stopped = self.stop().await;
        let outcome = outcome?;
        stopped?;

        if let RunOutcome::Failed(e) = &outcome {
            error!(
                job_id = %self.job_id,
                job_type = %self.job_type,
                error = %e,
                "Job failed, no restarts left"
            );
        }
        Ok(outcome)
    }

    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.transition(RunnerState::Started)?;
        self.publish(JobState::Start).await;
        lifecycle.heartbeat = Some(self.spawn_heartbeat());
        info!(job_id = %self.job_id, job_type = %self.job_type, "Job started");
        Ok(())
    }

    /// Cancel the heartbeat and publish STOP. A second call is rejected.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.transition(RunnerState::Stopped)?;
        if let Some(heartbeat) = lifecycle.heartbeat.take() {
            heartbeat.abort();
            // no KEEP_ALIVE may follow the STOP event
            let _ = heartbeat.await;
        }
        self.publish(JobState::Stop).await;
        info!(job_id = %self.job_id, job_type = %self.job_type, "Job stopped");
        Ok(())
    }

    /// Stop a started runner whose body will never execute; the reason is
    /// recorded as an ERROR message before the STOP
    pub async fn abandon(&self, reason: &str) -> Result<()> {
        warn!(job_id = %self.job_id, job_type = %self.job_type, reason, "Job abandoned");
        self.publish_message(MessageLevel::Error, reason.to_string()).await;
        self.stop().await
    }

    async fn execute_with_retry(&self) -> Result<RunOutcome> {
        let _execution = self.execution.lock().await;
        let definition = self.runnable.definition();
        let mut restarts = definition.restarts;

        loop {
            self.lifecycle
                .lock()
                .await
                .transition(RunnerState::Executing)?;

            match self.execute_once().await {
                Ok(true) => return Ok(RunOutcome::Succeeded),
                Ok(false) => {
                    self.publish(JobState::Skipped).await;
                    return Ok(RunOutcome::Skipped);
                }
                Err(e) => {
                    let mut lifecycle = self.lifecycle.lock().await;
                    self.publish_message(MessageLevel::Error, e.to_string()).await;
                    if restarts == 0 {
                        return Ok(RunOutcome::Failed(e));
                    }
                    restarts -= 1;
                    warn!(
                        job_id = %self.job_id,
                        job_type = %self.job_type,
                        error = %e,
                        restarts_left = restarts,
                        "Restarting job after failed execution"
                    );
                    lifecycle.transition(RunnerState::Restarting)?;
                    self.publish(JobState::Restart).await;
                }
            }

            if let Some(delay) = definition.retry_delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn execute_once(&self) -> std::result::Result<bool, ExecutionError> {
        let runnable = Arc::clone(&self.runnable);
        let sink = JobMessageSink::new(&self.job_id, &self.job_type, Arc::clone(&self.events));

        match spawn_guarded(async move { runnable.execute(&sink).await }).await {
            PanicGuardResult::Success(result) => result,
            PanicGuardResult::Panicked(msg) => Err(ExecutionError::Panicked(msg)),
        }
    }

    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let events = Arc::clone(&self.events);
        let job_id = self.job_id.clone();
        let job_type = self.job_type.clone();
        let period = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let event = JobEvent::state(&job_id, &job_type, JobState::KeepAlive);
                if let Err(e) = events.on_event(&event).await {
                    error!(job_id = %job_id, job_type = %job_type, error = %e, "Heartbeat failed");
                }
            }
        })
    }

    /// Listener failures are logged and never abort the job
    async fn publish(&self, state: JobState) {
        let event = JobEvent::state(&self.job_id, &self.job_type, state);
        if let Err(e) = self.events.on_event(&event).await {
            error!(
                job_id = %self.job_id,
                job_type = %self.job_type,
                state = %state,
                error = %e,
                "Failed to publish job state"
            );
        }
    }

    async fn publish_message(&self, level: MessageLevel, message: String) {
        let event = JobEvent::message(&self.job_id, &self.job_type, level, message);
        if let Err(e) = self.events.on_event(&event).await {
            error!(job_id = %self.job_id, error = %e, "Failed to publish job message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobDefinition;
    use crate::error::AppError;
    use crate::port::job_event_listener::mocks::RecordingListener;
    use crate::port::job_runnable::mocks::{MockBehavior, MockJobRunnable};
    use async_trait::async_trait;

    fn runner(
        runnable: Arc<MockJobRunnable>,
        listener: Arc<RecordingListener>,
    ) -> JobRunner {
        JobRunner::new("job-1", runnable, listener)
    }

    #[tokio::test]
    async fn test_success_emits_start_and_stop() {
        let runnable = Arc::new(MockJobRunnable::manual("IMPORT", MockBehavior::Success));
        let listener = Arc::new(RecordingListener::new());
        let runner = runner(runnable.clone(), listener.clone());

        let outcome = runner.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(runnable.call_count(), 1);
        assert_eq!(listener.count_state(JobState::Start), 1);
        assert_eq!(listener.count_state(JobState::Stop), 1);
        assert_eq!(listener.messages()[0].1, "mock execution 1");
        assert_eq!(runner.state().await, RunnerState::Stopped);
    }

    #[tokio::test]
    async fn test_always_failing_job_runs_restarts_plus_one_times() {
        let definition =
            JobDefinition::manually_triggered("IMPORT", "Import", "").with_restarts(2);
        let runnable = Arc::new(MockJobRunnable::new(
            definition,
            MockBehavior::Fail("boom".to_string()),
        ));
        let listener = Arc::new(RecordingListener::new());
        let runner = runner(runnable.clone(), listener.clone());

        let outcome = runner.run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Failed(ExecutionError::Failed("boom".to_string())));
        assert_eq!(runnable.call_count(), 3);
        assert_eq!(listener.count_state(JobState::Restart), 2);
        assert_eq!(listener.count_state(JobState::Stop), 1);
        let errors = listener
            .messages()
            .into_iter()
            .filter(|(level, _)| *level == MessageLevel::Error)
            .count();
        assert_eq!(errors, 3);

        // heartbeat was cancelled once and cannot be cancelled again
        assert!(!runner.heartbeat_active().await);
        assert!(matches!(runner.stop().await, Err(AppError::Domain(_))));
        assert_eq!(listener.count_state(JobState::Stop), 1);
    }

    #[tokio::test]
    async fn test_recovers_within_restart_budget() {
        let definition = JobDefinition::manually_triggered("IMPORT", "Import", "")
            .with_restarts(3)
            .with_retry_delay(Duration::from_millis(1));
        let runnable = Arc::new(MockJobRunnable::new(definition, MockBehavior::FailTimes(2)));
        let listener = Arc::new(RecordingListener::new());

        let outcome = runner(runnable.clone(), listener.clone()).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Succeeded);
        assert_eq!(runnable.call_count(), 3);
        assert_eq!(listener.count_state(JobState::Restart), 2);
    }

    #[tokio::test]
    async fn test_skipped_execution() {
        let runnable = Arc::new(MockJobRunnable::manual("IMPORT", MockBehavior::Skip));
        let listener = Arc::new(RecordingListener::new());

        let outcome = runner(runnable, listener.clone()).run().await.unwrap();

        assert_eq!(outcome, RunOutcome::Skipped);
        assert_eq!(listener.count_state(JobState::Skipped), 1);
        assert_eq!(listener.count_state(JobState::Stop), 1);
    }

    #[tokio::test]
    async fn test_panicking_job_is_contained() {
        let runnable = Arc::new(MockJobRunnable::manual(
            "IMPORT",
            MockBehavior::Panic("kaputt".to_string()),
        ));
        let listener = Arc::new(RecordingListener::new());

        let outcome = runner(runnable, listener.clone()).run().await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Failed(ExecutionError::Panicked("kaputt".to_string()))
        );
        assert_eq!(listener.count_state(JobState::Stop), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_runs_while_executing_and_ends_on_stop() {
        let runnable = Arc::new(MockJobRunnable::manual(
            "IMPORT",
            MockBehavior::Sleep(Duration::from_millis(65)),
        ));
        let listener = Arc::new(RecordingListener::new());
        let runner = runner(runnable, listener.clone())
            .with_heartbeat_interval(Duration::from_millis(20));

        runner.run().await.unwrap();

        let keep_alives = listener.count_state(JobState::KeepAlive);
        assert!(keep_alives >= 2, "got {} keep-alives", keep_alives);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(listener.count_state(JobState::KeepAlive), keep_alives);
        let last = listener.events().last().cloned().unwrap();
        assert_eq!(last.kind, crate::port::JobEventKind::StateChanged(JobState::Stop));
    }

    struct BrokenListener;

    #[async_trait]
    impl JobEventListener for BrokenListener {
        async fn on_event(&self, _event: &JobEvent) -> Result<()> {
            Err(AppError::Repository("down".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_listener_does_not_kill_job() {
        let runnable = Arc::new(MockJobRunnable::manual(
            "IMPORT",
            MockBehavior::Sleep(Duration::from_millis(50)),
        ));
        let runner = JobRunner::new("job-1", runnable.clone(), Arc::new(BrokenListener))
            .with_heartbeat_interval(Duration::from_millis(10));

        assert_eq!(runner.run().await.unwrap(), RunOutcome::Succeeded);
        assert_eq!(runnable.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_runs_between_start_and_finish() {
        let runnable = Arc::new(MockJobRunnable::manual("IMPORT", MockBehavior::Success));
        let listener = Arc::new(RecordingListener::new());
        let runner = runner(runnable.clone(), listener.clone())
            .with_heartbeat_interval(Duration::from_millis(10));

        runner.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(runnable.call_count(), 0);
        assert!(listener.count_state(JobState::KeepAlive) >= 3);

        assert_eq!(runner.finish().await.unwrap(), RunOutcome::Succeeded);
        assert_eq!(runnable.call_count(), 1);
        assert_eq!(listener.count_state(JobState::Stop), 1);
    }

    #[tokio::test]
    async fn test_abandoned_runner_never_executes() {
        let runnable = Arc::new(MockJobRunnable::manual("IMPORT", MockBehavior::Success));
        let listener = Arc::new(RecordingListener::new());
        let runner = runner(runnable.clone(), listener.clone());

        runner.start().await.unwrap();
        runner.abandon("worker pool is shut down").await.unwrap();

        assert_eq!(runnable.call_count(), 0);
        assert!(!runner.heartbeat_active().await);
        assert_eq!(runner.state().await, RunnerState::Stopped);
        assert_eq!(listener.count_state(JobState::Stop), 1);
        assert_eq!(
            listener.messages(),
            vec![(MessageLevel::Error, "worker pool is shut down".to_string())]
        );
        assert!(runner.finish().await.is_err());
    }

    #[tokio::test]
    async fn test_runner_cannot_run_twice() {
        let runnable = Arc::new(MockJobRunnable::manual("IMPORT", MockBehavior::Success));
        let listener = Arc::new(RecordingListener::new());
        let runner = runner(runnable, listener.clone());

        runner.run().await.unwrap();
        assert!(runner.run().await.is_err());
        assert_eq!(listener.count_state(JobState::Start), 1);
    }
}
