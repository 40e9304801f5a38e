//! Mutate-then-converge loop
//!
//! [`converge`] submits one mutation and polls the resulting task until it
//! settles:
//!
//! ```text
//! SUBMITTED ──(ok)──▶ POLLING ──▶ SUCCESS
//!     │                  ├──────▶ FAILED     (backend message)
//!     │                  └──────▶ TIMED_OUT  (deadline, no further polls)
//!     └──(permanent error)──▶ FAILED
//! ```
//!
//! Transient submit failures are retried with exponential backoff inside the
//! submit budget. Transient poll failures and per-call poll timeouts are
//! retried until the poll deadline. The remote operation is never cancelled;
//! a timeout only means the caller stopped waiting.

use crate::backend::TaskBackend;
use crate::error::{ConvergeError, ConvergeResult};
use crate::outcome::Convergence;
use crate::retry::{ErrorClass, RetryConfig};
use crate::task::{AsyncTask, Operation, PollResult, TaskId, TaskStatus};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};

/// Lower bound on the delay between polls
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cap for deadlines whose budget would overflow `Instant` (~30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Timing for one convergence run
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergeConfig {
    /// Deadline for the polling phase, measured from the first poll
    pub timeout: Duration,

    /// Fixed delay between polls
    pub poll_interval: Duration,

    /// Budget for retrying transient submit failures
    pub submit_timeout: Duration,

    /// Per-call limit on a single poll request
    pub poll_request_timeout: Duration,

    /// Backoff between submit attempts
    pub retry: RetryConfig,
}

impl ConvergeConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            ..Self::default()
        }
    }

    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    pub fn with_poll_request_timeout(mut self, poll_request_timeout: Duration) -> Self {
        self.poll_request_timeout = poll_request_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }
}

impl Default for ConvergeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            poll_interval: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(60),
            poll_request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Drives operations against a [`TaskBackend`] with a fixed timing config
#[derive(Debug, Clone, Default)]
pub struct Converger {
    config: ConvergeConfig,
}

impl Converger {
    pub fn new(config: ConvergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConvergeConfig {
        &self.config
    }

    /// Submit `operation` to `backend` and wait for it to settle
    pub async fn run<B>(
        &self,
        backend: &B,
        operation: &Operation,
    ) -> ConvergeResult<Convergence, B::Error>
    where
        B: TaskBackend + ?Sized,
    {
        tracing::info!("Converging {} via {}", operation.key(), backend.name());

        converge(
            move || backend.submit(operation),
            move |task_id| async move { backend.poll(&task_id).await },
            move |error| backend.is_retryable(error),
            &self.config,
        )
        .await
    }
}

/// Issue a mutation via `submit`, then poll its task via `poll` until it
/// reaches a terminal status or `config.timeout` elapses.
///
/// # Returns
/// * `Ok(Convergence)` - the task reported SUCCESS
/// * `Err(ConvergeError::Permanent)` - submit or poll failed non-retryably
/// * `Err(ConvergeError::Transient)` - submit kept failing until its budget ran out
/// * `Err(ConvergeError::BackendFailure)` - the task reported FAILED
/// * `Err(ConvergeError::Timeout)` - the task was still pending or running at the deadline
pub async fn converge<S, SFut, P, PFut, R, E>(
    mut submit: S,
    mut poll: P,
    is_retryable: R,
    config: &ConvergeConfig,
) -> ConvergeResult<Convergence, E>
where
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<TaskId, E>>,
    P: FnMut(TaskId) -> PFut,
    PFut: Future<Output = Result<PollResult, E>>,
    R: Fn(&E) -> bool,
    E: std::error::Error + 'static,
{
    let started_at = Utc::now();
    let clock = Instant::now();

    let (task_id, submit_attempts) = submit_with_retry(&mut submit, &is_retryable, config).await?;

    let mut task = AsyncTask::new(task_id);
    let polls = poll_until_settled(&mut poll, &is_retryable, config, &mut task).await?;

    let convergence = Convergence {
        task,
        submit_attempts,
        polls,
        duration_ms: clock.elapsed().as_millis() as u64,
        started_at,
        finished_at: Utc::now(),
    };
    tracing::info!("Converged: {}", convergence);
    Ok(convergence)
}

async fn submit_with_retry<S, SFut, R, E>(
    submit: &mut S,
    is_retryable: &R,
    config: &ConvergeConfig,
) -> ConvergeResult<(TaskId, u32), E>
where
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<TaskId, E>>,
    R: Fn(&E) -> bool,
    E: std::error::Error + 'static,
{
    let deadline = deadline_after(Instant::now(), config.submit_timeout);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let error = match submit().await {
            Ok(task_id) => {
                tracing::debug!("Submitted task {} (attempt {})", task_id, attempts);
                return Ok((task_id, attempts));
            }
            Err(error) => error,
        };

        match ErrorClass::of(&error, is_retryable) {
            ErrorClass::Permanent => {
                tracing::debug!("Submit failed permanently: {}", error);
                return Err(ConvergeError::Permanent(error));
            }
            ErrorClass::Transient => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::warn!(
                        "Submit still failing after {} attempt(s), giving up: {}",
                        attempts,
                        error
                    );
                    return Err(ConvergeError::Transient {
                        attempts,
                        source: error,
                    });
                }

                let delay = config.retry.delay_for_attempt(attempts - 1).min(remaining);
                tracing::warn!(
                    "Submit attempt {} failed ({}), retrying in {:?}",
                    attempts,
                    error,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}

async fn poll_until_settled<P, PFut, R, E>(
    poll: &mut P,
    is_retryable: &R,
    config: &ConvergeConfig,
    task: &mut AsyncTask,
) -> ConvergeResult<u32, E>
where
    P: FnMut(TaskId) -> PFut,
    PFut: Future<Output = Result<PollResult, E>>,
    R: Fn(&E) -> bool,
    E: std::error::Error + 'static,
{
    let start = Instant::now();
    let deadline = deadline_after(start, config.timeout);
    let mut polls: u32 = 0;

    loop {
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(
                "Task {} still {} after {:?}; it may still converge remotely",
                task.id,
                task.status,
                now - start
            );
            return Err(ConvergeError::Timeout {
                task_id: task.id.clone(),
                elapsed: now - start,
                last_status: task.status,
            });
        }

        polls += 1;
        let budget = config
            .poll_request_timeout
            .min(deadline.saturating_duration_since(now));

        match timeout(budget, poll(task.id.clone())).await {
            Ok(Ok(result)) => {
                task.observe(&result)?;
                match result.status {
                    TaskStatus::Success => return Ok(polls),
                    TaskStatus::Failed => {
                        return Err(ConvergeError::BackendFailure {
                            task_id: task.id.clone(),
                            message: task
                                .message
                                .clone()
                                .unwrap_or_else(|| "task failed without a message".to_string()),
                        });
                    }
                    TaskStatus::Pending | TaskStatus::Running => {
                        tracing::debug!("Poll {}: task {} is {}", polls, task.id, task.status);
                    }
                }
            }
            Ok(Err(error)) => match ErrorClass::of(&error, is_retryable) {
                ErrorClass::Permanent => {
                    tracing::debug!("Poll {} failed permanently: {}", polls, error);
                    return Err(ConvergeError::Permanent(error));
                }
                ErrorClass::Transient => {
                    tracing::warn!("Poll {} failed transiently: {}", polls, error);
                }
            },
            Err(_) => {
                tracing::warn!("Poll {} timed out after {:?}", polls, budget);
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(config.effective_poll_interval().min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("connection reset")]
        Transient,
        #[error("invalid parameter")]
        Permanent,
    }

    /// Backend that replays scripted submit/poll responses
    struct ScriptedBackend {
        submits: Mutex<VecDeque<Result<TaskId, TestError>>>,
        polls: Mutex<VecDeque<Result<PollResult, TestError>>>,
        fallback: PollResult,
        submit_calls: AtomicU32,
        poll_calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(polls: Vec<Result<PollResult, TestError>>) -> Self {
            Self {
                submits: Mutex::new(VecDeque::new()),
                polls: Mutex::new(polls.into()),
                fallback: PollResult::running(),
                submit_calls: AtomicU32::new(0),
                poll_calls: AtomicU32::new(0),
            }
        }

        fn with_submits(self, submits: Vec<Result<TaskId, TestError>>) -> Self {
            *self.submits.lock().unwrap() = submits.into();
            self
        }

        fn with_fallback(mut self, fallback: PollResult) -> Self {
            self.fallback = fallback;
            self
        }

        fn submit_calls(&self) -> u32 {
            self.submit_calls.load(Ordering::SeqCst)
        }

        fn poll_calls(&self) -> u32 {
            self.poll_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskBackend for ScriptedBackend {
        type Error = TestError;

        fn name(&self) -> &str {
            "scripted"
        }

        async fn submit(&self, _operation: &Operation) -> Result<TaskId, TestError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TaskId::new("t1")))
        }

        async fn poll(&self, task_id: &TaskId) -> Result<PollResult, TestError> {
            assert_eq!(task_id.as_str(), "t1");
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        fn is_retryable(&self, error: &TestError) -> bool {
            matches!(error, TestError::Transient)
        }
    }

    fn op() -> Operation {
        Operation::new("start-replication", "db-1")
    }

    fn config(timeout_secs: u64, interval_secs: u64) -> ConvergeConfig {
        ConvergeConfig::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_running_success_example() {
        let backend = ScriptedBackend::new(vec![
            Ok(PollResult::running()),
            Ok(PollResult::running()),
            Ok(PollResult::success()),
        ]);
        let converger = Converger::new(config(30, 2));

        let start = Instant::now();
        let result = converger.run(&backend, &op()).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result.polls, 3);
        assert_eq!(backend.poll_calls(), 3);
        assert_eq!(result.submit_attempts, 1);
        assert_eq!(result.task.status, TaskStatus::Success);
        assert!(result.is_success());
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_status_is_backend_failure() {
        let backend = ScriptedBackend::new(vec![
            Ok(PollResult::running().with_message("switching")),
            Ok(PollResult::failed("replica lag too high")),
            Ok(PollResult::success()),
        ]);
        let converger = Converger::new(config(30, 1));

        let err = converger.run(&backend, &op()).await.unwrap_err();
        match err {
            ConvergeError::BackendFailure { task_id, message } => {
                assert_eq!(task_id.as_str(), "t1");
                assert_eq!(message, "replica lag too high");
            }
            other => panic!("Expected BackendFailure, got {:?}", other),
        }

        // FAILED の後はポーリングしない
        assert_eq!(backend.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_without_message_keeps_last_message() {
        let backend = ScriptedBackend::new(vec![
            Ok(PollResult::running().with_message("applying parameters")),
            Ok(PollResult::new(TaskStatus::Failed)),
        ]);

        let err = Converger::new(config(30, 1))
            .run(&backend, &op())
            .await
            .unwrap_err();
        assert!(err.is_backend_failure());
        assert!(err.to_string().contains("applying parameters"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_running_times_out() {
        let backend = ScriptedBackend::new(vec![]);
        let converger = Converger::new(config(10, 2));

        let err = converger.run(&backend, &op()).await.unwrap_err();
        match &err {
            ConvergeError::Timeout {
                task_id,
                elapsed,
                last_status,
            } => {
                assert_eq!(task_id.as_str(), "t1");
                assert!(*elapsed >= Duration::from_secs(10));
                assert_eq!(*last_status, TaskStatus::Running);
            }
            other => panic!("Expected Timeout, got {:?}", other),
        }
        assert!(err.is_timeout());
        assert_eq!(err.task_id().map(TaskId::as_str), Some("t1"));

        // polls at t=0,2,4,6,8
        assert_eq!(backend.poll_calls(), 5);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.poll_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_submit_error_short_circuits() {
        let backend =
            ScriptedBackend::new(vec![]).with_submits(vec![Err(TestError::Permanent)]);

        let err = Converger::new(config(30, 1))
            .run(&backend, &op())
            .await
            .unwrap_err();

        assert!(matches!(err, ConvergeError::Permanent(TestError::Permanent)));
        assert_eq!(backend.submit_calls(), 1);
        assert_eq!(backend.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_submit_error_is_retried() {
        let backend = ScriptedBackend::new(vec![Ok(PollResult::success())])
            .with_submits(vec![Err(TestError::Transient)]);

        let result = Converger::new(config(30, 1))
            .run(&backend, &op())
            .await
            .unwrap();

        assert_eq!(result.submit_attempts, 2);
        assert_eq!(backend.submit_calls(), 2);
        assert_eq!(result.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_budget_exhausted() {
        let backend = ScriptedBackend::new(vec![]).with_submits(
            (0..10).map(|_| Err(TestError::Transient)).collect(),
        );
        let cfg = config(30, 1).with_submit_timeout(Duration::from_secs(5));

        let err = Converger::new(cfg).run(&backend, &op()).await.unwrap_err();

        // attempts at t=0, 1, 3, 5 (last delay capped by the budget)
        match err {
            ConvergeError::Transient { attempts, source } => {
                assert_eq!(attempts, 4);
                assert!(matches!(source, TestError::Transient));
            }
            other => panic!("Expected Transient, got {:?}", other),
        }
        assert_eq!(backend.submit_calls(), 4);
        assert_eq!(backend.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_converged_target_is_idempotent() {
        let backend = ScriptedBackend::new(vec![]).with_fallback(PollResult::success());
        let converger = Converger::new(config(30, 2));

        let first = converger.run(&backend, &op()).await.unwrap();
        let second = converger.run(&backend, &op()).await.unwrap();

        assert_eq!(first.polls, 1);
        assert_eq!(second.polls, 1);
        assert_eq!(backend.submit_calls(), 2);
        assert_eq!(backend.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_error_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(TestError::Transient),
            Ok(PollResult::running()),
            Ok(PollResult::success()),
        ]);

        let result = Converger::new(config(30, 1))
            .run(&backend, &op())
            .await
            .unwrap();
        assert_eq!(result.polls, 3);
        assert_eq!(result.task.transitions, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_poll_error_aborts() {
        let backend = ScriptedBackend::new(vec![
            Ok(PollResult::running()),
            Err(TestError::Permanent),
            Ok(PollResult::success()),
        ]);

        let err = Converger::new(config(30, 1))
            .run(&backend, &op())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvergeError::Permanent(TestError::Permanent)));
        assert_eq!(backend.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_poll_is_bounded_by_request_timeout() {
        let calls = AtomicU32::new(0);
        let cfg = config(60, 1).with_poll_request_timeout(Duration::from_secs(5));

        let result = converge(
            || async { Ok::<_, TestError>(TaskId::new("t1")) },
            |_task_id| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        sleep(Duration::from_secs(3600)).await;
                    }
                    Ok(PollResult::success())
                }
            },
            |error: &TestError| matches!(error, TestError::Transient),
            &cfg,
        )
        .await
        .unwrap();

        assert_eq!(result.polls, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_errors_until_deadline_time_out() {
        let backend = ScriptedBackend::new(
            (0..100).map(|_| Err(TestError::Transient)).collect(),
        );

        let err = Converger::new(config(5, 1))
            .run(&backend, &op())
            .await
            .unwrap_err();
        match err {
            ConvergeError::Timeout { last_status, .. } => {
                assert_eq!(last_status, TaskStatus::Pending);
            }
            other => panic!("Expected Timeout, got {:?}", other),
        }
        assert_eq!(backend.poll_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeouts_do_not_overflow() {
        let backend =
            ScriptedBackend::new(vec![Ok(PollResult::running()), Ok(PollResult::success())])
                .with_submits(vec![Err(TestError::Transient)]);
        let cfg = ConvergeConfig::new(Duration::MAX, Duration::from_secs(1))
            .with_submit_timeout(Duration::from_secs(u64::MAX))
            .with_poll_request_timeout(Duration::MAX);

        let result = Converger::new(cfg).run(&backend, &op()).await.unwrap();

        assert_eq!(result.submit_attempts, 2);
        assert_eq!(result.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_is_clamped() {
        let seen = Mutex::new(Vec::new());
        let cfg = config(30, 0);

        let result = converge(
            || async { Ok::<_, TestError>(TaskId::new("t1")) },
            |_task_id| {
                let mut seen = seen.lock().unwrap();
                seen.push(Instant::now());
                let status = if seen.len() < 4 {
                    PollResult::running()
                } else {
                    PollResult::success()
                };
                async move { Ok(status) }
            },
            |error: &TestError| matches!(error, TestError::Transient),
            &cfg,
        )
        .await
        .unwrap();

        assert_eq!(result.polls, 4);
        let seen = seen.lock().unwrap();
        for pair in seen.windows(2) {
            assert!(pair[1] - pair[0] >= MIN_POLL_INTERVAL);
        }
    }
}
