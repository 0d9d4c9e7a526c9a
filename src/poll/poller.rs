use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::record::{PollRecord, RetryConfig};
use super::state::{PollPhase, PollStateMachine, StateVocabulary, Transition};
use crate::error::{AiHeroError, Result};

/// Cadence, deadline and transient-retry policy for one poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between fetches.
    pub interval: Duration,
    /// Wall-clock budget for the whole loop. `None` waits forever.
    pub deadline: Option<Duration>,
    pub retry: RetryConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: Some(Duration::from_secs(60)),
            retry: RetryConfig::default(),
        }
    }
}

/// A remote resource whose state can be read off a fetched snapshot.
pub trait PollSnapshot {
    /// The raw state token, or `None` when the response has no state field.
    fn state_token(&self) -> Option<&str>;

    /// Server-provided explanation for a terminal failure, if any.
    fn failure_detail(&self) -> Option<String> {
        None
    }
}

/// One observation, handed to a [`PollObserver`] after every fetch.
#[derive(Debug, Clone)]
pub struct PollTick<'a> {
    pub id: &'a str,
    pub attempt: u32,
    pub phase: PollPhase,
    pub state: Option<&'a str>,
    pub elapsed: Duration,
}

pub trait PollObserver: Send + Sync {
    fn on_tick(&self, tick: &PollTick<'_>);
}

/// Terminal snapshot plus what the loop saw on the way.
#[derive(Debug, Clone)]
pub struct PollOutcome<T> {
    pub snapshot: T,
    pub record: PollRecord,
}

/// Fetches a resource at a fixed interval until it reaches a terminal state.
///
/// Fetches are strictly sequential. A remote failure state ends the loop at
/// once; transport errors end it too unless the retry policy allows more
/// attempts. The deadline and the optional cancellation token are the only
/// other ways out.
#[derive(Clone, Default)]
pub struct Poller {
    config: PollConfig,
    cancel: Option<CancellationToken>,
    observer: Option<Arc<dyn PollObserver>>,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: None,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PollObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `fetch` until `vocabulary` classifies a snapshot as terminal.
    ///
    /// The deadline bounds everything: a fetch still in flight or a retry
    /// backoff still sleeping when it passes ends the loop with
    /// [`AiHeroError::PollTimeout`].
    pub async fn run<T, F, Fut>(
        &self,
        id: &str,
        vocabulary: &StateVocabulary,
        mut fetch: F,
    ) -> Result<PollOutcome<T>>
    where
        T: PollSnapshot,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let deadline_at = self.config.deadline.map(|d| start + d);
        let mut record = PollRecord::new(id);

        loop {
            let snapshot = self
                .fetch_tick(id, start, deadline_at, &mut record, &mut fetch)
                .await?;
            let token = snapshot.state_token().map(str::to_owned);
            let phase = vocabulary.classify(token.as_deref());
            let transition = PollStateMachine::next(&mut record, phase, token.as_deref());

            debug!(
                resource = vocabulary.resource,
                %id,
                attempt = record.attempts,
                %phase,
                state = token.as_deref().unwrap_or("-"),
                "poll tick"
            );
            if let Some(observer) = &self.observer {
                observer.on_tick(&PollTick {
                    id,
                    attempt: record.attempts,
                    phase,
                    state: token.as_deref(),
                    elapsed: start.elapsed(),
                });
            }

            match transition {
                Transition::Finished => {
                    info!(
                        resource = vocabulary.resource,
                        %id,
                        attempts = record.attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "poll finished"
                    );
                    return Ok(PollOutcome { snapshot, record });
                }
                Transition::Failed { state } => {
                    let message = snapshot.failure_detail().unwrap_or_else(|| {
                        format!("{} {id} ended in state '{state}'", vocabulary.resource)
                    });
                    return Err(AiHeroError::RemoteJob {
                        id: id.to_string(),
                        state,
                        message,
                    });
                }
                Transition::Continue => {}
            }

            let wait = match self.config.deadline {
                Some(deadline) => {
                    let elapsed = start.elapsed();
                    if elapsed >= deadline {
                        return Err(timeout(id, elapsed, &record));
                    }
                    self.config.interval.min(deadline - elapsed)
                }
                None => self.config.interval,
            };
            self.pause(id, wait).await?;

            if let Some(deadline) = self.config.deadline {
                let elapsed = start.elapsed();
                if elapsed >= deadline {
                    return Err(timeout(id, elapsed, &record));
                }
            }
        }
    }

    async fn fetch_tick<T, F, Fut>(
        &self,
        id: &str,
        start: Instant,
        deadline_at: Option<Instant>,
        record: &mut PollRecord,
        fetch: &mut F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0u32;
        loop {
            if failures > 0 && deadline_at.is_some_and(|at| Instant::now() >= at) {
                return Err(timeout(id, start.elapsed(), record));
            }
            match self.bounded(id, start, deadline_at, record, fetch()).await? {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if err.is_transient() && failures < self.config.retry.max_retries => {
                    failures += 1;
                    record.retries += 1;
                    let mut delay = self.config.retry.delay_for_attempt(failures);
                    if let Some(at) = deadline_at {
                        delay = delay.min(at.saturating_duration_since(Instant::now()));
                    }
                    warn!(
                        %id,
                        attempt = failures,
                        max = self.config.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "poll fetch failed, retrying"
                    );
                    self.bounded(id, start, deadline_at, record, sleep(delay))
                        .await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run `work` under the cancellation token and, when set, the deadline.
    async fn bounded<R>(
        &self,
        id: &str,
        start: Instant,
        deadline_at: Option<Instant>,
        record: &PollRecord,
        work: impl Future<Output = R>,
    ) -> Result<R> {
        match deadline_at {
            Some(at) => self
                .cancellable(id, timeout_at(at, work))
                .await?
                .map_err(|_| timeout(id, start.elapsed(), record)),
            None => self.cancellable(id, work).await,
        }
    }

    async fn pause(&self, id: &str, wait: Duration) -> Result<()> {
        self.cancellable(id, sleep(wait)).await
    }

    async fn cancellable<R>(&self, id: &str, work: impl Future<Output = R>) -> Result<R> {
        match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(AiHeroError::Cancelled { id: id.to_string() }),
                out = work => Ok(out),
            },
            None => Ok(work.await),
        }
    }
}

fn timeout(id: &str, elapsed: Duration, record: &PollRecord) -> AiHeroError {
    AiHeroError::PollTimeout {
        id: id.to_string(),
        elapsed,
        last_state: record.last_state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ErrorKind;

    #[derive(Debug, Clone)]
    struct Snap {
        state: Option<&'static str>,
        detail: Option<&'static str>,
    }

    impl PollSnapshot for Snap {
        fn state_token(&self) -> Option<&str> {
            self.state
        }

        fn failure_detail(&self) -> Option<String> {
            self.detail.map(str::to_string)
        }
    }

    fn snap(state: Option<&'static str>) -> Result<Snap> {
        Ok(Snap {
            state,
            detail: None,
        })
    }

    struct Script {
        items: Mutex<VecDeque<Result<Snap>>>,
        calls: AtomicUsize,
    }

    impl Script {
        fn new(items: Vec<Result<Snap>>) -> Self {
            Self {
                items: Mutex::new(items.into()),
                calls: AtomicUsize::new(0),
            }
        }

        async fn next(&self) -> Result<Snap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.items
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| snap(Some("continue")))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn config(interval_ms: u64, deadline_ms: Option<u64>) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(interval_ms),
            deadline: deadline_ms.map(Duration::from_millis),
            retry: RetryConfig::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pending_pending_done_takes_three_fetches() {
        let script = Script::new(vec![
            snap(Some("created")),
            snap(Some("continue")),
            snap(Some("done")),
        ]);
        let poller = Poller::new(config(100, Some(10_000)));
        let start = Instant::now();

        let outcome = poller
            .run("j1", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap();

        assert_eq!(script.calls(), 3);
        assert_eq!(outcome.snapshot.state, Some("done"));
        assert_eq!(outcome.record.attempts, 3);
        assert_eq!(
            outcome.record.history,
            vec![PollPhase::Pending, PollPhase::Pending, PollPhase::Done]
        );
        // Two sleeps between three fetches.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn error_state_stops_after_two_fetches() {
        let script = Script::new(vec![
            snap(Some("continue")),
            Ok(Snap {
                state: Some("error"),
                detail: Some("Error while uploading data"),
            }),
            snap(Some("done")),
        ]);
        let poller = Poller::new(config(100, Some(10_000)));

        let err = poller
            .run("j1", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap_err();

        assert_eq!(script.calls(), 2);
        match err {
            AiHeroError::RemoteJob { id, state, message } => {
                assert_eq!(id, "j1");
                assert_eq!(state, "error");
                assert_eq!(message, "Error while uploading data");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn endless_pending_times_out_within_one_interval() {
        let script = Script::new(Vec::new());
        let poller = Poller::new(config(100, Some(1_000)));
        let start = Instant::now();

        let err = poller
            .run("wf-1", &StateVocabulary::WORKFLOW, || script.next())
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(err.kind(), ErrorKind::PollTimeout);
        assert!(elapsed >= Duration::from_millis(1_000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_100), "{elapsed:?}");
        assert!(script.calls() >= 10, "{} fetches", script.calls());
        match err {
            AiHeroError::PollTimeout { last_state, .. } => {
                assert_eq!(last_state.as_deref(), Some("continue"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_not_multiple_of_interval() {
        let script = Script::new(Vec::new());
        let poller = Poller::new(config(300, Some(1_000)));
        let start = Instant::now();

        let err = poller
            .run("wf-2", &StateVocabulary::WORKFLOW, || script.next())
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(err.kind(), ErrorKind::PollTimeout);
        assert!(elapsed >= Duration::from_millis(1_000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_300), "{elapsed:?}");
        assert!(script.calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_is_cut_off_at_deadline() {
        let calls = AtomicUsize::new(0);
        let poller = Poller::new(config(100, Some(1_000)));
        let start = Instant::now();

        let err = poller
            .run("j-slow", &StateVocabulary::JOB, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 5 {
                        sleep(Duration::from_secs(20)).await;
                        return snap(Some("done"));
                    }
                    snap(Some("continue"))
                }
            })
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1_000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_100), "{elapsed:?}");
        match err {
            AiHeroError::PollTimeout { id, last_state, .. } => {
                assert_eq!(id, "j-slow");
                assert_eq!(last_state.as_deref(), Some("continue"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_backoff_respects_deadline() {
        let calls = AtomicUsize::new(0);
        let mut cfg = config(100, Some(1_000));
        cfg.retry = RetryConfig {
            max_retries: 5,
            base_delay_ms: 500,
        };
        let poller = Poller::new(cfg);
        let start = Instant::now();

        let err = poller
            .run("j-flaky", &StateVocabulary::JOB, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<Snap, _>(AiHeroError::Transport {
                        message: "connection reset".into(),
                        source: None,
                    })
                }
            })
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert_eq!(err.kind(), ErrorKind::PollTimeout);
        assert!(elapsed >= Duration::from_millis(1_000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_100), "{elapsed:?}");
        // 0 ms, then 500 ms; the 1000 ms backoff is capped at the deadline.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_state_keeps_polling() {
        let script = Script::new(vec![snap(None), snap(None), snap(Some("success"))]);
        let poller = Poller::new(config(1_000, Some(60_000)));

        let outcome = poller
            .run("wf", &StateVocabulary::WORKFLOW, || script.next())
            .await
            .unwrap();

        assert_eq!(script.calls(), 3);
        assert_eq!(
            outcome.record.history,
            vec![PollPhase::Unknown, PollPhase::Unknown, PollPhase::Done]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_propagates_by_default() {
        let script = Script::new(vec![
            snap(Some("continue")),
            Err(AiHeroError::Transport {
                message: "connection reset".into(),
                source: None,
            }),
            snap(Some("done")),
        ]);
        let poller = Poller::new(config(100, None));

        let err = poller
            .run("j1", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_retried_when_policy_allows() {
        let script = Script::new(vec![
            Err(AiHeroError::Transport {
                message: "connection reset".into(),
                source: None,
            }),
            Err(AiHeroError::Transport {
                message: "connection reset".into(),
                source: None,
            }),
            snap(Some("done")),
        ]);
        let mut cfg = config(100, None);
        cfg.retry = RetryConfig {
            max_retries: 2,
            base_delay_ms: 50,
        };
        let poller = Poller::new(cfg);

        let outcome = poller
            .run("j1", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap();

        assert_eq!(script.calls(), 3);
        assert_eq!(outcome.record.retries, 2);
        assert_eq!(outcome.record.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_status_is_never_retried() {
        let script = Script::new(vec![Err(AiHeroError::RemoteStatus {
            status: 503,
            message: "busy".into(),
        })]);
        let mut cfg = config(100, None);
        cfg.retry.max_retries = 5;
        let poller = Poller::new(cfg);

        let err = poller
            .run("j1", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_wait() {
        let script = Script::new(Vec::new());
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(250)).await;
            trigger.cancel();
        });
        let poller = Poller::new(config(100, None)).with_cancellation(token);

        let err = poller
            .run("j-cancel", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap_err();

        assert!(matches!(err, AiHeroError::Cancelled { ref id } if id == "j-cancel"));
        assert!(script.calls() >= 2 && script.calls() <= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_every_tick() {
        struct Counter(AtomicUsize);
        impl PollObserver for Counter {
            fn on_tick(&self, tick: &PollTick<'_>) {
                assert_eq!(tick.id, "j1");
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let script = Script::new(vec![snap(Some("created")), snap(Some("done"))]);
        let poller = Poller::new(config(100, None)).with_observer(counter.clone());

        poller
            .run("j1", &StateVocabulary::JOB, || script.next())
            .await
            .unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
