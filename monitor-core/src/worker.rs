//! # Worker Pool
//!
//! Every registry operation that "takes time" hands its effect to this pool and
//! returns to the caller immediately. The pool:
//! - runs each effect as a detached tokio task,
//! - bounds how many effects run at once with a semaphore (callers never wait on it),
//! - gives every worker a cancellation token derived from one root token,
//! - optionally abandons effects that exceed a timeout.
//!
//! A worker only runs its completion step if the effect finished. The
//! completion step must still re-check that its entity exists: cancellation is
//! best effort and a worker can be past its last cancellation point when the
//! entity is deleted.

use crate::config::WorkerConfig;
use crate::effect::{EffectExecutor, Work};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How a detached worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The effect finished and the completion step ran.
    Completed,
    /// The token was cancelled before the effect finished.
    Cancelled,
    /// The effect exceeded the configured timeout.
    TimedOut,
}

pub struct WorkerPool {
    executor: Arc<dyn EffectExecutor>,
    permits: Arc<Semaphore>,
    max_permits: usize,
    root: CancellationToken,
    timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(executor: Arc<dyn EffectExecutor>, config: &WorkerConfig) -> Self {
        let max_permits = config.max_concurrent_effects.max(1);
        Self {
            executor,
            permits: Arc::new(Semaphore::new(max_permits)),
            max_permits,
            root: CancellationToken::new(),
            timeout: config.effect_timeout(),
        }
    }

    /// A fresh token for one entity. Cancelling it cancels every worker
    /// spawned with it (or with a child of it); shutting the pool down cancels it.
    pub fn entity_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Number of effects currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.max_permits - self.permits.available_permits()
    }

    /// Cancels every worker spawned through this pool.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Spawns a detached worker performing `work` for `subject`, then `complete`.
    pub fn spawn<F, Fut>(
        &self,
        work: Work,
        subject: impl Into<String>,
        token: CancellationToken,
        complete: F,
    ) -> JoinHandle<Outcome>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let subject = subject.into();
        let executor = self.executor.clone();
        let permits = self.permits.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => Outcome::Cancelled,
                outcome = run_effect(executor, permits, timeout, work, &subject) => outcome,
            };

            match outcome {
                Outcome::Completed => complete().await,
                Outcome::Cancelled => debug!("Worker: {} '{}' cancelled", work, subject),
                Outcome::TimedOut => warn!(
                    "Worker: {} '{}' exceeded {:?}, abandoned, '{}' {}",
                    work,
                    subject,
                    timeout,
                    subject,
                    work.abandoned_state()
                ),
            }
            outcome
        })
    }
}

async fn run_effect(
    executor: Arc<dyn EffectExecutor>,
    permits: Arc<Semaphore>,
    timeout: Option<Duration>,
    work: Work,
    subject: &str,
) -> Outcome {
    // The semaphore is never closed, so acquisition only fails if that changes.
    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_closed) => return Outcome::Cancelled,
    };

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, executor.perform(work, subject)).await {
            Ok(()) => Outcome::Completed,
            Err(_elapsed) => Outcome::TimedOut,
        },
        None => {
            executor.perform(work, subject).await;
            Outcome::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayConfig, DelayRange};
    use crate::effect::{NoDelay, SimulatedDelay};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn slow_pool(max: usize, timeout: Option<u64>) -> WorkerPool {
        let delays = DelayConfig {
            task: DelayRange::new(5, 5),
            ..DelayConfig::default()
        };
        WorkerPool::new(
            Arc::new(SimulatedDelay::new(delays)),
            &WorkerConfig {
                max_concurrent_effects: max,
                effect_timeout_secs: timeout,
            },
        )
    }

    #[tokio::test]
    async fn completion_runs_after_effect() {
        let pool = WorkerPool::new(Arc::new(NoDelay), &WorkerConfig::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let outcome = pool
            .spawn(Work::Task, "1", pool.entity_token(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_worker_skips_completion() {
        let pool = slow_pool(4, None);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let token = pool.entity_token();

        let handle = pool.spawn(Work::Task, "1", token.clone(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        token.cancel();

        assert_eq!(handle.await.unwrap(), Outcome::Cancelled);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_entity_tokens() {
        let pool = slow_pool(4, None);
        let handle = pool.spawn(Work::Task, "1", pool.entity_token(), || async {});
        pool.shutdown();

        assert!(pool.is_shut_down());
        assert_eq!(handle.await.unwrap(), Outcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_abandons_effect() {
        let pool = slow_pool(4, Some(1));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let handle = pool.spawn(Work::Task, "1", pool.entity_token(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(handle.await.unwrap(), Outcome::TimedOut);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn permits_bound_concurrent_effects() {
        let pool = slow_pool(2, None);
        let handles: Vec<_> = (0..5)
            .map(|i| pool.spawn(Work::Task, i.to_string(), pool.entity_token(), || async {}))
            .collect();

        // Let the workers reach the semaphore.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.in_flight(), 2);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Outcome::Completed);
        }
        assert_eq!(pool.in_flight(), 0);
    }
}
