use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use crate::error::ProviderError;

/// Fixed-capacity admission gate for calls to rate-limited providers.
///
/// One permit is held for the whole run of each submitted task and is
/// released when the task completes, fails or is dropped.
pub struct RequestThrottle {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestThrottle {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits for a permit, then runs `task` to completion.
    pub async fn submit<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        // El semáforo nunca se cierra
        let _permit = self.semaphore.acquire().await.ok();
        let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        debug!("🚦 Tarea iniciada ({}/{} activas)", active, self.capacity);

        task.await
    }

    /// Runs every task through [`submit`](Self::submit); each item keeps its
    /// own result so one failure never cancels the others.
    pub async fn submit_batch<I, F, T, E>(&self, tasks: I) -> Vec<Result<T, E>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        join_all(tasks.into_iter().map(|task| self.submit(task))).await
    }

    /// Runs `factory()` through the gate, retrying per `policy`.
    ///
    /// The permit is released while sleeping between attempts.
    pub async fn submit_with_retry<T, F, Fut>(
        &self,
        policy: RetryPolicy,
        mut factory: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match self.submit(factory()).await {
                Ok(value) => return Ok(value),
                Err(error) => match policy.delay_after(attempt, &error) {
                    Some(delay) => {
                        warn!(
                            "⚠️ Intento {}/{} falló: {}. Reintentando en {:?}",
                            attempt, policy.max_attempts, error, delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(4)
    }
}
