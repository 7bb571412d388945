// src/jobs.rs
//! In-process stand-ins for the external task queue: interval jobs and
//! a bounded-retry runner. Delivery is at-least-once, so everything
//! scheduled here must be idempotent — the store's uniqueness keys make
//! the scrape and analyze paths safe to re-run.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;

/// Spawn a job that runs `tick` on a fixed interval until aborted.
pub fn spawn_interval_job<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            tick().await;
            counter!("jobs_ticks_total", "job" => name).increment(1);
            tracing::debug!(job = name, "interval tick finished");
        }
    })
}

/// Run `op` until it succeeds or attempts run out, sleeping
/// `backoff_base * 2^attempt` between tries. The final error is
/// returned to the caller as a permanently failed task.
pub async fn run_with_retry<T, E, F, Fut>(
    name: &str,
    max_attempts: u32,
    backoff_base: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(out) => return Ok(out),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts.max(1) {
                    counter!("jobs_failed_total").increment(1);
                    tracing::error!(task = name, error = %e, attempts = attempt, "task permanently failed");
                    return Err(e);
                }
                let delay = backoff_base * 2u32.pow(attempt - 1);
                tracing::warn!(task = name, error = %e, attempt, "task failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
