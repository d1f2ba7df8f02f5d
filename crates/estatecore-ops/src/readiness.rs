use crate::config::DatabaseUrl;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bounded retry schedule: at most `max_attempts` probes, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// A zero attempt bound is raised to one.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError<E>
where
    E: std::error::Error + 'static,
{
    #[error("dependency still unavailable after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: E,
    },
}

/// Polls `probe` until it succeeds or the policy's bound is exhausted.
///
/// Returns the attempt number that succeeded. Sleeps only between attempts,
/// never after the final failure.
pub async fn wait_until<F, Fut, E>(
    policy: RetryPolicy,
    mut probe: F,
) -> Result<u32, ReadinessError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::error::Error + 'static,
{
    let mut attempt = 1;
    loop {
        match probe().await {
            Ok(()) => {
                info!(attempt, "dependency ready");
                return Ok(attempt);
            }
            Err(last_error) if attempt >= policy.max_attempts => {
                warn!(attempts = attempt, error = %last_error, "giving up on dependency");
                return Err(ReadinessError::Exhausted {
                    attempts: attempt,
                    last_error,
                });
            }
            Err(error) => {
                debug!(attempt, max = policy.max_attempts, %error, "dependency not ready");
                tokio::time::sleep(policy.interval).await;
                attempt += 1;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(#[from] tokio_postgres::Error),
    #[error("no response within {0:?}")]
    TimedOut(Duration),
}

/// Opens a throwaway connection and runs `SELECT 1`.
pub async fn probe_database(url: &DatabaseUrl, timeout: Duration) -> Result<(), ProbeError> {
    let attempt = async {
        let client = crate::database::connect(url).await?;
        client.simple_query("SELECT 1").await?;
        Ok::<_, tokio_postgres::Error>(())
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| ProbeError::TimedOut(timeout))?
        .map_err(ProbeError::from)
}

/// Readiness gate for the database named by `url`.
pub async fn wait_for_database(
    url: &DatabaseUrl,
    policy: RetryPolicy,
) -> Result<u32, ReadinessError<ProbeError>> {
    info!(
        database = %url,
        attempts = policy.max_attempts,
        interval = ?policy.interval,
        "waiting for database"
    );
    let timeout = policy.interval.max(Duration::from_secs(1));
    wait_until(policy, || probe_database(url, timeout)).await
}
