use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use tokio::time::{Instant, sleep};
use whatski_model::{Run, ThreadId};

use super::TurnError;
use crate::client::AssistantClient;

/// How the executor waits for a run to finish.
///
/// The first poll happens after `initial_interval`, and each following
/// interval grows by `multiplier` up to `max_interval`. Polling gives up
/// once `deadline` has passed or `max_attempts` polls were made.
#[derive(Clone, Debug, PartialEq)]
pub struct PollPolicy {
    /// The wait before the first poll.
    pub initial_interval: Duration,
    /// The growth factor of the interval.
    pub multiplier: f64,
    /// The upper bound of a single interval.
    pub max_interval: Duration,
    /// The total time a turn may wait for its run.
    pub deadline: Duration,
    /// The maximum number of polls.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 1.5,
            max_interval: Duration::from_secs(8),
            deadline: Duration::from_secs(120),
            max_attempts: 120,
        }
    }
}

impl PollPolicy {
    /// Returns a policy that polls at a fixed interval.
    #[inline]
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            multiplier: 1.0,
            max_interval: interval,
            ..Default::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        // The deadline is tracked on the tokio clock, so the backoff itself
        // never expires.
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_multiplier(self.multiplier)
            .with_max_interval(self.max_interval)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Polls the run until it reaches a terminal status.
///
/// Transient errors are tolerated and count as attempts. When the policy
/// gives up or polling fails for good, the run is cancelled on a
/// best-effort basis so that the thread accepts new messages again.
pub(super) async fn wait_for_run(
    client: &AssistantClient,
    policy: &PollPolicy,
    thread: &ThreadId,
    mut run: Run,
) -> Result<Run, TurnError> {
    if run.status.is_terminal() {
        return Ok(run);
    }

    let started = Instant::now();
    let mut backoff = policy.backoff();
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        let remaining = policy.deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            break;
        }
        let Some(interval) = backoff.next_backoff() else {
            break;
        };
        sleep(interval.min(remaining)).await;
        attempts += 1;

        match client.retrieve_run(thread, &run.id).await {
            Ok(polled) => {
                trace!("run {} is {:?}", polled.id, polled.status);
                if polled.status.is_terminal() {
                    return Ok(polled);
                }
                run = polled;
            }
            Err(err) if err.kind().is_transient() => {
                warn!("transient error while polling run {}: {err}", run.id);
            }
            Err(err) => {
                cancel_quietly(client, thread, &run).await;
                return Err(TurnError::Poll(err));
            }
        }
    }

    let elapsed = started.elapsed();
    warn!(
        "run {} still {:?} after {attempts} polls, cancelling",
        run.id, run.status
    );
    cancel_quietly(client, thread, &run).await;
    Err(TurnError::TimedOut { attempts, elapsed })
}

/// Cancels the run so that the thread accepts new messages again.
async fn cancel_quietly(
    client: &AssistantClient,
    thread: &ThreadId,
    run: &Run,
) {
    if let Err(err) = client.cancel_run(thread, &run.id).await {
        warn!("failed to cancel run {}: {err}", run.id);
    }
}
