//! Suggestion polling worker

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::notifier::poll::{PollOutcome, SuggestionNotifier};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Suggestion worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Backoff after failed polls, never longer than `interval`
    pub cooldown: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Run the suggestion worker.
///
/// Polls once immediately, then once per interval. A pending poll or wait is
/// abandoned as soon as `shutdown_signal` resolves.
pub async fn run<S, F>(
    options: &Options,
    notifier: &SuggestionNotifier,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Suggestion worker starting...");

    let mut err_streak: u32 = 0;

    loop {
        let result = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Suggestion worker shutting down...");
                return;
            }
            result = notifier.poll_once() => result,
        };

        let wait = match result {
            Ok(outcome) => {
                err_streak = 0;
                match outcome {
                    PollOutcome::Checked { fresh, total } => {
                        debug!("Suggestion poll checked {} suggestions, {} new", total, fresh.len())
                    }
                    PollOutcome::Skipped => debug!("Suggestion poll skipped, no devices"),
                    PollOutcome::Busy => debug!("Suggestion poll already running"),
                }
                options.interval
            }
            Err(e) => {
                let backoff = calc_exp_backoff(&options.cooldown, err_streak).min(options.interval);
                err_streak = err_streak.saturating_add(1);
                error!("Suggestion poll failed, retrying in {:?}: {}", backoff, e);
                backoff
            }
        };

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Suggestion worker shutting down...");
                return;
            }
            _ = sleep_fn(wait) => {}
        }
    }
}
