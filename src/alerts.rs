//! Periodic alert triggers against the downstream API.
//!
//! Two timers: one asks the API to create alerts (`POST api/alerts`), the
//! other to deactivate stale ones (`PUT api/alerts/update`). Failures are
//! logged and otherwise ignored; the next tick simply tries again.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::config::{with_trailing_slash, Config};

// ---

pub const CREATE_ALERTS_PATH: &str = "api/alerts";
pub const RESET_ALERTS_PATH: &str = "api/alerts/update";

#[derive(Debug, Clone)]
pub struct AlertTimers {
    client: Client,
    api_base_url: String,
    create_interval: Duration,
    reset_interval: Duration,
}

impl AlertTimers {
    // ---
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_base_url: with_trailing_slash(config.api_base_url.clone()),
            create_interval: Duration::from_secs(config.alert_create_interval_secs),
            reset_interval: Duration::from_secs(config.alert_reset_interval_secs),
        }
    }

    /// Spawn both timers; they run until `cancel` fires.
    ///
    /// Tokio intervals tick immediately, so the first tick is skipped and
    /// each call first happens one full interval after start.
    pub fn start(self, cancel: CancellationToken) {
        // ---
        self.spawn_timer(
            "create",
            Method::POST,
            CREATE_ALERTS_PATH,
            self.create_interval,
            cancel.clone(),
        );
        self.spawn_timer(
            "reset",
            Method::PUT,
            RESET_ALERTS_PATH,
            self.reset_interval,
            cancel,
        );
    }

    fn spawn_timer(
        &self,
        name: &'static str,
        method: Method,
        path: &'static str,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        // ---
        let client = self.client.clone();
        let url = format!("{}{}", self.api_base_url, path);
        tokio::spawn(run_every(name, interval, cancel, move || {
            let client = client.clone();
            let method = method.clone();
            let url = url.clone();
            async move {
                tracing::info!("Alert {} timer triggered at {}", name, chrono::Utc::now());
                trigger(&client, method, &url).await;
            }
        }));
    }
}

/// Run `action` once per `period`, the first time one full period from now,
/// until `cancel` fires.
async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut action: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    // ---
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => action().await,
        }
    }
    tracing::debug!("Alert {} timer stopped", name);
}

/// Fire one alert request. Returns the response status, or `None` if the
/// request could not be sent.
pub async fn trigger(client: &Client, method: Method, url: &str) -> Option<StatusCode> {
    // ---
    match client.request(method.clone(), url).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!("{} {} returned {}", method, url, resp.status());
            Some(resp.status())
        }
        Ok(resp) => {
            tracing::warn!("Alert request {} {} failed: {}", method, url, resp.status());
            Some(resp.status())
        }
        Err(err) => {
            tracing::warn!("Alert request {} {} failed: {}", method, url, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_skips_first_tick_and_stops_on_cancel() {
        // ---
        let fired = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = Arc::clone(&fired);
        let timer = tokio::spawn(run_every(
            "test",
            Duration::from_secs(60),
            cancel.clone(),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        // Nothing fires at startup
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        cancel.cancel();
        timer.await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
