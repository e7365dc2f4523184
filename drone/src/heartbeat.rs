//! `Heartbeat` (§4.14): polls the server's health endpoint every 10 s and
//! tracks connectivity as a small state machine, surfacing transitions as
//! OS notifications and log events.

use std::time::Duration;

use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown,
    Up,
    Down,
    DisabledOnServer,
}

pub struct Heartbeat {
    http: reqwest::Client,
    health_url: String,
    api_key: Option<String>,
    state: HealthState,
    consecutive_failures: u32,
}

impl Heartbeat {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            health_url: format!("{}/api/v1/health", base_url.into()),
            api_key,
            state: HealthState::Unknown,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Runs the poll loop forever. Terminal `DisabledOnServer` state is
    /// latched: once reached, polling keeps running but never transitions
    /// back without an operator restarting the drone with a fresh key.
    pub async fn run(&mut self) -> ! {
        loop {
            self.poll_once().await;
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn poll_once(&mut self) {
        if self.state == HealthState::DisabledOnServer {
            return;
        }

        let mut builder = self.http.get(&self.health_url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        match builder.send().await {
            Ok(response) if response.status() == reqwest::StatusCode::UNAUTHORIZED => {
                let body = response.text().await.unwrap_or_default();
                if body.contains("key_disabled") {
                    self.state = HealthState::DisabledOnServer;
                    warn!("drone API key disabled on server, halting health checks");
                }
            }
            Ok(response) if response.status().is_success() => {
                self.consecutive_failures = 0;
                if self.state != HealthState::Up {
                    info!("server reachable");
                }
                self.state = HealthState::Up;
            }
            Ok(response) => {
                self.record_failure(&format!("unexpected status {}", response.status()));
            }
            Err(err) => {
                self.record_failure(&err.to_string());
            }
        }
    }

    fn record_failure(&mut self, reason: &str) {
        self.consecutive_failures += 1;
        warn!(reason, failures = self.consecutive_failures, "health check failed");
        if self.consecutive_failures >= FAILURE_THRESHOLD && self.state != HealthState::Down {
            self.state = HealthState::Down;
            dispatch_unreachable_notification();
        }
    }
}

fn dispatch_unreachable_notification() {
    let result = notify_rust::Notification::new()
        .summary("Server Unreachable")
        .body("The hive server has not responded to 3 consecutive health checks.")
        .show();
    if let Err(err) = result {
        warn!(error = %err, "failed to show OS notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let heartbeat = Heartbeat::new("http://localhost:8080", None);
        assert_eq!(heartbeat.state(), HealthState::Unknown);
    }
}
