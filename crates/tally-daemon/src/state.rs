//! Shared runtime state for tally-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Every trigger, whether
//! it arrives over HTTP or from the schedule loop, goes through
//! [`AppState::invoke`] so the single-pass guard covers both.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use tally_notify::parse_notification;
use tally_runtime::{PassError, PassSummary, Runner, TriggerResponse};

pub const ENV_PASS_INTERVAL: &str = "TALLY_PASS_INTERVAL_SECS";

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the daemon, returned by GET /v1/status.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "idle" | "running"
    pub state: String,
    pub passes_run: u64,
    pub last_pass: Option<PassSummary>,
    pub last_error: Option<String>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub schedule_interval_secs: Option<u64>,
}

impl StatusSnapshot {
    fn idle(schedule: Option<Duration>) -> Self {
        Self {
            daemon_uptime_secs: uptime_secs(),
            state: "idle".to_string(),
            passes_run: 0,
            last_pass: None,
            last_error: None,
            last_finished_at: None,
            schedule_interval_secs: schedule.map(|d| d.as_secs()),
        }
    }
}

/// Outcome of [`AppState::invoke`].
#[derive(Debug, Clone)]
pub enum Invocation {
    Completed(TriggerResponse),
    /// Another pass holds the guard; nothing was attempted.
    Busy,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub runner: Runner,
    pub status: Arc<RwLock<StatusSnapshot>>,
    pass_guard: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(runner: Runner) -> Self {
        Self::with_schedule(runner, None)
    }

    pub fn with_schedule(runner: Runner, schedule: Option<Duration>) -> Self {
        Self {
            build: BuildInfo {
                service: "tally-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            runner,
            status: Arc::new(RwLock::new(StatusSnapshot::idle(schedule))),
            pass_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Handle one trigger event.
    ///
    /// Notifications are routed without touching the guard. Anything else
    /// runs a pass unless one is already in flight. The pass runs on its own
    /// task holding the guard, so a panic is reported as a 500 and the
    /// status goes back to idle.
    pub async fn invoke(&self, event: &Value) -> Invocation {
        if parse_notification(event).is_some() {
            return Invocation::Completed(self.runner.handle(event).await);
        }

        let Ok(held) = Arc::clone(&self.pass_guard).try_lock_owned() else {
            warn!("pass already in flight; trigger refused");
            return Invocation::Busy;
        };

        let state = self.clone();
        let task = tokio::spawn(async move {
            let _held = held;
            state.run_and_record().await
        });

        match task.await {
            Ok(response) => Invocation::Completed(response),
            Err(join) => {
                let err = PassError::Task(join.to_string());
                error!(error = %err, "pass task aborted");
                let mut st = self.status.write().await;
                st.state = "idle".to_string();
                st.passes_run += 1;
                st.last_finished_at = Some(Utc::now());
                st.last_error = Some(err.to_string());
                Invocation::Completed(TriggerResponse::error(&err))
            }
        }
    }

    async fn run_and_record(&self) -> TriggerResponse {
        self.status.write().await.state = "running".to_string();

        let result = self.runner.run_pass_at(Utc::now()).await;

        let mut st = self.status.write().await;
        st.state = "idle".to_string();
        st.passes_run += 1;
        st.last_finished_at = Some(Utc::now());
        match result {
            Ok(summary) => {
                let response = TriggerResponse::pass_completed(&summary);
                st.last_error = None;
                st.last_pass = Some(summary);
                response
            }
            Err(e) => {
                warn!(status = e.status_code(), error = %e, "pass failed");
                st.last_error = Some(e.to_string());
                TriggerResponse::error(&e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule loop
// ---------------------------------------------------------------------------

/// Parse [`ENV_PASS_INTERVAL`]. Unset, blank, zero or unparsable means no
/// schedule.
pub fn interval_from_env() -> Option<Duration> {
    interval_from_value(std::env::var(ENV_PASS_INTERVAL).ok().as_deref())
}

pub fn interval_from_value(raw: Option<&str>) -> Option<Duration> {
    let secs: u64 = raw?.trim().parse().ok()?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run a pass every `every`, first one after a full interval. A tick that
/// lands while a pass is still running is skipped.
pub fn spawn_scheduler(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticker = tokio::time::interval_at(start, every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match state.invoke(&Value::Object(Default::default())).await {
                Invocation::Completed(resp) => {
                    info!(status = resp.status_code, "scheduled pass finished")
                }
                Invocation::Busy => info!("scheduled pass skipped; previous pass still running"),
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
