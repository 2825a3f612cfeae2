//! Periodic fetch coordinator.
//!
//! Each refresh takes the session for its whole duration, fetches the
//! planned categories, assembles a [`Snapshot`] and publishes it on a
//! `watch` channel. A failed refresh keeps the previous snapshot and records
//! the failure so consumers can mark entities unavailable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use garmin_connect_client::GarminError;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, watch};

use crate::error::{ErrorKind, IntegrationError, IntegrationResult};
use crate::session::{Session, SessionGuard};
use crate::snapshot::{Category, FetchPlan, RawFetch, Snapshot, assemble, profile_id};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(300);

/// Hours after local midnight during which an empty day falls back to
/// yesterday's summary.
const MIDNIGHT_FALLBACK_HOURS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshStatus {
    Pending,
    Ok,
    Failed { kind: ErrorKind, message: String },
}

/// What the coordinator publishes after every attempt.
#[derive(Clone, Debug)]
pub struct CoordinatorState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub status: RefreshStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            snapshot: None,
            status: RefreshStatus::Pending,
            last_success: None,
            last_attempt: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum RefreshOutcome {
    Published(Arc<Snapshot>),
    /// Another refresh was already running; this trigger joined it.
    Coalesced,
    /// Shutdown was signalled before the refresh finished.
    Cancelled,
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Coordinator {
    session: Arc<Session>,
    plan: FetchPlan,
    time_zone: Tz,
    interval: Duration,
    state: watch::Sender<CoordinatorState>,
    in_flight: Mutex<()>,
    shutdown: watch::Receiver<bool>,
    clock: Clock,
}

/// Resolves once shutdown is signalled. A dropped sender never resolves.
async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn is_fatal(err: &GarminError) -> bool {
    err.is_auth() || err.is_rate_limited()
}

impl Coordinator {
    pub fn new(
        session: Arc<Session>,
        plan: FetchPlan,
        time_zone: Tz,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            session,
            plan,
            time_zone,
            interval,
            state,
            in_flight: Mutex::new(()),
            shutdown,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one refresh. Concurrent triggers coalesce into the one in flight.
    pub async fn refresh(&self) -> IntegrationResult<RefreshOutcome> {
        let Ok(_flight) = self.in_flight.try_lock() else {
            tracing::debug!("refresh already in flight");
            return Ok(RefreshOutcome::Coalesced);
        };

        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return Ok(RefreshOutcome::Cancelled);
        }

        let attempt_at = (self.clock)();
        let result = tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => {
                tracing::debug!("refresh abandoned on shutdown");
                metrics::counter!("garmin_connect_refresh_total", "outcome" => "cancelled").increment(1);
                return Ok(RefreshOutcome::Cancelled);
            }
            result = self.fetch(attempt_at) => result,
        };

        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.state.send_modify(|state| {
                    state.snapshot = Some(snapshot.clone());
                    state.status = RefreshStatus::Ok;
                    state.last_success = Some(attempt_at);
                    state.last_attempt = Some(attempt_at);
                });
                metrics::counter!("garmin_connect_refresh_total", "outcome" => "ok").increment(1);
                tracing::debug!(date = %snapshot.date, fields = snapshot.data().len(), "snapshot published");
                Ok(RefreshOutcome::Published(snapshot))
            }
            Err(err) => {
                let kind = err.kind();
                self.state.send_modify(|state| {
                    state.status = RefreshStatus::Failed {
                        kind,
                        message: err.to_string(),
                    };
                    state.last_attempt = Some(attempt_at);
                });
                metrics::counter!("garmin_connect_refresh_total", "outcome" => kind.as_str()).increment(1);
                match kind {
                    ErrorKind::Auth => tracing::error!(error = %err, "refresh failed"),
                    _ => tracing::warn!(error = %err, "refresh failed"),
                }
                Err(err)
            }
        }
    }

    /// Poll on the configured interval until shutdown. A failed tick waits
    /// for the next one; there is no immediate retry.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(interval = ?self.interval, "coordinator started");
        loop {
            tokio::select! {
                _ = shutdown_signalled(&mut shutdown) => break,
                _ = ticker.tick() => {
                    // Failures are already recorded in the published state.
                    let _ = self.refresh().await;
                }
            }
        }
        tracing::info!("coordinator stopped");
    }

    async fn fetch(&self, attempt_at: DateTime<Utc>) -> IntegrationResult<Snapshot> {
        let now = attempt_at.with_timezone(&self.time_zone);
        let today = now.date_naive();

        let mut guard = self.session.lock().await;
        guard
            .ensure_login()
            .await
            .map_err(IntegrationError::from_fetch)?;

        let fetcher = Fetcher {
            guard: &guard,
            plan: &self.plan,
        };
        let (day, raw) = fetcher.fetch_all(today, now.hour()).await?;

        let mut snapshot = assemble(raw, now);
        snapshot.date = day;
        Ok(snapshot)
    }
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn minus_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(date)
}

fn plus_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(date)
}

fn has_steps(summary: &Value) -> bool {
    summary
        .get("totalSteps")
        .and_then(Value::as_f64)
        .is_some_and(|steps| steps != 0.0)
}

/// One refresh worth of upstream calls under a held session.
struct Fetcher<'g, 's> {
    guard: &'g SessionGuard<'s>,
    plan: &'g FetchPlan,
}

impl Fetcher<'_, '_> {
    /// Fetch a required category: any failure fails the refresh.
    async fn required<F>(&self, category: Category, fut: F) -> IntegrationResult<Option<Value>>
    where
        F: Future<Output = Result<Value, GarminError>>,
    {
        if !self.plan.contains(category) {
            return Ok(None);
        }
        self.guard
            .timed(category.as_str(), fut)
            .await
            .map(Some)
            .map_err(IntegrationError::from_fetch)
    }

    /// Fetch an optional category: failures other than auth and rate limits
    /// leave it empty. Auth errors still fail the refresh and latch re-login.
    async fn optional<F>(&self, category: Category, fut: F) -> IntegrationResult<Option<Value>>
    where
        F: Future<Output = Result<Value, GarminError>>,
    {
        if !self.plan.contains(category) {
            return Ok(None);
        }
        self.best_effort(category.as_str(), fut).await
    }

    async fn best_effort<F>(&self, call: &'static str, fut: F) -> IntegrationResult<Option<Value>>
    where
        F: Future<Output = Result<Value, GarminError>>,
    {
        match self.guard.timed(call, fut).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if is_fatal(&err) => Err(IntegrationError::from_fetch(err)),
            Err(err) => {
                tracing::debug!(call, error = %err, "optional fetch skipped");
                Ok(None)
            }
        }
    }

    async fn fetch_all(&self, today: NaiveDate, hour: u32) -> IntegrationResult<(NaiveDate, RawFetch)> {
        let client = self.guard.client();
        let mut raw = RawFetch::default();
        let mut day = today;

        let mut summary = self
            .guard
            .timed("summary", client.get_user_summary(&iso(today)))
            .await
            .map_err(IntegrationError::from_fetch)?;

        if hour < MIDNIGHT_FALLBACK_HOURS && !has_steps(&summary) {
            let yesterday = minus_days(today, 1);
            let previous = self
                .guard
                .timed("summary", client.get_user_summary(&iso(yesterday)))
                .await
                .map_err(IntegrationError::from_fetch)?;
            if has_steps(&previous) {
                tracing::debug!(%yesterday, "using yesterday's summary after midnight");
                summary = previous;
                day = yesterday;
            }
        }
        let user_profile_id = profile_id(summary.get("userProfileId"));
        raw.summary = Some(summary);

        let date = iso(day);
        raw.daily_steps = self
            .required(
                Category::DailySteps,
                client.get_daily_steps(&iso(minus_days(day, 7)), &iso(minus_days(day, 1))),
            )
            .await?;
        raw.body_composition = self
            .required(Category::BodyComposition, client.get_body_composition(&date))
            .await?;
        raw.activities = self
            .required(
                Category::Activities,
                client.get_activities_by_date(&iso(minus_days(day, 7)), &iso(plus_days(day, 1))),
            )
            .await?;
        raw.workouts = self
            .optional(Category::Workouts, client.get_workouts(0, 10))
            .await?;
        raw.badges = self
            .required(Category::Badges, client.get_earned_badges())
            .await?;
        raw.training_readiness = self
            .optional(Category::TrainingReadiness, client.get_training_readiness(&date))
            .await?;
        raw.training_status = self
            .optional(Category::TrainingStatus, client.get_training_status(&date))
            .await?;
        raw.lactate_threshold = self
            .optional(Category::LactateThreshold, client.get_lactate_threshold())
            .await?;
        raw.alarms = self
            .required(Category::Alarms, client.get_device_alarms())
            .await?;
        raw.activity_types = self
            .required(Category::ActivityTypes, client.get_activity_types())
            .await?;
        raw.sleep = self
            .required(Category::Sleep, client.get_sleep_data(&date))
            .await?;
        raw.hrv = self.required(Category::Hrv, client.get_hrv_data(&date)).await?;
        raw.endurance_score = self
            .required(Category::EnduranceScore, client.get_endurance_score(&date))
            .await?;
        raw.hill_score = self
            .required(Category::HillScore, client.get_hill_score(&date))
            .await?;
        raw.menstrual = self
            .optional(Category::Menstrual, client.get_menstrual_data_for_date(&date))
            .await?
            .or_else(|| {
                self.plan
                    .contains(Category::Menstrual)
                    .then(|| Value::Object(Default::default()))
            });
        raw.fitness_age = self
            .required(Category::FitnessAge, client.get_fitnessage_data(&date))
            .await?;
        raw.hydration = self
            .required(Category::Hydration, client.get_hydration_data(&date))
            .await?;
        raw.blood_pressure = self
            .optional(
                Category::BloodPressure,
                client.get_blood_pressure(&iso(minus_days(day, 30)), &date),
            )
            .await?;

        if self.plan.contains(Category::Gear) {
            match user_profile_id {
                Some(profile) => self.fetch_gear(&profile, &mut raw).await?,
                None => tracing::debug!("summary has no userProfileId, skipping gear"),
            }
        }

        Ok((day, raw))
    }

    async fn fetch_gear(&self, profile: &str, raw: &mut RawFetch) -> IntegrationResult<()> {
        let client = self.guard.client();
        let gear = self
            .guard
            .timed("gear", client.get_gear(profile))
            .await
            .map_err(IntegrationError::from_fetch)?;

        let uuids: Vec<String> = gear
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|g| g.get("uuid").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // A single gear item failing only leaves that item without stats.
        for uuid in &uuids {
            let Some(mut stats) = self
                .best_effort("gear_stats", client.get_gear_stats(uuid))
                .await?
            else {
                tracing::warn!(%uuid, "gear stats unavailable");
                continue;
            };
            if let Some(obj) = stats.as_object_mut() {
                obj.entry("uuid").or_insert_with(|| Value::String(uuid.clone()));
            }
            raw.gear_stats.push(stats);
        }

        if !uuids.is_empty() {
            raw.gear_defaults = self
                .best_effort("gear_defaults", client.get_gear_defaults(profile))
                .await?;
        }
        raw.gear = Some(gear);
        Ok(())
    }
}
