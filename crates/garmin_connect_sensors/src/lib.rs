//! Garmin Connect sensor hub.
//!
//! Polls Garmin Connect on a fixed interval, projects each snapshot onto a
//! catalog of sensor entities and exposes a small set of write actions.
//! [`SensorHub`] wires the pieces together; `main.rs` serves them over HTTP.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use garmin_connect_client::GarminClient;
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::SecretString;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;

pub mod actions;
pub mod alarms;
pub mod catalog;
pub mod coordinator;
pub mod entities;
pub mod error;
pub mod gear;
pub mod groups;
pub mod http;
pub mod middleware;
pub mod observability;
pub mod options;
pub mod projection;
pub mod session;
pub mod snapshot;

mod test_utils;

use crate::actions::ActionHandlers;
use crate::coordinator::{Clock, Coordinator};
use crate::entities::EntityRegistry;
use crate::error::IntegrationResult;
use crate::http::AppState;
use crate::options::IntegrationOptions;
use crate::session::Session;

/// One configured Garmin Connect account: session, coordinator and entities.
pub struct SensorHub {
    session: Arc<Session>,
    coordinator: Arc<Coordinator>,
    registry: Arc<RwLock<EntityRegistry>>,
    time_zone: Tz,
    clock: Clock,
    shutdown: watch::Sender<bool>,
}

impl SensorHub {
    pub fn new(
        client: Arc<dyn GarminClient>,
        options: &IntegrationOptions,
        call_timeout: Duration,
        mfa_code: Option<SecretString>,
    ) -> IntegrationResult<Self> {
        Self::with_clock(client, options, call_timeout, mfa_code, Arc::new(Utc::now))
    }

    pub fn with_clock(
        client: Arc<dyn GarminClient>,
        options: &IntegrationOptions,
        call_timeout: Duration,
        mfa_code: Option<SecretString>,
        clock: Clock,
    ) -> IntegrationResult<Self> {
        let time_zone = options.time_zone()?;
        let session = Arc::new(Session::new(client, call_timeout, mfa_code));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let coordinator = Coordinator::new(
            session.clone(),
            options.fetch_plan(),
            time_zone,
            options.update_interval(),
            shutdown_rx,
        )
        .with_clock(clock.clone());
        let registry = EntityRegistry::builder()
            .groups(options.sensor_groups.clone())
            .overrides(options.entity_overrides.clone())
            .build();

        tracing::info!(
            entities = registry.len(),
            zone = time_zone.name(),
            interval = ?options.update_interval(),
            "sensor hub configured"
        );

        Ok(Self {
            session,
            coordinator: Arc::new(coordinator),
            registry: Arc::new(RwLock::new(registry)),
            time_zone,
            clock,
            shutdown,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn registry(&self) -> &Arc<RwLock<EntityRegistry>> {
        &self.registry
    }

    pub fn actions(&self) -> ActionHandlers {
        ActionHandlers::new(
            self.session.clone(),
            self.registry.clone(),
            self.coordinator.subscribe(),
            self.time_zone,
        )
        .with_clock(self.clock.clone())
    }

    pub fn app_state(&self, metrics: PrometheusHandle) -> Arc<AppState> {
        Arc::new(AppState {
            session: self.session.clone(),
            coordinator: self.coordinator.clone(),
            registry: self.registry.clone(),
            actions: self.actions(),
            metrics,
        })
    }

    /// Spawn the polling loop and the registry updater.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.coordinator.clone().run()),
            tokio::spawn(entities::follow(
                self.registry.clone(),
                self.coordinator.subscribe(),
            )),
        ]
    }

    /// Stop polling. An in-flight refresh is abandoned without publishing.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
