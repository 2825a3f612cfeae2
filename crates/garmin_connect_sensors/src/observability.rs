//! Integration health as reported on `/health`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::coordinator::{CoordinatorState, RefreshStatus};
use crate::session::AuthState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Last refresh succeeded.
    Ok,
    /// No refresh has completed yet.
    Starting,
    /// Last refresh failed; entities are unavailable until the next success.
    Degraded,
    /// Credentials were rejected. Nothing recovers until reauthentication.
    ReauthRequired,
}

#[derive(Clone, Debug, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub auth: AuthState,
    pub refresh: RefreshStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub entities: usize,
}

impl Health {
    pub fn evaluate(auth: AuthState, state: &CoordinatorState, entities: usize) -> Self {
        let status = match (&auth, &state.status) {
            (AuthState::ReauthRequired(_), _) => HealthStatus::ReauthRequired,
            (_, RefreshStatus::Ok) => HealthStatus::Ok,
            (_, RefreshStatus::Pending) => HealthStatus::Starting,
            (_, RefreshStatus::Failed { .. }) => HealthStatus::Degraded,
        };
        Self {
            status,
            auth,
            refresh: state.status.clone(),
            last_success: state.last_success,
            last_attempt: state.last_attempt,
            entities,
        }
    }

    pub fn is_serving(&self) -> bool {
        self.status != HealthStatus::ReauthRequired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn auth_latch_dominates() {
        let state = CoordinatorState {
            status: RefreshStatus::Ok,
            ..Default::default()
        };
        let health = Health::evaluate(AuthState::ReauthRequired("401".into()), &state, 3);
        assert_eq!(health.status, HealthStatus::ReauthRequired);
        assert!(!health.is_serving());
    }

    #[test]
    fn failed_refresh_is_degraded() {
        let state = CoordinatorState {
            status: RefreshStatus::Failed {
                kind: ErrorKind::RateLimit,
                message: "slow down".into(),
            },
            ..Default::default()
        };
        let health = Health::evaluate(AuthState::Authenticated, &state, 0);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(health.is_serving());

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["refresh"]["status"], "failed");
        assert_eq!(json["refresh"]["kind"], "rate_limit");
    }

    #[test]
    fn nothing_yet_is_starting() {
        let health = Health::evaluate(AuthState::Unauthenticated, &CoordinatorState::default(), 0);
        assert_eq!(health.status, HealthStatus::Starting);
    }
}
