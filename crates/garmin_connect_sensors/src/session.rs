//! Session ownership: serialized access to the Garmin client, login state and
//! per-call timeouts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use garmin_connect_client::{GarminClient, GarminError};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    /// Credentials were rejected. Nothing logs in again until
    /// [`Session::reauthenticate`] is called.
    ReauthRequired(String),
}

struct SessionInner {
    mfa_code: Option<SecretString>,
}

pub struct Session {
    client: Arc<dyn GarminClient>,
    call_timeout: Duration,
    inner: Mutex<SessionInner>,
    auth: watch::Sender<AuthState>,
}

impl Session {
    pub fn new(
        client: Arc<dyn GarminClient>,
        call_timeout: Duration,
        mfa_code: Option<SecretString>,
    ) -> Self {
        let (auth, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            client,
            call_timeout,
            inner: Mutex::new(SessionInner { mfa_code }),
            auth,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.auth.subscribe()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Take the session for the duration of one refresh or one action.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            session: self,
            inner: self.inner.lock().await,
        }
    }

    /// Clear a reauthentication latch and log in again, optionally with a
    /// fresh MFA code.
    pub async fn reauthenticate(&self, mfa_code: Option<SecretString>) -> Result<(), GarminError> {
        let mut guard = self.lock().await;
        guard.inner.mfa_code = mfa_code;
        self.auth.send_replace(AuthState::Unauthenticated);
        guard.ensure_login().await
    }

    fn latch(&self, reason: String) {
        tracing::warn!(%reason, "Garmin Connect rejected the credentials, reauthentication required");
        self.auth.send_replace(AuthState::ReauthRequired(reason));
    }
}

/// Exclusive access to the session.
pub struct SessionGuard<'a> {
    session: &'a Session,
    inner: MutexGuard<'a, SessionInner>,
}

impl SessionGuard<'_> {
    /// Log in unless already authenticated. A pending MFA code is used at
    /// most once.
    pub async fn ensure_login(&mut self) -> Result<(), GarminError> {
        let state = self.session.auth_state();
        match state {
            AuthState::Authenticated => return Ok(()),
            AuthState::ReauthRequired(reason) => return Err(GarminError::Auth(reason)),
            AuthState::Unauthenticated => {}
        }

        let code = self.inner.mfa_code.take();
        let code = code.as_ref().map(|c| c.expose_secret().to_string());
        let client = self.session.client.clone();
        self.timed("login", client.login(code.as_deref())).await?;

        tracing::info!("Garmin Connect session established");
        self.session.auth.send_replace(AuthState::Authenticated);
        Ok(())
    }

    pub fn client(&self) -> &dyn GarminClient {
        self.session.client.as_ref()
    }

    /// Run one upstream call under the session timeout. Auth failures latch
    /// the session into `ReauthRequired`.
    pub async fn timed<T, F>(&self, op: &str, fut: F) -> Result<T, GarminError>
    where
        F: Future<Output = Result<T, GarminError>>,
    {
        match tokio::time::timeout(self.session.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err.is_auth() {
                    self.session.latch(err.to_string());
                }
                Err(err)
            }
            Err(_) => {
                tracing::debug!(op, timeout = ?self.session.call_timeout, "upstream call timed out");
                Err(GarminError::Timeout(format!(
                    "{op} exceeded {}s",
                    self.session.call_timeout.as_secs()
                )))
            }
        }
    }
}
