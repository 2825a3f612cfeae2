use crate::GarminError;
use secrecy::SecretString;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://connectapi.garmin.com";
pub const DEFAULT_BASE_URL_CN: &str = "https://connectapi.garmin.cn";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Account credentials and transport settings.
///
/// The MFA code is collected once at setup and is never written anywhere.
#[derive(Clone, Debug)]
pub struct Config {
    pub username: String,
    pub password: SecretString,
    pub token: Option<SecretString>,
    pub mfa_code: Option<SecretString>,
    pub base_url: String,
    pub is_cn: bool,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, GarminError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, GarminError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let username = get("GARMIN_CONNECT_USERNAME")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| GarminError::Config("GARMIN_CONNECT_USERNAME missing".into()))?;
        let password = get("GARMIN_CONNECT_PASSWORD")
            .ok_or_else(|| GarminError::Config("GARMIN_CONNECT_PASSWORD missing".into()))?;
        let token = get("GARMIN_CONNECT_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .map(|t| SecretString::new(t.into()));
        let mfa_code = get("GARMIN_CONNECT_MFA_CODE")
            .filter(|s| !s.trim().is_empty())
            .map(|c| SecretString::new(c.trim().to_string().into()));

        let is_cn = match get("GARMIN_CONNECT_IS_CN") {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                GarminError::Config(format!("GARMIN_CONNECT_IS_CN: not a boolean: {v}"))
            })?,
        };
        let base_url = get("GARMIN_CONNECT_BASE_URL").unwrap_or_else(|| {
            if is_cn {
                DEFAULT_BASE_URL_CN.into()
            } else {
                DEFAULT_BASE_URL.into()
            }
        });
        let timeout = match get("GARMIN_CONNECT_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT,
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    GarminError::Config(format!("GARMIN_CONNECT_TIMEOUT_SECS: invalid value {v}"))
                })?,
        };

        Ok(Self {
            username,
            password: SecretString::new(password.into()),
            token,
            mfa_code,
            base_url,
            is_cn,
            timeout,
        })
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
