//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::context::SessionContext;
use crate::error::ConfigError;
use crate::progress::DEFAULT_COMPLETION_THRESHOLD;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Percent of all questions that must be answered for completion.
    pub completion_threshold: u8,
    /// Presentation pacing delay before each emitted prompt.
    pub typing_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
            typing_delay: Duration::ZERO,
        }
    }
}

/// Host configuration, read from `ONBOARDING_*` environment variables.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    pub api_url: String,
    pub api_token: SecretString,
    pub user_id: String,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    /// Upper bound on one persistence round trip.
    pub save_timeout: Duration,
    /// Background outbox flush interval.
    pub retry_interval: Duration,
    /// Serve the REST surface on this port instead of the terminal.
    pub http_port: Option<u16>,
    pub session: SessionConfig,
}

impl OnboardingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_token = get("ONBOARDING_API_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("ONBOARDING_API_TOKEN".to_string()))?;

        let completion_threshold: u8 =
            parse_or(&get, "ONBOARDING_COMPLETION_THRESHOLD", DEFAULT_COMPLETION_THRESHOLD)?;
        if completion_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARDING_COMPLETION_THRESHOLD".to_string(),
                message: format!("{completion_threshold} is above 100"),
            });
        }

        let http_port = match get("ONBOARDING_HTTP_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "ONBOARDING_HTTP_PORT".to_string(),
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            api_url: get("ONBOARDING_API_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            api_token: SecretString::from(api_token),
            user_id: get("ONBOARDING_USER_ID").unwrap_or_else(|| "default".to_string()),
            db_path: get("ONBOARDING_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/onboarding.db")),
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "ONBOARDING_REQUEST_TIMEOUT_SECS",
                10,
            )?),
            save_timeout: Duration::from_secs(parse_or(&get, "ONBOARDING_SAVE_TIMEOUT_SECS", 15)?),
            retry_interval: Duration::from_secs(parse_or(
                &get,
                "ONBOARDING_RETRY_INTERVAL_SECS",
                60,
            )?),
            http_port,
            session: SessionConfig {
                completion_threshold,
                typing_delay: Duration::from_millis(parse_or(
                    &get,
                    "ONBOARDING_TYPING_DELAY_MS",
                    0,
                )?),
            },
        })
    }

    /// Session identity for this host.
    pub fn session_context(&self) -> SessionContext {
        SessionContext::with_secret(self.user_id.clone(), self.api_token.clone())
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
