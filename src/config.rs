//! Purpose: Resolve run settings from environment-style variables plus CLI overrides.
//! Exports: `Config`, `Overrides`, env variable names.
//! Role: Single place where defaults, env parsing, and validation live.
//! Invariants: Resolution is pure over a lookup closure; only `Config::from_env` reads the process env.
//! Invariants: Empty variables count as unset; invalid numbers are usage errors.
use crate::api::{DEFAULT_BASE_URL, RunMode, StreamClient, StreamFilter};
use crate::core::error::{Error, ErrorKind};
use crate::core::session::{DEFAULT_DEADLINE, DEFAULT_MAX_EVENTS, SessionLimits};
use std::time::Duration;

pub const ENV_BASE_URL: &str = "DS_BASE_URL";
pub const ENV_TOKEN: &str = "DS_TOKEN";
pub const ENV_TIMEOUT_MS: &str = "SSE_TIMEOUT_MS";
pub const ENV_MAX_EVENTS: &str = "SSE_MAX_EVENTS";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub token: Option<String>,
    pub limits: SessionLimits,
    pub filter: StreamFilter,
    pub mode: RunMode,
}

/// Values given on the command line; each one beats its environment variable.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_events: Option<u64>,
    pub filter: StreamFilter,
    pub sequential: bool,
}

impl Config {
    pub fn from_env(overrides: Overrides) -> Result<Self, Error> {
        Self::resolve(|key| std::env::var(key).ok(), overrides)
    }

    pub fn resolve<F>(lookup: F, overrides: Overrides) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_url = overrides
            .base_url
            .or_else(|| non_empty(ENV_BASE_URL))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token = overrides
            .token
            .filter(|token| !token.is_empty())
            .or_else(|| non_empty(ENV_TOKEN));

        let timeout_ms = match overrides.timeout_ms {
            Some(value) => require_positive("--timeout-ms", value)?,
            None => match non_empty(ENV_TIMEOUT_MS) {
                Some(raw) => parse_positive(ENV_TIMEOUT_MS, &raw)?,
                None => DEFAULT_DEADLINE.as_millis() as u64,
            },
        };
        let max_events = match overrides.max_events {
            Some(value) => require_positive("--max-events", value)?,
            None => match non_empty(ENV_MAX_EVENTS) {
                Some(raw) => parse_positive(ENV_MAX_EVENTS, &raw)?,
                None => DEFAULT_MAX_EVENTS as u64,
            },
        };
        let max_events = usize::try_from(max_events).map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("max events value is too large")
        })?;

        Ok(Self {
            base_url,
            token,
            limits: SessionLimits {
                deadline: Duration::from_millis(timeout_ms),
                max_events,
            },
            filter: overrides.filter,
            mode: if overrides.sequential {
                RunMode::Sequential
            } else {
                RunMode::Concurrent
            },
        })
    }
}

impl Config {
    pub fn client(&self) -> Result<StreamClient, Error> {
        let mut client = StreamClient::new(self.base_url.clone())?.with_filter(self.filter.clone());
        if let Some(token) = &self.token {
            client = client.with_token(token.clone());
        }
        Ok(client)
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u64, Error> {
    let value = raw.trim().parse::<u64>().map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("{name} must be a positive integer (got {raw:?})"))
            .with_source(err)
    })?;
    require_positive(name, value)
}

fn require_positive(name: &str, value: u64) -> Result<u64, Error> {
    if value == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{name} must be greater than zero")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{Config, ENV_BASE_URL, ENV_MAX_EVENTS, ENV_TIMEOUT_MS, ENV_TOKEN, Overrides};
    use crate::api::{RunMode, StreamFilter};
    use crate::core::error::ErrorKind;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_with_empty_env() {
        let config = Config::resolve(env(&[]), Overrides::default()).expect("config");
        assert_eq!(config.base_url, "http://127.0.0.1:7777");
        assert_eq!(config.token, None);
        assert_eq!(config.limits.deadline, Duration::from_millis(5000));
        assert_eq!(config.limits.max_events, 1);
        assert_eq!(config.filter, StreamFilter::default());
        assert_eq!(config.mode, RunMode::Concurrent);
    }

    #[test]
    fn env_values_are_used() {
        let config = Config::resolve(
            env(&[
                (ENV_BASE_URL, "http://ds.local:9000"),
                (ENV_TOKEN, "s3cret"),
                (ENV_TIMEOUT_MS, "250"),
                (ENV_MAX_EVENTS, "4"),
            ]),
            Overrides::default(),
        )
        .expect("config");
        assert_eq!(config.base_url, "http://ds.local:9000");
        assert_eq!(config.token.as_deref(), Some("s3cret"));
        assert_eq!(config.limits.deadline, Duration::from_millis(250));
        assert_eq!(config.limits.max_events, 4);
    }

    #[test]
    fn empty_env_values_count_as_unset() {
        let config = Config::resolve(
            env(&[(ENV_TOKEN, ""), (ENV_TIMEOUT_MS, " "), (ENV_BASE_URL, "")]),
            Overrides::default(),
        )
        .expect("config");
        assert_eq!(config.token, None);
        assert_eq!(config.limits.deadline, Duration::from_millis(5000));
        assert_eq!(config.base_url, "http://127.0.0.1:7777");
    }

    #[test]
    fn overrides_beat_env() {
        let overrides = Overrides {
            base_url: Some("http://override:1".to_string()),
            token: Some("flag-token".to_string()),
            timeout_ms: Some(50),
            max_events: Some(2),
            filter: StreamFilter {
                account: Some("acme".to_string()),
                ..StreamFilter::default()
            },
            sequential: true,
        };
        let config = Config::resolve(
            env(&[
                (ENV_BASE_URL, "http://env:2"),
                (ENV_TOKEN, "env-token"),
                (ENV_TIMEOUT_MS, "900"),
                (ENV_MAX_EVENTS, "9"),
            ]),
            overrides,
        )
        .expect("config");
        assert_eq!(config.base_url, "http://override:1");
        assert_eq!(config.token.as_deref(), Some("flag-token"));
        assert_eq!(config.limits.deadline, Duration::from_millis(50));
        assert_eq!(config.limits.max_events, 2);
        assert_eq!(config.filter.account.as_deref(), Some("acme"));
        assert_eq!(config.mode, RunMode::Sequential);
    }

    #[test]
    fn invalid_numbers_are_usage_errors() {
        let err = Config::resolve(env(&[(ENV_TIMEOUT_MS, "soon")]), Overrides::default())
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = Config::resolve(env(&[(ENV_MAX_EVENTS, "0")]), Overrides::default())
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let overrides = Overrides {
            timeout_ms: Some(0),
            ..Overrides::default()
        };
        let err = Config::resolve(env(&[]), overrides).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn client_rejects_bad_base_url() {
        let config = Config::resolve(env(&[(ENV_BASE_URL, "ftp://ds")]), Overrides::default())
            .expect("config");
        let err = config.client().err().expect("usage error");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
