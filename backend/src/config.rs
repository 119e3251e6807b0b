use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub log_dir: PathBuf,
    pub reset_db: bool,
    pub indexer: UpstreamConfig,
    pub index_pattern: String,
    pub wazuh_api: UpstreamConfig,
    pub upstream_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub telegram: Option<TelegramConfig>,
    pub alert_min_level: i64,
    pub notify_attempts: u32,
    pub debug_query: bool,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = parse_var("SERVER_PORT", "3000")?;

        let database_url = required_var("DATABASE_URL")?;

        let log_dir =
            PathBuf::from(env::var("SENTRY_LOG_DIR").unwrap_or_else(|_| "../log".into()));

        let reset_db: bool = parse_var("RESET_DB", "false")?;

        let indexer = UpstreamConfig {
            url: trim_url(required_var("INDEXER_URL")?),
            username: env::var("INDEXER_USER").unwrap_or_else(|_| "admin".into()),
            password: env::var("INDEXER_PASS").unwrap_or_default(),
        };
        let index_pattern = env::var("INDEX_PATTERN").unwrap_or_else(|_| "wazuh-alerts-*".into());

        let wazuh_api = UpstreamConfig {
            url: trim_url(required_var("WAZUH_API_URL")?),
            username: env::var("WAZUH_USER").unwrap_or_else(|_| "wazuh".into()),
            password: env::var("WAZUH_PASS").unwrap_or_default(),
        };

        let timeout_secs: u64 = parse_var("UPSTREAM_TIMEOUT_SECS", "15")?;
        let accept_invalid_certs: bool = parse_var("UPSTREAM_ACCEPT_INVALID_CERTS", "true")?;

        let telegram = match (env::var("TELEGRAM_TOKEN"), env::var("TELEGRAM_CHAT_ID")) {
            (Ok(token), Ok(chat_id)) if !token.trim().is_empty() && !chat_id.trim().is_empty() => {
                Some(TelegramConfig {
                    token: token.trim().to_string(),
                    chat_id: chat_id.trim().to_string(),
                })
            }
            _ => None,
        };

        let alert_min_level: i64 = parse_var("ALERT_MIN_LEVEL", "1")?;
        let notify_attempts: u32 = parse_var("NOTIFY_ATTEMPTS", "3")?;
        if notify_attempts == 0 {
            return Err(AppError::Config("NOTIFY_ATTEMPTS must be at least 1".into()));
        }
        let debug_query: bool = parse_var("SENTRY_DEBUG_QUERY", "false")?;

        Ok(Self {
            host,
            port,
            database_url,
            log_dir,
            reset_db,
            indexer,
            index_pattern,
            wazuh_api,
            upstream_timeout: Duration::from_secs(timeout_secs),
            accept_invalid_certs,
            telegram,
            alert_min_level,
            notify_attempts,
            debug_query,
        })
    }
}

fn required_var(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("missing {key}")))
}

fn parse_var<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env::var(key)
        .unwrap_or_else(|_| default.into())
        .trim()
        .parse()
        .map_err(|err| AppError::Config(format!("invalid {key}: {err}")))
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_dropped() {
        assert_eq!(
            trim_url(" https://10.0.0.5:9200/ ".into()),
            "https://10.0.0.5:9200"
        );
    }

    #[test]
    fn defaults_apply_to_unset_keys() {
        let port: u16 = parse_var("SENTRY_TEST_UNSET_PORT", "3000").unwrap();
        assert_eq!(port, 3000);
        let err = parse_var::<u16>("SENTRY_TEST_UNSET_BAD", "nope").unwrap_err();
        assert!(matches!(err, AppError::Config(message) if message.contains("SENTRY_TEST_UNSET_BAD")));
    }
}
