use std::{future::Future, time::Duration};

use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    config::TelegramConfig, error::AppError, models::events::ResultRow, upstream::ensure_success,
};

const SERVICE: &str = "telegram";
const TELEGRAM_API: &str = "https://api.telegram.org";
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// Sends FIM alerts to a Telegram chat.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: Client,
    endpoint: String,
    chat_id: String,
    attempts: u32,
}

impl Notifier {
    pub fn new(http: Client, telegram: &TelegramConfig, attempts: u32) -> Self {
        Self {
            http,
            endpoint: format!("{TELEGRAM_API}/bot{}/sendMessage", telegram.token),
            chat_id: telegram.chat_id.clone(),
            attempts,
        }
    }

    pub async fn send_alert(&self, row: &ResultRow) -> Result<(), AppError> {
        let text = alert_message(row);
        retry_with_backoff(self.attempts, || self.post(&text)).await?;
        info!(id = ?row.id, level = ?row.level(), "alert sent");
        Ok(())
    }

    async fn post(&self, text: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML"
            }))
            .send()
            .await?;
        ensure_success(SERVICE, response).await?;
        Ok(())
    }
}

pub fn alert_message(row: &ResultRow) -> String {
    let fim = row.fim();
    let field = |value: Option<&String>| {
        value
            .map(String::as_str)
            .map(escape_html)
            .unwrap_or_default()
    };

    [
        "<b>WAZUH ALERT</b>".to_string(),
        "-------------------------".to_string(),
        format!("<b>Agent:</b> {}", escape_html(&row.agent_name)),
        format!("<b>User:</b> {}", field(fim.map(|detail| &detail.username))),
        format!(
            "<b>Path:</b> <code>{}</code>",
            field(fim.and_then(|detail| detail.syscheck_path.as_ref()))
        ),
        format!(
            "<b>Event:</b> {}",
            field(fim.and_then(|detail| detail.syscheck_event.as_ref()))
        ),
        format!("<b>Description:</b> {}", escape_html(&row.rule_description)),
        format!(
            "<b>Payload:</b> <pre>{}</pre>",
            field(fim.and_then(|detail| detail.file_diff.as_ref()))
        ),
        format!("<b>Rule ID:</b> {}", escape_html(&row.rule_id_text())),
        format!("<b>Level:</b> {}", escape_html(&row.rule_level_text())),
    ]
    .join("\n")
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Runs `op` up to `attempts` times, doubling the pause between tries.
pub async fn retry_with_backoff<F, Fut, T>(attempts: u32, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut delay = INITIAL_BACKOFF;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => return Err(err),
            Err(err) => {
                warn!(attempt, error = %err, "notification attempt failed");
                debug!(delay_ms = delay.as_millis() as u64, "retrying notification");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
                attempt += 1;
            }
        }
    }
}
