use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::{config::UpstreamConfig, error::AppError, upstream::ensure_success};

const SERVICE: &str = "wazuh api";

/// Manager REST API client, used for the FIM inventory of an agent.
#[derive(Debug, Clone)]
pub struct WazuhClient {
    http: Client,
    upstream: UpstreamConfig,
}

impl WazuhClient {
    pub fn new(http: Client, upstream: UpstreamConfig) -> Self {
        Self { http, upstream }
    }

    /// `affected_items` of `GET /syscheck/{agent_id}`, passed through as is.
    pub async fn syscheck(&self, agent_id: &str) -> Result<Value, AppError> {
        let token = self.authenticate().await?;
        let url = format!("{}/syscheck/{agent_id}", self.upstream.url);
        debug!(%url, "fetching syscheck inventory");

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let body: Value = ensure_success(SERVICE, response).await?.json().await?;

        body.pointer("/data/affected_items")
            .cloned()
            .ok_or_else(|| AppError::UnexpectedResponse {
                service: SERVICE,
                detail: "missing data.affected_items".into(),
            })
    }

    async fn authenticate(&self) -> Result<String, AppError> {
        let url = format!("{}/security/user/authenticate", self.upstream.url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.upstream.username, Some(&self.upstream.password))
            .json(&json!({}))
            .send()
            .await?;
        let body: Value = ensure_success(SERVICE, response).await?.json().await?;

        token_from(&body).ok_or_else(|| AppError::UnexpectedResponse {
            service: SERVICE,
            detail: "missing data.token".into(),
        })
    }
}

fn token_from(body: &Value) -> Option<String> {
    body.pointer("/data/token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_data() {
        assert_eq!(
            token_from(&json!({ "data": { "token": "eyJ" }, "error": 0 })),
            Some("eyJ".into())
        );
        assert_eq!(token_from(&json!({ "data": { "token": "" } })), None);
        assert_eq!(token_from(&json!({ "error": 1 })), None);
    }
}
