use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::UpstreamConfig,
    error::AppError,
    search::SearchBody,
    upstream::ensure_success,
};

const SERVICE: &str = "indexer";

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hits: Hits,
}

#[derive(Debug, Default, Deserialize)]
pub struct Hits {
    /// Either a number or `{ value, relation }`, depending on the backend.
    #[serde(default)]
    pub total: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hits: Vec<Value>,
}

/// Explicit `null` reads the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Thin client for `<index pattern>/_search` on an OpenSearch-compatible
/// alert indexer.
#[derive(Debug, Clone)]
pub struct IndexerClient {
    http: Client,
    upstream: UpstreamConfig,
    index_pattern: String,
}

impl IndexerClient {
    pub fn new(http: Client, upstream: UpstreamConfig, index_pattern: String) -> Self {
        Self {
            http,
            upstream,
            index_pattern,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.upstream.url, self.index_pattern)
    }

    pub async fn search(&self, body: &SearchBody) -> Result<SearchResponse, AppError> {
        let url = self.search_url();
        debug!(%url, from = body.from, size = body.size, "searching indexer");

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.upstream.username, Some(&self.upstream.password))
            .json(body)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;

        let parsed: SearchResponse = response.json().await?;
        debug!(returned = parsed.hits.hits.len(), "indexer answered");
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn url_joins_base_and_pattern() {
        let client = IndexerClient::new(
            Client::new(),
            UpstreamConfig {
                url: "https://10.0.0.5:9200".into(),
                username: "admin".into(),
                password: "secret".into(),
            },
            "wazuh-alerts-*".into(),
        );
        assert_eq!(client.search_url(), "https://10.0.0.5:9200/wazuh-alerts-*/_search");
    }

    #[test]
    fn partial_responses_deserialize() {
        let empty: SearchResponse = serde_json::from_value(json!({ "took": 3 })).unwrap();
        assert!(empty.hits.hits.is_empty());
        assert!(empty.hits.total.is_none());

        let full: SearchResponse = serde_json::from_value(json!({
            "hits": { "total": { "value": 237, "relation": "gte" }, "hits": [{ "_id": "a" }] }
        }))
        .unwrap();
        assert_eq!(full.hits.hits.len(), 1);
        assert_eq!(full.hits.total, Some(json!({ "value": 237, "relation": "gte" })));
    }

    #[test]
    fn null_hits_read_as_empty() {
        let no_list: SearchResponse = serde_json::from_str(
            r#"{"hits":{"total":{"value":0,"relation":"eq"},"hits":null}}"#,
        )
        .unwrap();
        assert!(no_list.hits.hits.is_empty());
        assert_eq!(no_list.hits.total, Some(json!({ "value": 0, "relation": "eq" })));

        let no_hits: SearchResponse = serde_json::from_str(r#"{"hits":null}"#).unwrap();
        assert!(no_hits.hits.hits.is_empty());
        assert!(no_hits.hits.total.is_none());
    }
}
