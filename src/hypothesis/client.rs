use rand::Rng;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{AnnotationSource, SearchQuery};
use crate::config::Hypothesis;
use crate::error::SourceError;
use crate::model::{RawGroup, SearchPage};

pub struct HypothesisClient {
    client: reqwest::Client,
    api_url: String,
    user: String,
    token: String,
    page_limit: u32,
    max_retries: u32,
    retry_delay_secs: (u64, u64),
}

impl HypothesisClient {
    pub fn new(cfg: &Hypothesis) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            user: cfg.user.clone(),
            token: cfg.token.clone(),
            page_limit: cfg.page_limit,
            max_retries: cfg.max_retries,
            retry_delay_secs: (cfg.retry_min_delay_secs, cfg.retry_max_delay_secs),
        })
    }

    fn search_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", query.limit.unwrap_or(self.page_limit).to_string()),
            ("sort", "updated".to_string()),
            ("order", "asc".to_string()),
            ("user", self.user.clone()),
        ];
        if let Some(after) = &query.search_after {
            params.push(("search_after", after.clone()));
        }
        if let Some(uri) = &query.uri {
            params.push(("url", uri.clone()));
        }
        params
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.api_url, endpoint);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header("Content-Type", "application/json;charset=utf-8")
                .query(params)
                .send()
                .await;

            let retry_reason: Box<dyn std::error::Error + Send + Sync> = match result {
                Ok(response) if is_retryable(response.status()) => {
                    format!("{} returned {}", endpoint, response.status()).into()
                }
                Ok(response) if !response.status().is_success() => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(SourceError::Status {
                        endpoint: endpoint.to_string(),
                        status,
                        body,
                    });
                }
                Ok(response) => match response.bytes().await {
                    Ok(bytes) => {
                        return serde_json::from_slice(&bytes).map_err(|source| {
                            SourceError::Decode {
                                endpoint: endpoint.to_string(),
                                source,
                            }
                        });
                    }
                    Err(e) => Box::new(e),
                },
                Err(e) => Box::new(e),
            };

            if attempt >= self.max_retries {
                tracing::error!("{} failed after {} attempts", endpoint, attempt);
                return Err(SourceError::RetriesExhausted {
                    endpoint: endpoint.to_string(),
                    attempts: attempt,
                    last: retry_reason,
                });
            }

            let (min, max) = self.retry_delay_secs;
            let delay = rand::thread_rng().gen_range(min..=max);
            tracing::warn!(
                attempt,
                delay_secs = delay,
                "retrying {}: {}",
                endpoint,
                retry_reason
            );
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
    }
}

/// Server errors and rate limiting clear up on their own.
fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

impl AnnotationSource for HypothesisClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SourceError> {
        let params = self.search_params(query);
        self.get_json("search", &params).await
    }

    async fn list_groups(&self) -> Result<Vec<RawGroup>, SourceError> {
        self.get_json("groups", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Hypothesis {
        Hypothesis {
            user: "acct:reader@hypothes.is".to_string(),
            token: "secret".to_string(),
            api_url: "https://api.hypothes.is/api/".to_string(),
            page_limit: 200,
            max_retries: 3,
            retry_min_delay_secs: 0,
            retry_max_delay_secs: 0,
            request_timeout_secs: 1,
        }
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_full_scan_params() {
        let client = HypothesisClient::new(&settings()).unwrap();
        let params = client.search_params(&SearchQuery::all());
        assert_eq!(param(&params, "limit"), Some("200"));
        assert_eq!(param(&params, "sort"), Some("updated"));
        assert_eq!(param(&params, "order"), Some("asc"));
        assert_eq!(param(&params, "user"), Some("acct:reader@hypothes.is"));
        assert_eq!(param(&params, "search_after"), None);
        assert_eq!(param(&params, "url"), None);
    }

    #[test]
    fn test_probe_params() {
        let client = HypothesisClient::new(&settings()).unwrap();
        let query = SearchQuery::for_uri("https://example.com")
            .after(Some("2024-01-01T00:00:00+00:00"))
            .limit(1);
        let params = client.search_params(&query);
        assert_eq!(param(&params, "limit"), Some("1"));
        assert_eq!(param(&params, "url"), Some("https://example.com"));
        assert_eq!(
            param(&params, "search_after"),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_retried() {
        use reqwest::StatusCode;
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        let mut cfg = settings();
        // Discard port, nothing listens on it.
        cfg.api_url = "http://127.0.0.1:9".to_string();
        let client = HypothesisClient::new(&cfg).unwrap();

        match client.list_groups().await {
            Err(SourceError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {:?}", other.map(|g| g.len())),
        }
    }
}
