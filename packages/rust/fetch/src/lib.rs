//! Bounded-retry fetcher for externally referenced documents.
//!
//! Workflow definitions and non-canonical license texts live at URLs the
//! harvester does not control, so every fetch runs with a short timeout and
//! a fixed number of attempts. A URL that stays unreachable through all
//! attempts surfaces as [`StacshiftError::SourceUnreachable`], which the
//! batch handler treats as permanent — redelivering the message would not
//! make the remote host come back.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use stacshift_shared::{FetchConfig, Result, StacshiftError};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("stacshift/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// HTTP document fetcher with bounded retries.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    attempts: u32,
}

impl Fetcher {
    /// Build a fetcher from the `[fetch]` config section.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                StacshiftError::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            attempts: config.attempts.max(1),
        })
    }

    /// Fetch the document at `url` as text.
    ///
    /// Transport errors and non-2xx statuses are retried up to the
    /// configured attempt count; the final failure is returned as
    /// `SourceUnreachable` with the last underlying cause.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match self.try_fetch(url).await {
                Ok(body) => {
                    debug!(url, attempt, bytes = body.len(), "fetched document");
                    return Ok(body);
                }
                Err(message) => {
                    warn!(url, attempt, error = %message, "fetch attempt failed");
                    last_error = message;
                }
            }
        }

        Err(StacshiftError::SourceUnreachable {
            url: url.to_string(),
            message: last_error,
        })
    }

    async fn try_fetch(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> FetchConfig {
        FetchConfig {
            timeout_secs: 2,
            attempts: 3,
        }
    }

    #[tokio::test]
    async fn fetches_document_body() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/workflow.cwl"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("cwlVersion: v1.0"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let body = fetcher
            .fetch_text(&format!("{}/workflow.cwl", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "cwlVersion: v1.0");
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let server = wiremock::MockServer::start().await;

        // First two attempts see a 503, the third succeeds.
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/flaky"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/flaky"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let body = fetcher
            .fetch_text(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_source_unreachable() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&test_config()).unwrap();
        let err = fetcher
            .fetch_text(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();

        match err {
            StacshiftError::SourceUnreachable { url, message } => {
                assert!(url.ends_with("/gone"));
                assert!(message.contains("500"));
            }
            other => panic!("expected SourceUnreachable, got {other:?}"),
        }
    }
}
