//! Ultrahuman partner API client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::FetchError;
use crate::types::ApiResponse;

pub const DEFAULT_API_URL: &str = "https://partner.ultrahuman.com/api/v1/partner/daily_metrics";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of daily metric responses
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<ApiResponse, FetchError>;
}

#[async_trait]
impl<T: MetricsSource + ?Sized> MetricsSource for Arc<T> {
    async fn fetch(&self, date: NaiveDate) -> Result<ApiResponse, FetchError> {
        (**self).fetch(date).await
    }
}

/// HTTP client for the `daily_metrics` endpoint
#[derive(Debug, Clone)]
pub struct UltrahumanClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl UltrahumanClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("uh-ring/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            http,
        })
    }
}

#[async_trait]
impl MetricsSource for UltrahumanClient {
    async fn fetch(&self, date: NaiveDate) -> Result<ApiResponse, FetchError> {
        let date = date.format("%Y-%m-%d").to_string();
        tracing::debug!(url = %self.base_url, %date, "fetching daily metrics");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("date", date.as_str())])
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: ApiResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(e) => return Err(FetchError::Json(e)),
        };

        if let Some(message) = parsed.error {
            return Err(FetchError::Api(message));
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, http::StatusCode, routing::get, Router};
    use std::collections::HashMap;

    async fn spawn_api(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/daily_metrics",
            get(
                move |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    let authorized = headers
                        .get("authorization")
                        .is_some_and(|v| v == "secret-token");
                    let dated = params.get("date").map(String::as_str) == Some("2024-01-15");
                    if authorized && dated {
                        (status, body)
                    } else {
                        (StatusCode::IM_A_TEAPOT, "unexpected request")
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/daily_metrics")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_token_and_date() {
        let url = spawn_api(
            StatusCode::OK,
            r#"{"data":{"metrics":{"2024-01-15":[{"type":"hr","object":{}}]},"latest_time_zone":"UTC"},"error":null,"status":200}"#,
        )
        .await;

        let client = UltrahumanClient::new(url, "secret-token").unwrap();
        let response = client.fetch(date()).await.unwrap();
        assert_eq!(response.data.metrics["2024-01-15"].len(), 1);
        assert_eq!(response.data.latest_time_zone, "UTC");
    }

    #[tokio::test]
    async fn test_api_error_field() {
        let url = spawn_api(
            StatusCode::OK,
            r#"{"data":null,"error":"date out of range","status":400}"#,
        )
        .await;

        let client = UltrahumanClient::new(url, "secret-token").unwrap();
        let err = client.fetch(date()).await.unwrap_err();
        assert!(matches!(err, FetchError::Api(ref m) if m == "date out of range"));
    }

    #[tokio::test]
    async fn test_non_json_error_status() {
        let url = spawn_api(StatusCode::BAD_GATEWAY, "upstream unavailable").await;

        let client = UltrahumanClient::new(url, "secret-token").unwrap();
        let err = client.fetch(date()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_garbage_body_is_json_error() {
        let url = spawn_api(StatusCode::OK, "<html>maintenance</html>").await;

        let client = UltrahumanClient::new(url, "secret-token").unwrap();
        let err = client.fetch(date()).await.unwrap_err();
        assert!(matches!(err, FetchError::Json(_)));
    }
}
