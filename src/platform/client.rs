use crate::config::types::{PlatformSettings, RetrySettings};
use crate::platform::repair::decode_with_repair;
use crate::platform::traits::{MeasurementSpec, ProbePlatform};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("platform returned error status {status}: {message}")]
    PlatformStatus { status: u16, message: String },

    #[error("no usable payload after {attempts} attempts")]
    ExhaustedRetries { attempts: usize },

    #[error("payload could not be decoded, even after boundary repair")]
    MalformedResponse,
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// A payload is "empty" when the platform accepted the request but has no
/// results to report yet. Distinct from a transport failure.
fn payload_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Poll an operation until it yields a non-empty payload.
///
/// Empty payloads and transport errors both count as one attempt; hitting the
/// attempt bound yields `ExhaustedRetries`, which is reported rather than
/// returning an ambiguous empty result.
pub async fn poll_until_ready<F, Fut>(mut fetch: F, retry: &RetrySettings) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let mut attempts = 0usize;

    loop {
        attempts += 1;

        match fetch().await {
            Ok(payload) if !payload_is_empty(&payload) => return Ok(payload),
            Ok(_) => {
                tracing::debug!(attempt = attempts, "Empty payload, results not ready");
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempts,
                    error = %e,
                    "Platform request failed, will retry"
                );
            }
        }

        if attempts >= retry.max_attempts {
            tracing::error!(attempts, "Retry bound reached without a usable payload");
            return Err(PlatformError::ExhaustedRetries { attempts });
        }

        tokio::time::sleep(retry.interval).await;
    }
}

/// HTTP client for the measurement platform API.
#[derive(Debug)]
pub struct AtlasClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
    retry: RetrySettings,
}

impl AtlasClient {
    pub fn new(settings: &PlatformSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            key: settings.credentials.key.clone(),
            retry: settings.retry.clone(),
        })
    }

    fn results_by_id_url(&self, id: u64) -> String {
        format!("{}/measurements/{}/results/", self.base_url, id)
    }

    fn results_by_tag_url(&self, tag: &str) -> String {
        format!("{}/measurements/tags/{}/results/", self.base_url, tag)
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .query(&[("key", self.key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlatformError::PlatformStatus {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProbePlatform for AtlasClient {
    async fn submit(&self, spec: &MeasurementSpec) -> Result<Vec<u64>> {
        let url = format!("{}/measurements/", self.base_url);
        let request_body = SubmitRequest::from_spec(spec);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.key.as_str())])
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlatformError::PlatformStatus {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let submitted: SubmitResponse = response.json().await?;
        Ok(submitted.measurements)
    }

    async fn results_by_id(&self, id: u64) -> Result<Value> {
        let url = self.results_by_id_url(id);
        poll_until_ready(|| self.get_json(&url), &self.retry).await
    }

    async fn results_by_tag(&self, tag: &str) -> Result<Value> {
        let url = self.results_by_tag_url(tag);
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlatformError::PlatformStatus {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        // Tag-aggregated payloads may arrive as concatenated JSON objects.
        let body = response.text().await?;
        decode_with_repair(&body)
    }
}

// ===== Wire types =====

#[derive(Debug, Serialize)]
struct SubmitRequest {
    definitions: Vec<Definition>,
    probes: Vec<ProbeSelector>,
}

#[derive(Debug, Serialize)]
struct Definition {
    target: String,
    description: String,
    #[serde(rename = "type")]
    kind: String,
    af: u8,
    packets: u32,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProbeSelector {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    requested: usize,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    measurements: Vec<u64>,
}

impl SubmitRequest {
    fn from_spec(spec: &MeasurementSpec) -> Self {
        let probe_list = spec
            .probe_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        Self {
            definitions: vec![Definition {
                target: spec.target.clone(),
                description: format!("geoprobe ping toward {}", spec.target),
                kind: "ping".to_string(),
                af: spec.address_family,
                packets: spec.packets,
                tags: vec![spec.tag.clone()],
            }],
            probes: vec![ProbeSelector {
                kind: "probes".to_string(),
                value: probe_list,
                requested: spec.probe_ids.len(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Credentials;
    use serde_json::json;
    use std::cell::Cell;
    use std::time::Duration;

    fn quick_retry(max_attempts: usize) -> RetrySettings {
        RetrySettings {
            max_attempts,
            interval: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_on_last_allowed_attempt() {
        let calls = Cell::new(0usize);
        let fetch = || {
            let attempt = calls.get() + 1;
            calls.set(attempt);
            async move {
                if attempt >= 60 {
                    Ok(json!([{"rtt": 1.0}]))
                } else {
                    Ok(json!([]))
                }
            }
        };

        let payload = poll_until_ready(fetch, &quick_retry(60)).await.unwrap();
        assert_eq!(calls.get(), 60);
        assert!(!payload.as_array().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhausts_after_sixty_empty_responses() {
        let calls = Cell::new(0usize);
        let fetch = || {
            calls.set(calls.get() + 1);
            async { Ok(json!([])) }
        };

        let err = poll_until_ready(fetch, &quick_retry(60)).await.unwrap_err();
        assert_eq!(calls.get(), 60);
        match err {
            PlatformError::ExhaustedRetries { attempts } => assert_eq!(attempts, 60),
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_retries_through_transport_errors() {
        let calls = Cell::new(0usize);
        let fetch = || {
            let attempt = calls.get() + 1;
            calls.set(attempt);
            async move {
                if attempt < 3 {
                    Err(PlatformError::PlatformStatus {
                        status: 503,
                        message: "overloaded".to_string(),
                    })
                } else {
                    Ok(json!([{"rtt": 4.2}]))
                }
            }
        };

        let payload = poll_until_ready(fetch, &quick_retry(5)).await.unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(payload[0]["rtt"], json!(4.2));
    }

    #[test]
    fn test_payload_emptiness() {
        assert!(payload_is_empty(&json!(null)));
        assert!(payload_is_empty(&json!([])));
        assert!(payload_is_empty(&json!({})));
        assert!(!payload_is_empty(&json!([{"rtt": 0.0}])));
        assert!(!payload_is_empty(&json!(0)));
    }

    #[test]
    fn test_client_builds_platform_urls() {
        let settings = PlatformSettings {
            base_url: "https://atlas.ripe.net/api/v2/".to_string(),
            credentials: Credentials {
                username: "someone@example.org".to_string(),
                key: "k".to_string(),
            },
            request_timeout: Duration::from_secs(20),
            retry: RetrySettings::default(),
        };

        let client = AtlasClient::new(&settings).unwrap();
        assert_eq!(
            client.results_by_id_url(42),
            "https://atlas.ripe.net/api/v2/measurements/42/results/"
        );
        assert_eq!(
            client.results_by_tag_url("abc"),
            "https://atlas.ripe.net/api/v2/measurements/tags/abc/results/"
        );
    }

    #[tokio::test]
    async fn test_results_by_tag_repairs_concatenated_payload() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // One-shot server answering the tag GET with two result objects
        // joined without a separator, as the platform emits them.
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 2048];
            let n = socket.read(&mut request).await.unwrap();
            let request = String::from_utf8_lossy(&request[..n]).to_string();

            let body = r#"{"dst_addr":"1.2.3.4","from":"5.6.7.8","result":[{"rtt":9.0}]}{"dst_addr":"9.9.9.9","from":"5.6.7.8","result":[{"rtt":3.0}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        let settings = PlatformSettings {
            base_url: format!("http://{}", addr),
            credentials: Credentials {
                username: "someone@example.org".to_string(),
                key: "secret-key".to_string(),
            },
            request_timeout: Duration::from_secs(5),
            retry: RetrySettings::default(),
        };
        let client = AtlasClient::new(&settings).unwrap();

        let platform: &dyn ProbePlatform = &client;
        let payload = platform.results_by_tag("campaign-1").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /measurements/tags/campaign-1/results/"));
        assert!(request.contains("key=secret-key"));

        let entries = payload.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["dst_addr"], json!("1.2.3.4"));
        assert_eq!(entries[1]["dst_addr"], json!("9.9.9.9"));
    }

    #[test]
    fn test_submit_request_shape() {
        let spec = MeasurementSpec {
            target: "1.2.3.4".to_string(),
            address_family: 4,
            packets: 3,
            tag: "campaign-1".to_string(),
            probe_ids: vec![10, 11],
        };

        let body = serde_json::to_value(SubmitRequest::from_spec(&spec)).unwrap();
        assert_eq!(body["definitions"][0]["target"], json!("1.2.3.4"));
        assert_eq!(body["definitions"][0]["type"], json!("ping"));
        assert_eq!(body["definitions"][0]["packets"], json!(3));
        assert_eq!(body["definitions"][0]["tags"], json!(["campaign-1"]));
        assert_eq!(body["probes"][0]["value"], json!("10,11"));
        assert_eq!(body["probes"][0]["requested"], json!(2));
    }
}
