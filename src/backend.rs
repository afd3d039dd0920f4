use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Months, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::dataset::{Dataset, ProfileRecord};
use crate::domain::{RequestSpec, Wmo};
use crate::error::ArgoError;
use crate::uri::{self, BackendParams};

/// Capabilities one data source must provide; the engine itself is
/// backend-agnostic and only talks through this.
pub trait DataBackend: Send + Sync {
    fn params(&self) -> &BackendParams;

    /// Longest time span the remote service accepts per request.
    fn max_time_span(&self) -> Months;

    fn fetch(&self, uri: &str) -> Result<Vec<u8>, ArgoError>;

    fn decode(&self, uri: &str, payload: &[u8]) -> Result<Dataset, ArgoError>;

    fn uri(&self, chunk: &RequestSpec) -> String {
        uri::build(chunk, self.params())
    }
}

#[derive(Clone)]
pub struct ArgovisBackend {
    client: Client,
    params: BackendParams,
}

impl ArgovisBackend {
    pub fn new() -> Result<Self, ArgoError> {
        Self::with_params(BackendParams::default())
    }

    pub fn with_params(params: BackendParams) -> Result<Self, ArgoError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("argofetch/{}", env!("CARGO_PKG_VERSION"))).map_err(
                |err| ArgoError::RemoteHttp {
                    uri: params.base_url.clone(),
                    message: err.to_string(),
                },
            )?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| ArgoError::RemoteHttp {
                uri: params.base_url.clone(),
                message: err.to_string(),
            })?;
        Ok(Self { client, params })
    }

    fn send_with_retries<F>(
        &self,
        uri: &str,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, ArgoError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(ArgoError::RemoteHttp {
                        uri: uri.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

impl DataBackend for ArgovisBackend {
    fn params(&self) -> &BackendParams {
        &self.params
    }

    fn max_time_span(&self) -> Months {
        Months::new(3)
    }

    fn fetch(&self, uri: &str) -> Result<Vec<u8>, ArgoError> {
        tracing::debug!(uri, "argovis request");
        let started = Instant::now();
        let response = self.send_with_retries(uri, || self.client.get(uri))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "argovis request failed".to_string());
            return Err(ArgoError::RemoteStatus {
                uri: uri.to_string(),
                status,
                message,
            });
        }
        let bytes = response.bytes().map_err(|err| ArgoError::RemoteHttp {
            uri: uri.to_string(),
            message: err.to_string(),
        })?;
        tracing::debug!(
            uri,
            latency_ms = started.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "argovis response"
        );
        Ok(bytes.to_vec())
    }

    fn decode(&self, uri: &str, payload: &[u8]) -> Result<Dataset, ArgoError> {
        let wire: Vec<WireProfile> =
            serde_json::from_slice(payload).map_err(|err| ArgoError::Decode {
                uri: uri.to_string(),
                message: err.to_string(),
            })?;
        let mut variables: Vec<String> = Vec::new();
        let mut profiles = Vec::with_capacity(wire.len());
        for profile in wire {
            if variables.is_empty() {
                variables.clone_from(&profile.variables);
            } else if variables != profile.variables {
                return Err(ArgoError::Decode {
                    uri: uri.to_string(),
                    message: format!(
                        "profiles disagree on variables: [{}] vs [{}]",
                        variables.join(","),
                        profile.variables.join(",")
                    ),
                });
            }
            for row in &profile.levels {
                if row.len() != variables.len() {
                    return Err(ArgoError::Decode {
                        uri: uri.to_string(),
                        message: format!(
                            "level row has {} values for {} variables",
                            row.len(),
                            variables.len()
                        ),
                    });
                }
            }
            let wmo = Wmo::new(profile.platform_number).map_err(|err| ArgoError::Decode {
                uri: uri.to_string(),
                message: err.to_string(),
            })?;
            profiles.push(ProfileRecord {
                wmo,
                cycle: profile.cycle_number,
                lon: profile.lon,
                lat: profile.lat,
                date: profile.date,
                levels: profile.levels,
            });
        }
        Ok(Dataset::new(variables, profiles))
    }
}

#[derive(Debug, Deserialize)]
struct WireProfile {
    platform_number: u32,
    cycle_number: u32,
    lon: f64,
    lat: f64,
    date: DateTime<Utc>,
    #[serde(default)]
    variables: Vec<String>,
    #[serde(default)]
    levels: Vec<Vec<f64>>,
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
