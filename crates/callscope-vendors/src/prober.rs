//! Endpoint/auth prober
//!
//! Ringba accounts do not reliably expose the same endpoint shape and
//! authentication header combination, so connection setup walks a fixed
//! ordered list of (endpoint, auth style) combinations and accepts the
//! first one that returns HTTP 2xx.
//!
//! This is a one-shot discovery procedure for setup time, not a hot path:
//! strictly sequential, no backoff, bounded by an explicit attempt budget.
//! On exhaustion the full attempt list is returned for operator debugging.

use crate::client::VendorError;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Authentication header style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `X-API-Key: <key>`
    XApiKey,
    /// `api-key: <key>`
    ApiKeyHeader,
}

impl AuthStyle {
    /// All styles, in trial order
    pub const ALL: [AuthStyle; 3] = [Self::Bearer, Self::XApiKey, Self::ApiKeyHeader];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::XApiKey => "x_api_key",
            Self::ApiKeyHeader => "api_key_header",
        }
    }

    /// Attach this style's header to a request
    pub fn apply(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        match self {
            Self::Bearer => request.header("Authorization", format!("Bearer {}", api_key)),
            Self::XApiKey => request.header("X-API-Key", api_key.to_string()),
            Self::ApiKeyHeader => request.header("api-key", api_key.to_string()),
        }
    }
}

/// A working (endpoint, auth style) combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeTarget {
    pub url: String,
    pub auth: AuthStyle,
}

/// One attempted combination with its outcome
#[derive(Debug, Clone, Serialize)]
pub struct ProbeAttempt {
    pub url: String,
    pub auth: AuthStyle,
    /// HTTP status when a response came back at all
    pub status: Option<u16>,
    /// Transport error when it did not
    pub error: Option<String>,
}

/// Full probe outcome
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub success: bool,
    pub working: Option<ProbeTarget>,
    pub attempts: Vec<ProbeAttempt>,
}

impl ProbeReport {
    /// The working target, or the tagged exhaustion error
    pub fn into_target(self) -> Result<ProbeTarget, VendorError> {
        match self.working {
            Some(target) => Ok(target),
            None => Err(VendorError::ProbeExhausted {
                attempts: self.attempts.len(),
            }),
        }
    }
}

/// Walk endpoint × auth combinations until one answers 2xx
///
/// Combinations are tried in deterministic order (endpoints outer, auth
/// styles inner); no combination is tried twice, and the walk stops at
/// `budget` attempts even if combinations remain.
pub async fn probe_endpoints(
    http_client: &Client,
    endpoints: &[String],
    api_key: &str,
    budget: usize,
) -> ProbeReport {
    let mut attempts = Vec::new();

    for url in endpoints {
        for auth in AuthStyle::ALL {
            if attempts.len() >= budget {
                warn!(
                    "Probe attempt budget ({}) exhausted with combinations remaining",
                    budget
                );
                return ProbeReport {
                    success: false,
                    working: None,
                    attempts,
                };
            }

            debug!("Probing {} with {}", url, auth.as_str());
            let request = auth.apply(http_client.get(url), api_key);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    attempts.push(ProbeAttempt {
                        url: url.clone(),
                        auth,
                        status: Some(status.as_u16()),
                        error: None,
                    });

                    if status.is_success() {
                        info!("Probe succeeded: {} with {}", url, auth.as_str());
                        return ProbeReport {
                            success: true,
                            working: Some(ProbeTarget {
                                url: url.clone(),
                                auth,
                            }),
                            attempts,
                        };
                    }
                }
                Err(e) => {
                    attempts.push(ProbeAttempt {
                        url: url.clone(),
                        auth,
                        status: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
    }

    warn!(
        "Probe exhausted all {} combinations without a 2xx",
        attempts.len()
    );
    ProbeReport {
        success: false,
        working: None,
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_styles_are_distinct() {
        let names: Vec<&str> = AuthStyle::ALL.iter().map(|a| a.as_str()).collect();
        assert_eq!(names, vec!["bearer", "x_api_key", "api_key_header"]);
    }

    #[test]
    fn test_exhausted_report_into_target() {
        let report = ProbeReport {
            success: false,
            working: None,
            attempts: vec![ProbeAttempt {
                url: "https://example.com".to_string(),
                auth: AuthStyle::Bearer,
                status: Some(403),
                error: None,
            }],
        };
        assert!(matches!(
            report.into_target(),
            Err(VendorError::ProbeExhausted { attempts: 1 })
        ));
    }

    #[tokio::test]
    async fn test_probe_against_unroutable_endpoints_records_every_attempt() {
        // Connection errors (not just non-2xx statuses) must still be
        // recorded once per combination, in order, with no repeats.
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let endpoints = vec![
            "http://127.0.0.1:1/v2/acct/calllogs".to_string(),
            "http://127.0.0.1:1/v2/acct/calls".to_string(),
        ];

        let report = probe_endpoints(&client, &endpoints, "key", 16).await;

        assert!(!report.success);
        assert!(report.working.is_none());
        assert_eq!(report.attempts.len(), endpoints.len() * AuthStyle::ALL.len());
        let mut seen = std::collections::HashSet::new();
        for attempt in &report.attempts {
            assert!(attempt.error.is_some());
            assert!(seen.insert((attempt.url.clone(), attempt.auth.as_str())));
        }
    }

    #[tokio::test]
    async fn test_probe_respects_attempt_budget() {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(200))
            .build()
            .unwrap();
        let endpoints = vec![
            "http://127.0.0.1:1/a".to_string(),
            "http://127.0.0.1:1/b".to_string(),
        ];

        let report = probe_endpoints(&client, &endpoints, "key", 4).await;

        assert!(!report.success);
        assert_eq!(report.attempts.len(), 4);
    }
}
