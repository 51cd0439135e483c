//! Phone lookup against the BatchData skip-trace API.
//!
//! Each [`Environment`] has its own endpoint and bearer credential. A missing
//! credential is not an error: the lookup reports [`LookupOutcome::Unavailable`]
//! and no request is sent, so nothing is billed.

use std::time::Duration;

use async_trait::async_trait;
use docketrace_address::NormalizedAddress;
use docketrace_shared::{DocketError, Environment, LookupConfig, Result};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

/// User-Agent string for lookup requests.
const USER_AGENT: &str = concat!("docketrace/", env!("CARGO_PKG_VERSION"));

/// Longest response excerpt carried in an error message.
const ERROR_BODY_EXCERPT: usize = 200;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Result of one lookup attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The service answered. Counts as one billable lookup.
    Completed {
        phones: Vec<String>,
        raw_response: String,
    },
    /// Nothing billable happened: no credential is configured, or the
    /// service rejected it.
    Unavailable { reason: String },
}

/// Finds phone numbers associated with a property address.
#[async_trait]
pub trait PhoneLookup: Send + Sync {
    async fn lookup_phones(
        &self,
        environment: Environment,
        address: &NormalizedAddress,
    ) -> Result<LookupOutcome>;
}

// ---------------------------------------------------------------------------
// BatchDataClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Endpoint {
    url: String,
    token: Option<String>,
    token_env: String,
}

/// HTTP client for the skip-trace endpoint.
#[derive(Debug, Clone)]
pub struct BatchDataClient {
    client: Client,
    sandbox: Endpoint,
    production: Endpoint,
    default_state: String,
}

impl BatchDataClient {
    /// Build a client, reading credentials from the configured env vars.
    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        Self::with_tokens(
            config,
            config.token(Environment::Sandbox),
            config.token(Environment::Production),
        )
    }

    /// Build a client with explicit credentials.
    pub fn with_tokens(
        config: &LookupConfig,
        sandbox_token: Option<String>,
        production_token: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocketError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            sandbox: Endpoint {
                url: config.sandbox_url.clone(),
                token: sandbox_token,
                token_env: config.sandbox_token_env.clone(),
            },
            production: Endpoint {
                url: config.production_url.clone(),
                token: production_token,
                token_env: config.production_token_env.clone(),
            },
            default_state: config.default_state.clone(),
        })
    }

    fn endpoint(&self, environment: Environment) -> &Endpoint {
        match environment {
            Environment::Sandbox => &self.sandbox,
            Environment::Production => &self.production,
        }
    }
}

#[async_trait]
impl PhoneLookup for BatchDataClient {
    #[instrument(skip_all, fields(environment = %environment, street = %address.street))]
    async fn lookup_phones(
        &self,
        environment: Environment,
        address: &NormalizedAddress,
    ) -> Result<LookupOutcome> {
        let endpoint = self.endpoint(environment);
        let Some(token) = endpoint.token.as_deref() else {
            warn!(env_var = %endpoint.token_env, "no lookup credential configured, skipping");
            return Ok(LookupOutcome::Unavailable {
                reason: format!("{} is not set", endpoint.token_env),
            });
        };

        let address = address.clone().with_default_state(&self.default_state);
        let payload = json!({
            "requests": [{
                "propertyAddress": {
                    "street": address.street,
                    "city": address.city,
                    "state": address.state,
                    "zip": address.postal_code,
                }
            }]
        });

        let response = self
            .client
            .post(&endpoint.url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DocketError::Network(format!("{}: {e}", endpoint.url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DocketError::Network(format!("{}: failed to read body: {e}", endpoint.url)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, env_var = %endpoint.token_env, "lookup credential rejected, skipping");
            return Ok(LookupOutcome::Unavailable {
                reason: format!("credential in {} rejected (HTTP {status})", endpoint.token_env),
            });
        }
        if !status.is_success() {
            let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(DocketError::Lookup(format!("HTTP {status}: {excerpt}")));
        }

        let phones = match serde_json::from_str::<Value>(&body) {
            Ok(value) => extract_phone_numbers(&value),
            Err(e) => {
                warn!(error = %e, "lookup response is not JSON, treating as no matches");
                Vec::new()
            }
        };
        debug!(phones = phones.len(), "lookup completed");

        Ok(LookupOutcome::Completed {
            phones,
            raw_response: body,
        })
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Pull phone numbers out of any of the response shapes the service uses.
///
/// Accepted shapes, tried in order:
/// - `{"responses": [{"results": {"persons": [{"phoneNumbers": [...]}]}}]}`
/// - `{"results": {"persons": [...]}}`
/// - `{"phoneNumbers": ["...", {"number": "..."}]}`
/// - `["...", "..."]`
///
/// Duplicates are dropped, first occurrence wins.
pub fn extract_phone_numbers(response: &Value) -> Vec<String> {
    let mut phones = Vec::new();

    if let Some(responses) = response.get("responses").and_then(Value::as_array) {
        for item in responses {
            if let Some(results) = item.get("results") {
                collect_persons(results, &mut phones);
            }
        }
    } else if let Some(results) = response.get("results") {
        collect_persons(results, &mut phones);
    } else if let Some(numbers) = response.get("phoneNumbers").and_then(Value::as_array) {
        collect_numbers(numbers, &mut phones);
    } else if let Some(list) = response.as_array() {
        phones.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
    }

    let mut seen = std::collections::HashSet::new();
    phones.retain(|p| !p.trim().is_empty() && seen.insert(p.clone()));
    phones
}

fn collect_persons(results: &Value, out: &mut Vec<String>) {
    let Some(persons) = results.get("persons").and_then(Value::as_array) else {
        return;
    };
    for person in persons {
        if let Some(numbers) = person.get("phoneNumbers").and_then(Value::as_array) {
            collect_numbers(numbers, out);
        }
    }
}

fn collect_numbers(numbers: &[Value], out: &mut Vec<String>) {
    for entry in numbers {
        let number = entry
            .as_str()
            .or_else(|| entry.get("number").and_then(Value::as_str));
        if let Some(n) = number {
            out.push(n.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address() -> NormalizedAddress {
        docketrace_address::normalize("123 Main St, Hartford 06103", "Hartford")
    }

    fn client_for(server: &MockServer, token: Option<&str>) -> BatchDataClient {
        let config = LookupConfig {
            sandbox_url: format!("{}/sandbox/skip-trace", server.uri()),
            production_url: format!("{}/v1/skip-trace", server.uri()),
            timeout_secs: 5,
            ..LookupConfig::default()
        };
        BatchDataClient::with_tokens(&config, token.map(String::from), token.map(String::from))
            .unwrap()
    }

    #[test]
    fn parses_batch_shape() {
        let v = json!({"responses": [
            {"results": {"persons": [
                {"phoneNumbers": [{"number": "860-555-0001"}, {"number": "203-555-0002"}]},
                {"phoneNumbers": [{"type": "x"}]}
            ]}},
            {"results": {"persons": [{"phoneNumbers": [{"number": "860-555-0001"}]}]}}
        ]});
        assert_eq!(extract_phone_numbers(&v), vec!["860-555-0001", "203-555-0002"]);
    }

    #[test]
    fn parses_single_shape() {
        let v = json!({"results": {"persons": [{"phoneNumbers": [{"number": "555-0100"}]}]}});
        assert_eq!(extract_phone_numbers(&v), vec!["555-0100"]);
    }

    #[test]
    fn parses_flat_and_list_shapes() {
        let v = json!({"phoneNumbers": ["555-0100", {"number": "555-0101"}, 7]});
        assert_eq!(extract_phone_numbers(&v), vec!["555-0100", "555-0101"]);

        let v = json!(["555-0102", null, "555-0103"]);
        assert_eq!(extract_phone_numbers(&v), vec!["555-0102", "555-0103"]);

        assert!(extract_phone_numbers(&json!({"status": "ok"})).is_empty());
    }

    #[tokio::test]
    async fn sends_structured_address_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/skip-trace"))
            .and(header("authorization", "Bearer prod-token"))
            .and(body_partial_json(json!({"requests": [{"propertyAddress": {
                "street": "123 Main St", "city": "Hartford", "state": "CT", "zip": "06103"
            }}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"persons": [{"phoneNumbers": [{"number": "860-555-0001"}]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("prod-token"));
        let outcome = client
            .lookup_phones(Environment::Production, &address())
            .await
            .unwrap();

        match outcome {
            LookupOutcome::Completed { phones, raw_response } => {
                assert_eq!(phones, vec!["860-555-0001"]);
                assert!(raw_response.contains("persons"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_credential_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let outcome = client
            .lookup_phones(Environment::Sandbox, &address())
            .await
            .unwrap();
        assert!(matches!(outcome, LookupOutcome::Unavailable { .. }));
    }

    #[tokio::test]
    async fn rejected_credential_is_unavailable() {
        for code in [401, 403] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(code).set_body_string("invalid token"))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, Some("bad"));
            let outcome = client
                .lookup_phones(Environment::Sandbox, &address())
                .await
                .unwrap();
            assert!(
                matches!(outcome, LookupOutcome::Unavailable { ref reason } if reason.contains("rejected")),
                "HTTP {code}: {outcome:?}"
            );
        }
    }

    #[tokio::test]
    async fn server_failure_is_lookup_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("t"));
        let err = client
            .lookup_phones(Environment::Sandbox, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, DocketError::Lookup(ref m) if m.contains("upstream down")));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let config = LookupConfig {
            sandbox_url: format!("{}/sandbox/skip-trace", server.uri()),
            timeout_secs: 1,
            ..LookupConfig::default()
        };
        let client = BatchDataClient::with_tokens(&config, Some("t".into()), None).unwrap();

        let started = std::time::Instant::now();
        let err = client
            .lookup_phones(Environment::Sandbox, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, DocketError::Network(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_json_body_completes_without_phones() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>mock</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("t"));
        let outcome = client
            .lookup_phones(Environment::Sandbox, &address())
            .await
            .unwrap();
        assert!(matches!(outcome, LookupOutcome::Completed { ref phones, .. } if phones.is_empty()));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let config = LookupConfig {
            sandbox_url: "http://127.0.0.1:9/skip-trace".into(),
            timeout_secs: 2,
            ..LookupConfig::default()
        };
        let client = BatchDataClient::with_tokens(&config, Some("t".into()), None).unwrap();
        let err = client
            .lookup_phones(Environment::Sandbox, &address())
            .await
            .unwrap_err();
        assert!(matches!(err, DocketError::Network(_)));
    }
}
