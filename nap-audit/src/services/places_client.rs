//! Google Places API client
//!
//! One audited record costs one Text Search call plus, when a place is found,
//! one Place Details call for the formatted address and phone number.
//! Requests are rate limited client-side; there is no retry and no caching.
//!
//! API Documentation: https://developers.google.com/maps/documentation/places/web-service

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nap_common::config::{LocationBias, LookupConfig};
use serde::Deserialize;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::models::{InputRecord, LookupResult};

const USER_AGENT: &str = concat!("nap-audit/", env!("CARGO_PKG_VERSION"));
const TEXT_SEARCH_PATH: &str = "/maps/api/place/textsearch/json";
const DETAILS_PATH: &str = "/maps/api/place/details/json";
const DETAILS_FIELDS: &str =
    "name,formatted_address,formatted_phone_number,international_phone_number";

/// Places lookup errors
///
/// Always recovered per record: the affected row is reported as an error and
/// the batch continues.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {0}: {1}")]
    Http(u16, String),

    #[error("Places API status {status}: {message}")]
    Api { status: String, message: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

/// What to search for
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub name: String,
    /// Appended to the search text when present
    pub address_hint: Option<String>,
    pub bias: Option<LocationBias>,
}

impl SearchQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address_hint: None,
            bias: None,
        }
    }

    /// Build the query for an input record under `config`
    pub fn for_record(record: &InputRecord, config: &LookupConfig) -> Self {
        let address_hint = (config.include_address_in_query && !record.address.is_empty())
            .then(|| record.address.clone());

        Self {
            name: record.name.clone(),
            address_hint,
            bias: config.location_bias,
        }
    }

    /// Free-text query sent to Text Search
    pub fn text(&self) -> String {
        match &self.address_hint {
            Some(address) => format!("{} {}", self.name, address).trim().to_string(),
            None => self.name.trim().to_string(),
        }
    }
}

/// Lookup seam used by the audit runner
pub trait PlaceLookup {
    /// Find the best-matching place; `Err` for transport or API failures
    fn lookup(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<LookupResult, LookupError>> + Send;
}

impl<T: PlaceLookup + Sync> PlaceLookup for &T {
    fn lookup(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<LookupResult, LookupError>> + Send {
        (**self).lookup(query)
    }
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<TextSearchPlace>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextSearchPlace {
    place_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceDetails>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    formatted_phone_number: Option<String>,
    #[serde(default)]
    international_phone_number: Option<String>,
}

/// Places API client
pub struct PlacesClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl PlacesClient {
    /// Create a client from lookup settings and an API key
    ///
    /// Error messages never include request URLs, which carry the key.
    pub fn new(config: &LookupConfig, api_key: impl Into<String>) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            LookupError::InvalidConfig("requests_per_second must be greater than zero".to_string())
        })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Search for a place, degrading any failure to "not found"
    pub async fn search(&self, query: &SearchQuery) -> LookupResult {
        match self.try_search(query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(name = %query.name, error = %e, "Places lookup failed");
                LookupResult::not_found()
            }
        }
    }

    /// Search for a place, returning transport and API failures
    pub async fn try_search(&self, query: &SearchQuery) -> Result<LookupResult, LookupError> {
        let text = query.text();
        let mut params = vec![("query", text), ("key", self.api_key.clone())];
        if let Some(bias) = &query.bias {
            params.push(("location", format!("{},{}", bias.lat, bias.lng)));
            params.push(("radius", bias.radius_m.to_string()));
        }

        tracing::debug!(name = %query.name, "Querying Places Text Search");

        let search: TextSearchResponse = self.get_json(TEXT_SEARCH_PATH, &params).await?;
        check_status(&search.status, search.error_message.as_deref())?;

        let Some(top) = search.results.into_iter().next() else {
            tracing::debug!(name = %query.name, "Places search returned no results");
            return Ok(LookupResult::not_found());
        };

        let details_params = [
            ("place_id", top.place_id.clone()),
            ("fields", DETAILS_FIELDS.to_string()),
            ("key", self.api_key.clone()),
        ];
        let details: DetailsResponse = self.get_json(DETAILS_PATH, &details_params).await?;
        check_status(&details.status, details.error_message.as_deref())?;

        let details = details.result.unwrap_or(PlaceDetails {
            name: None,
            formatted_address: None,
            formatted_phone_number: None,
            international_phone_number: None,
        });

        let result = LookupResult::found(
            top.name.or(details.name),
            details.formatted_address.or(top.formatted_address),
            details
                .formatted_phone_number
                .or(details.international_phone_number),
        );

        tracing::info!(
            place_id = %top.place_id,
            name = %result.name.as_deref().unwrap_or(""),
            "Retrieved place from Places API"
        );

        Ok(result)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, LookupError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LookupError::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Http(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.without_url().to_string()))
    }
}

impl PlaceLookup for PlacesClient {
    fn lookup(
        &self,
        query: &SearchQuery,
    ) -> impl Future<Output = Result<LookupResult, LookupError>> + Send {
        self.try_search(query)
    }
}

/// Map a Places API `status` field to success or error
fn check_status(status: &str, message: Option<&str>) -> Result<(), LookupError> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(LookupError::RateLimited),
        other => Err(LookupError::Api {
            status: other.to_string(),
            message: message.unwrap_or_default().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> PlacesClient {
        let config = LookupConfig {
            base_url: server.base_url(),
            requests_per_second: 50,
            ..LookupConfig::default()
        };
        PlacesClient::new(&config, "test-key").unwrap()
    }

    #[test]
    fn test_query_text_includes_address_when_enabled() {
        let record = InputRecord::new(1, "Cafe Rio", "1 Main St, Springfield", "");
        let query = SearchQuery::for_record(&record, &LookupConfig::default());
        assert_eq!(query.text(), "Cafe Rio 1 Main St, Springfield");

        let config = LookupConfig {
            include_address_in_query: false,
            ..LookupConfig::default()
        };
        let query = SearchQuery::for_record(&record, &config);
        assert_eq!(query.text(), "Cafe Rio");
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("OK", None).is_ok());
        assert!(check_status("ZERO_RESULTS", None).is_ok());
        assert!(matches!(
            check_status("OVER_QUERY_LIMIT", None),
            Err(LookupError::RateLimited)
        ));
        assert!(matches!(
            check_status("REQUEST_DENIED", Some("bad key")),
            Err(LookupError::Api { .. })
        ));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let config = LookupConfig {
            requests_per_second: 0,
            ..LookupConfig::default()
        };
        assert!(PlacesClient::new(&config, "k").is_err());
    }

    #[tokio::test]
    async fn test_search_found_with_details() {
        let server = MockServer::start_async().await;

        let search_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(TEXT_SEARCH_PATH)
                    .query_param("query", "Cafe Rio 1 Main St")
                    .query_param("key", "test-key");
                then.status(200).json_body(json!({
                    "status": "OK",
                    "results": [
                        { "place_id": "p1", "name": "Cafe Rio", "formatted_address": "1 Main St" },
                        { "place_id": "p2", "name": "Cafe Rio Express" }
                    ]
                }));
            })
            .await;

        let details_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(DETAILS_PATH)
                    .query_param("place_id", "p1")
                    .query_param("fields", DETAILS_FIELDS);
                then.status(200).json_body(json!({
                    "status": "OK",
                    "result": {
                        "formatted_address": "1 Main St, Springfield, IL 62701, USA",
                        "formatted_phone_number": "(555) 010-0100"
                    }
                }));
            })
            .await;

        let client = client_for(&server);
        let mut query = SearchQuery::new("Cafe Rio");
        query.address_hint = Some("1 Main St".into());

        let result = client.try_search(&query).await.unwrap();

        search_mock.assert_async().await;
        details_mock.assert_async().await;
        assert!(result.found);
        assert_eq!(result.name.as_deref(), Some("Cafe Rio"));
        assert_eq!(
            result.address.as_deref(),
            Some("1 Main St, Springfield, IL 62701, USA")
        );
        assert_eq!(result.phone.as_deref(), Some("(555) 010-0100"));
    }

    #[tokio::test]
    async fn test_search_sends_location_bias() {
        let server = MockServer::start_async().await;

        let search_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(TEXT_SEARCH_PATH)
                    .query_param("location", "40.5,-73.25")
                    .query_param("radius", "5000");
                then.status(200)
                    .json_body(json!({ "status": "ZERO_RESULTS", "results": [] }));
            })
            .await;

        let client = client_for(&server);
        let mut query = SearchQuery::new("Nowhere Deli");
        query.bias = Some(LocationBias {
            lat: 40.5,
            lng: -73.25,
            radius_m: 5000,
        });

        let result = client.try_search(&query).await.unwrap();

        search_mock.assert_async().await;
        assert_eq!(result, LookupResult::not_found());
    }

    #[tokio::test]
    async fn test_request_denied_is_error() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path(TEXT_SEARCH_PATH);
                then.status(200).json_body(json!({
                    "status": "REQUEST_DENIED",
                    "error_message": "The provided API key is invalid."
                }));
            })
            .await;

        let client = client_for(&server);
        let err = client
            .try_search(&SearchQuery::new("Cafe Rio"))
            .await
            .unwrap_err();

        match err {
            LookupError::Api { status, message } => {
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.contains("invalid"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_degrades_http_error_to_not_found() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path(TEXT_SEARCH_PATH);
                then.status(503).body("unavailable");
            })
            .await;

        let client = client_for(&server);
        let query = SearchQuery::new("Cafe Rio");

        assert!(matches!(
            client.try_search(&query).await,
            Err(LookupError::Http(503, _))
        ));
        assert_eq!(client.search(&query).await, LookupResult::not_found());
    }

    #[tokio::test]
    async fn test_unparseable_body_is_parse_error() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path(TEXT_SEARCH_PATH);
                then.status(200).body("<html>not json</html>");
            })
            .await;

        let client = client_for(&server);
        let err = client
            .try_search(&SearchQuery::new("Cafe Rio"))
            .await
            .unwrap_err();
        match err {
            LookupError::Parse(message) => assert!(!message.contains("test-key"), "{}", message),
            other => panic!("expected Parse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_error_does_not_expose_api_key() {
        let config = LookupConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            requests_per_second: 50,
            timeout_secs: 2,
            ..LookupConfig::default()
        };
        let client = PlacesClient::new(&config, "SECRET-KEY-123").unwrap();

        let err = client
            .try_search(&SearchQuery::new("Cafe Rio"))
            .await
            .unwrap_err();

        assert!(matches!(err, LookupError::Network(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
    }
}
