//! GraphQL stream URL client
//!
//! Asks the backend's `streamUrl` query for a playable URL and parses the
//! optional `expiresAt` it returns (RFC 3339 string or epoch milliseconds).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ResolveError, ResolvedStream, StreamResolver};
use crate::clock::from_epoch_millis;

/// Query sent for every resolution
const STREAM_URL_QUERY: &str =
    "query StreamUrl($trackId: ID!) { streamUrl(trackId: $trackId) { url expiresAt } }";

/// Request body for the GraphQL endpoint
#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: StreamUrlVariables<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamUrlVariables<'a> {
    track_id: &'a str,
}

/// Top-level GraphQL response envelope
#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<StreamUrlData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamUrlData {
    stream_url: Option<StreamUrlPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamUrlPayload {
    url: Option<String>,
    expires_at: Option<ExpiresAtField>,
}

/// `expiresAt` comes back either as an ISO timestamp or as epoch milliseconds
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresAtField {
    Millis(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Client for the backend's `streamUrl` GraphQL query
#[derive(Debug, Clone)]
pub struct GraphqlResolver {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphqlResolver {
    /// Create a resolver for the given GraphQL endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token: None,
        }
    }

    /// Create a resolver with a custom HTTP client
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StreamResolver for GraphqlResolver {
    async fn resolve(&self, track_id: &str) -> Result<ResolvedStream, ResolveError> {
        let body = GraphqlRequest {
            query: STREAM_URL_QUERY,
            variables: StreamUrlVariables { track_id },
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(track_id, endpoint = self.endpoint.as_str(), "resolving stream url");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(track_id, status = status.as_u16(), "stream url request rejected");
            return Err(ResolveError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

/// Parse a raw `streamUrl` response body into a ResolvedStream
fn parse_response(text: &str) -> Result<ResolvedStream, ResolveError> {
    let response: GraphqlResponse = serde_json::from_str(text)?;

    if !response.errors.is_empty() {
        return Err(ResolveError::Graphql(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }

    let payload = response
        .data
        .and_then(|data| data.stream_url)
        .ok_or_else(|| ResolveError::MissingField("streamUrl".to_string()))?;

    let url = payload
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ResolveError::MissingField("streamUrl.url".to_string()))?;

    let expires_at = payload.expires_at.map(parse_expires_at).transpose()?;

    Ok(ResolvedStream { url, expires_at })
}

/// Interpret an `expiresAt` value as a UTC timestamp
fn parse_expires_at(field: ExpiresAtField) -> Result<DateTime<Utc>, ResolveError> {
    match field {
        ExpiresAtField::Millis(ms) => {
            from_epoch_millis(ms).ok_or_else(|| ResolveError::InvalidExpiry(ms.to_string()))
        }
        ExpiresAtField::Text(text) => {
            if let Ok(ms) = text.parse::<i64>() {
                return from_epoch_millis(ms).ok_or(ResolveError::InvalidExpiry(text));
            }
            DateTime::parse_from_rfc3339(&text)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| ResolveError::InvalidExpiry(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_parse_response_with_iso_expiry() {
        let body = r#"{"data":{"streamUrl":{"url":"https://cdn.example/t1.mp3","expiresAt":"2026-10-18T12:00:00Z"}}}"#;

        let stream = parse_response(body).expect("should parse");

        assert_eq!(stream.url, "https://cdn.example/t1.mp3");
        let expected = DateTime::parse_from_rfc3339("2026-10-18T12:00:00Z").unwrap();
        assert_eq!(stream.expires_at, Some(expected.with_timezone(&Utc)));
    }

    #[test]
    fn test_parse_response_with_millis_expiry() {
        let body = r#"{"data":{"streamUrl":{"url":"https://cdn.example/t1.mp3","expiresAt":1700000005000}}}"#;

        let stream = parse_response(body).expect("should parse");

        assert_eq!(stream.expires_at.map(|t| t.timestamp_millis()), Some(1_700_000_005_000));
    }

    #[test]
    fn test_parse_response_with_millis_as_string() {
        let body = r#"{"data":{"streamUrl":{"url":"https://cdn.example/t1.mp3","expiresAt":"1700000005000"}}}"#;

        let stream = parse_response(body).expect("should parse");

        assert_eq!(stream.expires_at.map(|t| t.timestamp_millis()), Some(1_700_000_005_000));
    }

    #[test]
    fn test_parse_response_without_expiry() {
        let body = r#"{"data":{"streamUrl":{"url":"https://cdn.example/t1.mp3","expiresAt":null}}}"#;

        let stream = parse_response(body).expect("should parse");

        assert!(stream.expires_at.is_none());
    }

    #[test]
    fn test_parse_response_graphql_errors() {
        let body = r#"{"data":null,"errors":[{"message":"Track not found"}]}"#;

        let result = parse_response(body);

        assert!(matches!(result, Err(ResolveError::Graphql(ref msgs)) if msgs == &["Track not found"]));
    }

    #[test]
    fn test_parse_response_missing_stream_url() {
        let body = r#"{"data":{"streamUrl":null}}"#;
        assert!(matches!(parse_response(body), Err(ResolveError::MissingField(_))));
    }

    #[test]
    fn test_parse_response_empty_url_is_missing() {
        let body = r#"{"data":{"streamUrl":{"url":""}}}"#;
        assert!(matches!(parse_response(body), Err(ResolveError::MissingField(_))));
    }

    #[test]
    fn test_parse_response_invalid_expiry() {
        let body = r#"{"data":{"streamUrl":{"url":"https://cdn.example/t1.mp3","expiresAt":"tomorrow"}}}"#;
        assert!(matches!(parse_response(body), Err(ResolveError::InvalidExpiry(ref s)) if s == "tomorrow"));
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(matches!(parse_response("not json"), Err(ResolveError::ParseError(_))));
    }

    #[tokio::test]
    async fn test_resolve_posts_query_with_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({ "variables": { "trackId": "t1" } })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"streamUrl":{"url":"https://cdn.example/t1.mp3","expiresAt":1700000005000}}}"#)
            .create_async()
            .await;

        let resolver = GraphqlResolver::new(format!("{}/graphql", server.url())).with_token("secret");
        let stream = resolver.resolve("t1").await.expect("resolve should succeed");

        assert_eq!(stream.url, "https://cdn.example/t1.mp3");
        assert_eq!(stream.expires_at.map(|t| t.timestamp_millis()), Some(1_700_000_005_000));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resolve_reports_http_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(502)
            .create_async()
            .await;

        let resolver = GraphqlResolver::new(format!("{}/graphql", server.url()));
        let result = resolver.resolve("t1").await;

        assert!(matches!(result, Err(ResolveError::Status(502))));
        mock.assert_async().await;
    }
}
