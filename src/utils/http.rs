// src/utils/http.rs

//! HTTP client utilities.
//!
//! Fetch helpers never fail past this boundary: transport and decode errors
//! are logged and reported as `None`.

use std::time::Duration;

use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};
use serde_json::Value;

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/json,application/xhtml+xml"),
    );

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body as text, optionally sending a session cookie.
pub async fn fetch_text(client: &reqwest::Client, url: &str, cookie: Option<&str>) -> Option<String> {
    match try_fetch_text(client, url, cookie).await {
        Ok(text) => Some(text),
        Err(e) => {
            log::error!("[HTTP] Error fetching {}: {}", url, e);
            None
        }
    }
}

async fn try_fetch_text(
    client: &reqwest::Client,
    url: &str,
    cookie: Option<&str>,
) -> Result<String> {
    let mut request = client.get(url);
    if let Some(cookie) = cookie.filter(|c| !c.is_empty()) {
        request = request.header(COOKIE, cookie);
    }
    let response = request.send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Fetch a JSON payload, unwrapping a `callback(...)` envelope if present.
pub async fn fetch_json(client: &reqwest::Client, url: &str, callback: &str) -> Option<Value> {
    let body = fetch_text(client, url, None).await?;
    match parse_json_payload(&body, callback) {
        Ok(value) => Some(value),
        Err(e) => {
            log::error!("[HTTP] Error decoding JSON from {}: {}", url, e);
            None
        }
    }
}

/// Decode a JSON body that may be wrapped as `callback(...)` or `callback(...);`.
pub fn parse_json_payload(body: &str, callback: &str) -> Result<Value> {
    Ok(serde_json::from_str(strip_callback(body, callback))?)
}

fn strip_callback<'a>(body: &'a str, callback: &str) -> &'a str {
    let trimmed = body.trim();
    if callback.is_empty() {
        return trimmed;
    }
    trimmed
        .strip_prefix(callback)
        .and_then(|rest| rest.strip_prefix('('))
        .map(|rest| rest.trim_end_matches(';').trim_end())
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_callback_envelope() {
        let value = parse_json_payload("res({\"data\":[1,2]});", "res").unwrap();
        assert_eq!(value["data"][1], 2);

        let value = parse_json_payload("res({\"data\":[]})\n", "res").unwrap();
        assert!(value["data"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_plain_json_passes_through() {
        let value = parse_json_payload("{\"count\":3}", "res").unwrap();
        assert_eq!(value["count"], 3);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_json_payload("res(<html>);", "res").is_err());
    }

    #[test]
    fn test_create_async_client() {
        assert!(create_async_client(&CrawlerConfig::default()).is_ok());
    }
}
