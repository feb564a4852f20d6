//! Term extraction and retried provider probes

use serde_json::Value;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use crate::error::{RequestFailure, ResolverError, Result};

/// Collect every string published under `key`, at any depth of `value`.
/// A list under `key` contributes each of its strings.
pub fn collect_terms(value: &Value, key: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(fields) => {
            for (k, v) in fields {
                if k == key {
                    match v {
                        Value::String(term) => {
                            out.insert(term.trim().to_string());
                        }
                        Value::Array(items) => {
                            out.extend(items.iter().filter_map(Value::as_str).map(|t| t.trim().to_string()));
                        }
                        _ => {}
                    }
                }
                collect_terms(v, key, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_terms(item, key, out);
            }
        }
        _ => {}
    }
}

/// Delay before the first retry; doubles on each further attempt
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Run `op`, retrying transient request failures up to `retries` extra times
pub async fn with_retries<T, F, Fut>(retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < retries => {
                let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                attempt += 1;
                tracing::debug!(attempt = attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying provider request");
                tokio::time::sleep(delay).await;
            }
            outcome => return outcome,
        }
    }
}

/// `GET url` and decode the JSON body
pub async fn get_json(http: &reqwest::Client, url: &str) -> Result<Value> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| ResolverError::request(url, RequestFailure::from_reqwest(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResolverError::request(url, RequestFailure::Status(status.as_u16())));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ResolverError::request(url, RequestFailure::Decode(e.to_string())))
}

/// Terms advertised by the document at `url`
pub async fn fetch_terms(
    http: &reqwest::Client,
    url: &str,
    key: &str,
    retries: u32,
) -> Result<BTreeSet<String>> {
    let body = with_retries(retries, move || get_json(http, url)).await?;
    let mut terms = BTreeSet::new();
    collect_terms(&body, key, &mut terms);
    Ok(terms)
}
