//! HTTP binding for consumed Things
//!
//! Maps the three Thing operations onto HTTP verbs against the first form
//! of each affordance: GET reads a property, PUT writes one, POST invokes
//! an action. Transient failures are retried with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Thing, ThingDescription, ThingError};

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 200;

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Thing reached over HTTP
pub struct HttpThing {
    td: ThingDescription,
    base: Option<Url>,
    http: Client,
}

impl HttpThing {
    /// Create a client for a Thing Description with the default timeout
    pub fn new(td: ThingDescription) -> Result<Self, ThingError> {
        Self::with_timeout(td, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout
    ///
    /// Action calls on blocking actuators resolve only when the motion ends,
    /// so the timeout must cover the longest move.
    pub fn with_timeout(td: ThingDescription, timeout: Duration) -> Result<Self, ThingError> {
        debug!(title = %td.title, ?timeout, "HttpThing::with_timeout: called");
        let base = match td.base.as_deref() {
            Some(b) => Some(Url::parse(b).map_err(|e| ThingError::InvalidHref {
                href: b.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { td, base, http })
    }

    /// Resolve a form href, relative hrefs against the TD base
    fn resolve(&self, href: &str) -> Result<Url, ThingError> {
        match Url::parse(href) {
            Ok(url) => Ok(url),
            Err(_) => {
                let base = self.base.as_ref().ok_or_else(|| ThingError::InvalidHref {
                    href: href.to_string(),
                    reason: "relative href without base".to_string(),
                })?;
                base.join(href).map_err(|e| ThingError::InvalidHref {
                    href: href.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn property_url(&self, name: &str) -> Result<Url, ThingError> {
        let href = self.td.property_href(name).ok_or_else(|| ThingError::MissingAffordance {
            thing: self.td.title.clone(),
            kind: "property",
            name: name.to_string(),
        })?;
        self.resolve(href)
    }

    fn action_url(&self, name: &str) -> Result<Url, ThingError> {
        let href = self.td.action_href(name).ok_or_else(|| ThingError::MissingAffordance {
            thing: self.td.title.clone(),
            kind: "action",
            name: name.to_string(),
        })?;
        self.resolve(href)
    }

    /// Send one request with retries, returning the decoded body
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, ThingError> {
        debug!(title = %self.td.title, %method, %url, "send: called");
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(
                    title = %self.td.title,
                    attempt,
                    backoff_ms = backoff,
                    "send: retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "send: network error");
                    last_error = Some(ThingError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "send: retryable status");
                last_error = Some(ThingError::Status {
                    thing: self.td.title.clone(),
                    status,
                    message: text,
                });
                continue;
            }

            if !response.status().is_success() {
                debug!(status, "send: device error");
                let text = response.text().await.unwrap_or_default();
                return Err(ThingError::Status {
                    thing: self.td.title.clone(),
                    status,
                    message: text,
                });
            }

            let text = response.text().await?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        Err(last_error.unwrap_or_else(|| ThingError::Status {
            thing: self.td.title.clone(),
            status: 0,
            message: "Max retries exceeded".to_string(),
        }))
    }
}

#[async_trait]
impl Thing for HttpThing {
    fn description(&self) -> &ThingDescription {
        &self.td
    }

    async fn invoke_action(&self, name: &str, input: Option<Value>) -> Result<Value, ThingError> {
        debug!(title = %self.td.title, %name, "invoke_action: called");
        let url = self.action_url(name)?;
        self.send(Method::POST, url, input.as_ref()).await
    }

    async fn read_property(&self, name: &str) -> Result<Value, ThingError> {
        let url = self.property_url(name)?;
        self.send(Method::GET, url, None).await
    }

    async fn write_property(&self, name: &str, value: Value) -> Result<(), ThingError> {
        debug!(title = %self.td.title, %name, %value, "write_property: called");
        let url = self.property_url(name)?;
        self.send(Method::PUT, url, Some(&value)).await?;
        Ok(())
    }
}
