use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::error::GconError;
use crate::genbank::{RawRecord, parse_genbank};

pub const ENTREZ_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Batch retrieval of GenBank records by accession.
pub trait SequenceFetcher: Send + Sync {
    fn fetch_batch(&self, ids: &[String]) -> Result<Vec<RawRecord>, GconError>;
}

impl<T: SequenceFetcher + ?Sized> SequenceFetcher for &T {
    fn fetch_batch(&self, ids: &[String]) -> Result<Vec<RawRecord>, GconError> {
        (**self).fetch_batch(ids)
    }
}

#[derive(Clone)]
pub struct EntrezHttpClient {
    client: Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<String>,
    tool: String,
}

impl EntrezHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, GconError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gcon/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GconError::EntrezHttp(err.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GconError::EntrezHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: ENTREZ_BASE_URL.to_string(),
            email: config.email.clone(),
            api_key: config.api_key.clone(),
            tool: config.tool.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn efetch_query(&self, email: &str, ids: &[String]) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("db", "nuccore".to_string()),
            ("rettype", "gb".to_string()),
            ("retmode", "text".to_string()),
            ("id", ids.join(",")),
            ("email", email.to_string()),
            ("tool", self.tool.clone()),
        ];
        if let Some(api_key) = &self.api_key {
            query.push(("api_key", api_key.clone()));
        }
        query
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, GconError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(status, attempt, "retrying Entrez request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        debug!(error = %err, attempt, "retrying Entrez request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(GconError::EntrezHttp(err.to_string()));
                }
            }
        }
    }
}

impl SequenceFetcher for EntrezHttpClient {
    fn fetch_batch(&self, ids: &[String]) -> Result<Vec<RawRecord>, GconError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let email = self
            .email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .ok_or(GconError::MissingEmail)?;

        let url = format!("{}/efetch.fcgi", self.base_url);
        let query = self.efetch_query(email, ids);
        let response = self.send_with_retries(|| self.client.get(&url).query(&query))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Entrez request failed".to_string());
            return Err(GconError::EntrezStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| GconError::EntrezHttp(err.to_string()))?;
        parse_genbank(&body)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Only refused or failed connections are retried; timeouts surface.
fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() && !err.is_timeout()
}
