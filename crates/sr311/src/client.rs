use crate::error::{Error, Result};
use crate::models::{Page, Record};
use diagnostics::*;
use std::time::Duration;
use url::Url;

/// Chicago 311 Service Requests, JSON resource
pub const DEFAULT_ENDPOINT: &str = "https://data.cityofchicago.org/resource/v6vf-nfxy.json";
pub const APP_TOKEN_HEADER: &str = "X-App-Token";
pub const PROBE_TIMEOUT_SECONDS: u64 = 60;
pub const PAGE_TIMEOUT_SECONDS: u64 = 120;

/// Which timeout budget a request draws on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// One-row schema probe
    Schema,
    /// Filter probes and data pages
    Data,
}

/// One SoQL page request: `$limit`, `$offset`, `$order`, `$where`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub kind: RequestKind,
    pub limit: usize,
    pub offset: usize,
    pub order: Option<String>,
    pub filter: Option<String>,
}

impl PageQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            kind: RequestKind::Data,
            limit,
            offset: 0,
            order: None,
            filter: None,
        }
    }

    /// Smallest possible request, used to learn the column set
    pub fn schema_probe() -> Self {
        Self {
            kind: RequestKind::Schema,
            ..Self::new(1)
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: Option<&str>) -> Self {
        self.order = order.map(str::to_string);
        self
    }

    pub fn filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter.map(str::to_string);
        self
    }

    /// Query parameters in the order Socrata documents them
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if let Some(filter) = &self.filter {
            params.push(("$where", filter.clone()));
        }
        params.push(("$limit", self.limit.to_string()));
        // A schema probe never pages
        if self.kind == RequestKind::Data {
            params.push(("$offset", self.offset.to_string()));
        }
        if let Some(order) = &self.order {
            params.push(("$order", order.clone()));
        }
        params
    }

    /// Full request URL against `endpoint`
    pub fn url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.params() {
                pairs.append_pair(key, &value);
            }
        }
        url
    }
}

/// Anything that can answer a SoQL page request.
///
/// The fetcher only talks to this trait, so its stages can be exercised
/// against an in-memory source.
pub trait SourceClient {
    /// Issue one request. A non-success status is `Error::Transport`.
    fn fetch_page(&self, query: &PageQuery) -> Result<Page>;
}

/// Blocking Socrata client
pub struct Client {
    http_client: reqwest::blocking::Client,
    endpoint: Url,
    app_token: Option<String>,
    probe_timeout: Duration,
    page_timeout: Duration,
}

impl Client {
    /// Create a client for `endpoint`, with an optional app token for
    /// higher rate limits
    pub fn new(endpoint: &str, app_token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid endpoint URL '{endpoint}': {e}")))?;

        let http_client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|source| Error::Request {
                url: endpoint.to_string(),
                source,
            })?;

        Ok(Client {
            http_client,
            endpoint,
            app_token: app_token.filter(|t| !t.is_empty()),
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECONDS),
            page_timeout: Duration::from_secs(PAGE_TIMEOUT_SECONDS),
        })
    }

    pub fn with_timeouts(mut self, probe: Duration, page: Duration) -> Self {
        self.probe_timeout = probe;
        self.page_timeout = page;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn timeout_for(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Schema => self.probe_timeout,
            RequestKind::Data => self.page_timeout,
        }
    }
}

impl SourceClient for Client {
    fn fetch_page(&self, query: &PageQuery) -> Result<Page> {
        let url = query.url(&self.endpoint);
        let url_text = url.to_string();
        debug!("GET {url_text}");

        let mut request = self
            .http_client
            .get(url)
            .timeout(self.timeout_for(query.kind));
        if let Some(token) = &self.app_token {
            request = request.header(APP_TOKEN_HEADER, token);
        }

        let response = request.send().map_err(|source| Error::Request {
            url: url_text.clone(),
            source,
        })?;

        let status = response.status();
        let body = response.text().map_err(|source| Error::Request {
            url: url_text.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(Error::transport(status.as_u16(), url_text, &body));
        }

        let rows: Vec<Record> = serde_json::from_str(&body).map_err(|source| Error::Decode {
            url: url_text.clone(),
            source,
        })?;

        let row_count = rows.len();
        debug!("Received {row_count} rows");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let endpoint = Url::parse(DEFAULT_ENDPOINT).unwrap();

        assert_eq!(
            PageQuery::schema_probe().url(&endpoint).as_str(),
            "https://data.cityofchicago.org/resource/v6vf-nfxy.json?%24limit=1"
        );

        let query = PageQuery::new(5)
            .filter(Some("created_date >= '2024-01-15T00:00:00Z'"))
            .order(Some("created_date"));
        let url = query.url(&endpoint);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("$where".to_string(), "created_date >= '2024-01-15T00:00:00Z'".to_string()),
                ("$limit".to_string(), "5".to_string()),
                ("$offset".to_string(), "0".to_string()),
                ("$order".to_string(), "created_date".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = Client::new(DEFAULT_ENDPOINT, Some(String::new())).unwrap();
        assert!(client.app_token.is_none());
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        assert!(matches!(
            Client::new("not a url", None),
            Err(Error::Config { .. })
        ));
    }
}
