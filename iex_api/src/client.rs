//! HTTP client for the IEX market-data API.

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::{
    query::{BarRange, BarsQuery, Query, SymbolsQuery, BATCH_SIZE},
    transport::{HttpTransport, RawResponse, Transport},
    types::{BarsResponse, SymbolRecord, SymbolsResponse},
    Error,
};

/// Production API origin, version prefix included.
pub const BASE_URL: &str = "https://api.iextrading.com/1.0";

const BATCH_PATH: &str = "/stock/market/batch";
const SYMBOLS_PATH: &str = "/ref-data/symbols";

/// Connection settings shared by every request a [`Client`] makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API. Defaults to [`BASE_URL`].
    pub base_url: String,
    /// Per-request timeout, covering connect through body read.
    pub timeout: Duration,
    /// Fixed wait before re-sending a rate-limited batch request.
    pub backoff: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            backoff: Duration::from_secs(1),
            user_agent: format!("iex_api/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }
}

/// HTTP client for the IEX batch chart and reference-data endpoints.
///
/// Holds no per-call state, so one instance can serve concurrent callers.
/// Nothing is cached and no rate-limit budget is tracked across calls.
pub struct Client<T = HttpTransport> {
    config: ClientConfig,
    transport: T,
}

impl Client<HttpTransport> {
    /// Creates a new client pointing at the production IEX API.
    pub fn new() -> Result<Self, Error> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::with_config(ClientConfig::default().with_base_url(base_url))
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self { config, transport })
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client that sends every request through `transport`.
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn get_url(&self, path: &str, query: Option<&impl Query>) -> Result<Url, Error> {
        let url = Url::parse(format!("{}{}", &self.config.base_url, path).as_str()).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            e
        })?;
        Ok(match query {
            Some(query) => query.add_to_url(&url),
            None => url,
        })
    }

    /// Fetches chart bars for `symbols` over the named `range`.
    ///
    /// `range` must be one of `5y, 2y, 1y, ytd, 6m, 3m, 1m, 1d, date, dynamic`
    /// and is checked before anything else. An empty symbol list then returns
    /// an empty response without touching the network. `limit`, when positive,
    /// keeps only the most recent N bars per symbol.
    ///
    /// Callers must keep `symbols.len()` within [`BATCH_SIZE`]; larger sets are
    /// sent unchanged and the upstream decides what happens.
    ///
    /// A 429 is retried up to `max_retries` times after a fixed
    /// [`ClientConfig::backoff`]. Any other failure is returned immediately.
    pub async fn fetch_bars<S: AsRef<str>>(
        &self,
        symbols: &[S],
        range: &str,
        limit: Option<u32>,
        max_retries: u32,
    ) -> Result<BarsResponse, Error> {
        let range: BarRange = range.parse()?;
        let mut query =
            BarsQuery::new(symbols.iter().map(|s| s.as_ref().to_string())).with_range(range);
        if let Some(limit) = limit {
            query = query.with_chart_last(limit);
        }
        self.get_bars(&query, max_retries).await
    }

    /// Typed form of [`Client::fetch_bars`].
    pub async fn get_bars(
        &self,
        query: &BarsQuery,
        max_retries: u32,
    ) -> Result<BarsResponse, Error> {
        if query.symbols.is_empty() {
            return Ok(BarsResponse::new());
        }
        if query.symbols.len() > BATCH_SIZE {
            tracing::warn!(
                "Requesting {} symbols in one batch, upstream limit is {}",
                query.symbols.len(),
                BATCH_SIZE
            );
        }

        let url = self.get_url(BATCH_PATH, Some(query))?;
        let attempts = max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            tracing::debug!("GET {} (attempt {}/{})", url, attempt, attempts);
            let resp = self.transport.get(&url).await?;

            if resp.status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
                if attempt == attempts {
                    break;
                }
                tracing::warn!(
                    "Batch request rate limited (attempt {}/{}), retrying in {:.1}s",
                    attempt,
                    attempts,
                    self.config.backoff.as_secs_f64()
                );
                tokio::time::sleep(self.config.backoff).await;
                continue;
            }

            if !resp.is_success() {
                return Err(status_error(resp));
            }

            return serde_json::from_str::<BarsResponse>(&resp.body).map_err(|e| {
                tracing::error!(
                    "Failed to parse bars: {} | body: {}",
                    e,
                    truncate_body(&resp.body)
                );
                Error::MalformedResponse(e.to_string())
            });
        }

        tracing::error!("Batch request still rate limited after {} attempts", attempts);
        Err(Error::RetriesExhausted { attempts })
    }

    /// Fetches the full reference list of symbols.
    ///
    /// Any status of 300 or above is an error, redirects included. Unlike
    /// [`Client::fetch_bars`] there is no retry, not even on 429.
    pub async fn list_symbols(&self) -> Result<SymbolsResponse, Error> {
        let url = self.get_url(SYMBOLS_PATH, Some(&SymbolsQuery))?;
        tracing::debug!("GET {}", url);
        let resp = self.transport.get(&url).await?;

        if resp.status >= StatusCode::MULTIPLE_CHOICES.as_u16() {
            return Err(status_error(resp));
        }

        parse_symbols_csv(&resp.body).map_err(|e| {
            tracing::error!(
                "Failed to parse symbols: {} | body: {}",
                e,
                truncate_body(&resp.body)
            );
            Error::MalformedResponse(e.to_string())
        })
    }
}

fn parse_symbols_csv(body: &str) -> Result<SymbolsResponse, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    reader.deserialize::<SymbolRecord>().collect()
}

fn status_error(resp: RawResponse) -> Error {
    let snippet = truncate_body(&resp.body);
    tracing::error!("Request failed with status {}: {}", resp.status, snippet);
    Error::HttpStatus {
        status: resp.status,
        body: snippet,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    const ONE_BAR: &str = r#"{"AAA":{"chart":[{"date":"2023-05-01","close":1.5}]}}"#;

    /// Replays canned responses in order and records every URL it was asked for.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<RawResponse, Error>>>,
        requests: Mutex<Vec<Url>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<RawResponse, Error>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn rate_limited_then_ok(k: usize) -> Self {
            let mut responses: Vec<Result<RawResponse, Error>> =
                (0..k).map(|_| Ok(RawResponse::new(429, ""))).collect();
            responses.push(Ok(RawResponse::new(200, ONE_BAR)));
            Self::new(responses)
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &Url) -> Result<RawResponse, Error> {
            self.requests.lock().unwrap().push(url.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::RequestFailed("script exhausted".to_string())))
        }
    }

    fn client(transport: ScriptedTransport) -> Client<ScriptedTransport> {
        let config = ClientConfig::default().with_base_url("https://iex.test/1.0");
        Client::with_transport(config, transport)
    }

    fn assert_slept(start: Instant, delays: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_secs(delays);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(500),
            "expected {} one-second delays, clock advanced {:?}",
            delays,
            elapsed
        );
    }

    #[tokio::test]
    async fn invalid_range_fails_before_any_request() {
        let client = client(ScriptedTransport::new(vec![]));
        for bad in ["1w", "max", "", "1M"] {
            let err = client.fetch_bars(&["AAA"], bad, None, 3).await.unwrap_err();
            assert!(matches!(err, Error::InvalidRange(ref r) if r == bad));
            let err = client.fetch_bars::<&str>(&[], bad, None, 0).await.unwrap_err();
            assert!(matches!(err, Error::InvalidRange(_)));
        }
        assert_eq!(client.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn empty_symbols_short_circuit() {
        let client = client(ScriptedTransport::new(vec![]));
        for range in BarRange::ALL {
            for retries in [0, 1, 5] {
                let resp = client
                    .fetch_bars::<String>(&[], range.as_str(), Some(10), retries)
                    .await
                    .unwrap();
                assert!(resp.is_empty());
            }
        }
        assert_eq!(client.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        tokio::time::pause();

        for (k, max_retries) in [(0, 0), (1, 1), (2, 3), (3, 3)] {
            let client = client(ScriptedTransport::rate_limited_then_ok(k));
            let start = Instant::now();

            let resp = client.fetch_bars(&["AAA"], "1m", None, max_retries).await.unwrap();

            assert_eq!(resp["AAA"].chart.len(), 1);
            assert_eq!(client.transport.request_count(), k + 1);
            assert_slept(start, k as u64);
        }
    }

    #[tokio::test]
    async fn retries_exhausted_when_budget_too_small() {
        tokio::time::pause();

        for (k, max_retries) in [(1, 0), (2, 1), (5, 3)] {
            let client = client(ScriptedTransport::rate_limited_then_ok(k));
            let start = Instant::now();

            let err = client
                .fetch_bars(&["AAA"], "1m", None, max_retries)
                .await
                .unwrap_err();

            assert!(matches!(err, Error::RetriesExhausted { attempts } if attempts == max_retries + 1));
            assert_eq!(client.transport.request_count(), max_retries as usize + 1);
            assert_slept(start, max_retries as u64);
        }
    }

    #[tokio::test]
    async fn every_retry_sends_the_same_request() {
        tokio::time::pause();

        let client = client(ScriptedTransport::rate_limited_then_ok(2));
        client
            .fetch_bars(&["AAA", "BBB"], "5y", Some(3), 2)
            .await
            .unwrap();

        let requests = client.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|url| url == &requests[0]));
        assert_eq!(
            requests[0].as_str(),
            "https://iex.test/1.0/stock/market/batch?symbols=AAA%2CBBB&types=chart&range=5y&chartLast=3"
        );
    }

    #[tokio::test]
    async fn other_statuses_are_not_retried() {
        for status in [400, 404, 500, 503] {
            let client = client(ScriptedTransport::new(vec![
                Ok(RawResponse::new(status, "boom")),
                Ok(RawResponse::new(200, ONE_BAR)),
            ]));
            let err = client.fetch_bars(&["AAA"], "1m", None, 5).await.unwrap_err();
            match err {
                Error::HttpStatus { status: got, body } => {
                    assert_eq!(got, status);
                    assert_eq!(body, "boom");
                }
                other => panic!("expected HttpStatus, got {:?}", other),
            }
            assert_eq!(client.transport.request_count(), 1);
        }
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let client = client(ScriptedTransport::new(vec![
            Err(Error::RequestFailed("connection refused".to_string())),
            Ok(RawResponse::new(200, ONE_BAR)),
        ]));
        let err = client.fetch_bars(&["AAA"], "1m", None, 5).await.unwrap_err();
        assert!(matches!(err, Error::RequestFailed(ref msg) if msg == "connection refused"));
        assert_eq!(client.transport.request_count(), 1);
    }

    #[tokio::test]
    async fn undecodable_bars_are_malformed() {
        for body in ["{not json}", r#"{"AAA":{"chart":{"date":"x"}}}"#, "[]"] {
            let client = client(ScriptedTransport::new(vec![Ok(RawResponse::new(200, body))]));
            let err = client.fetch_bars(&["AAA"], "1m", None, 0).await.unwrap_err();
            assert!(matches!(err, Error::MalformedResponse(_)), "body {:?}", body);
        }
    }

    #[tokio::test]
    async fn symbols_reject_statuses_from_300() {
        for status in [300, 301, 302, 404, 429, 500] {
            let client = client(ScriptedTransport::new(vec![
                Ok(RawResponse::new(status, "")),
                Ok(RawResponse::new(200, "symbol,name,date,isEnabled,type,iexId\n")),
            ]));
            let err = client.list_symbols().await.unwrap_err();
            assert!(matches!(err, Error::HttpStatus { status: got, .. } if got == status));
            assert_eq!(client.transport.request_count(), 1);
        }
    }

    #[tokio::test]
    async fn symbols_request_asks_for_csv() {
        let client = client(ScriptedTransport::new(vec![Ok(RawResponse::new(
            200,
            "symbol,name,date,isEnabled,type,iexId\n",
        ))]));
        assert!(client.list_symbols().await.unwrap().is_empty());
        assert_eq!(
            client.transport.requests.lock().unwrap()[0].as_str(),
            "https://iex.test/1.0/ref-data/symbols?format=csv"
        );
    }

    #[test]
    fn symbols_csv_maps_columns_by_header() {
        let csv = "iexId,type,isEnabled,date,name,symbol\n\
                   2,cs,true,2018-05-01,Agilent Technologies Inc.,A\n\
                   12042,et,false,2018-05-01,iShares Core U.S. Aggregate Bond,AGG\n";
        let records = parse_symbols_csv(csv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "A");
        assert_eq!(records[0].iex_id, 2);
        assert!(records[0].is_enabled);
        assert_eq!(records[1].instrument_type, "et");
        assert!(!records[1].is_enabled);
    }

    #[test]
    fn symbols_csv_type_mismatch_is_an_error() {
        let header = "symbol,name,date,isEnabled,type,iexId\n";
        assert!(parse_symbols_csv(&format!("{header}A,Agilent,2018-05-01,yes,cs,2\n")).is_err());
        assert!(parse_symbols_csv(&format!("{header}A,Agilent,2018-05-01,true,cs,abc\n")).is_err());
        assert!(parse_symbols_csv(&format!("{header}A,Agilent,2018-05-01\n")).is_err());
        assert!(parse_symbols_csv("symbol,name\nA,Agilent\n").is_err());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let short = "ok";
        assert_eq!(truncate_body(short), "ok");

        let long = "é".repeat(1500);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("...[truncated]"));
        assert!(truncated.len() <= 2000 + "...[truncated]".len());
    }

    #[test]
    fn default_config_targets_production() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.backoff, Duration::from_secs(1));
        assert!(config.user_agent.starts_with("iex_api/"));
    }
}
