use crate::{
    config::FeedConfig,
    error::{ErrorBody, FeedError},
    merge::FeedPayload,
    stream::StreamKind,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use smol_str::SmolStr;
use tracing::debug;
use url::Url;

/// Remote source of full snapshots and deltas for every stream.
///
/// Implementations must treat every non-2xx or unparseable response as a [`FeedError`];
/// the poll loop isolates that failure to the one stream.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Most recent rows of `stream`, used to bootstrap a full replace.
    async fn fetch_latest(&self, stream: StreamKind, symbol: &str) -> Result<FeedPayload, FeedError>;

    /// Rows of `stream` strictly newer than `since_ms`.
    async fn fetch_delta(
        &self,
        stream: StreamKind,
        symbol: &str,
        since_ms: i64,
    ) -> Result<FeedPayload, FeedError>;
}

/// [`FeedSource`] over the prediction service HTTP contract:
/// - `GET /pred/latest?symbol&profile&n`
/// - `GET /pred/delta?symbol&profile&since_ms`
/// - `GET /snapshot?symbol&seconds&profile`
/// - `GET /snapshot/delta?symbol&since_ms`
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    http: reqwest::Client,
    base_url: Url,
    latest_rows: usize,
    snapshot_seconds: u64,
    snapshot_profile: SmolStr,
}

impl HttpFeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        // Url::join replaces the final segment unless the base ends with '/'
        let mut base_url = config.base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            http,
            base_url: Url::parse(&base_url)?,
            latest_rows: config.latest_rows,
            snapshot_seconds: config.snapshot_seconds,
            snapshot_profile: config.snapshot_profile.clone(),
        })
    }

    fn latest_url(&self, stream: StreamKind, symbol: &str) -> Result<Url, FeedError> {
        let url = match stream.profile() {
            Some(profile) => {
                let mut url = self.base_url.join("pred/latest")?;
                url.query_pairs_mut()
                    .append_pair("symbol", symbol)
                    .append_pair("profile", profile)
                    .append_pair("n", &self.latest_rows.to_string());
                url
            }
            None => {
                let mut url = self.base_url.join("snapshot")?;
                url.query_pairs_mut()
                    .append_pair("symbol", symbol)
                    .append_pair("seconds", &self.snapshot_seconds.to_string())
                    .append_pair("profile", &self.snapshot_profile);
                url
            }
        };
        Ok(url)
    }

    fn delta_url(&self, stream: StreamKind, symbol: &str, since_ms: i64) -> Result<Url, FeedError> {
        let url = match stream.profile() {
            Some(profile) => {
                let mut url = self.base_url.join("pred/delta")?;
                url.query_pairs_mut()
                    .append_pair("symbol", symbol)
                    .append_pair("profile", profile)
                    .append_pair("since_ms", &since_ms.to_string());
                url
            }
            None => {
                let mut url = self.base_url.join("snapshot/delta")?;
                url.query_pairs_mut()
                    .append_pair("symbol", symbol)
                    .append_pair("since_ms", &since_ms.to_string());
                url
            }
        };
        Ok(url)
    }

    async fn get_payload(&self, url: Url) -> Result<FeedPayload, FeedError> {
        debug!(%url, "fetching feed payload");
        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from((
                status,
                ErrorBody::classify(content_type.as_deref(), &body),
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn fetch_latest(&self, stream: StreamKind, symbol: &str) -> Result<FeedPayload, FeedError> {
        let url = self.latest_url(stream, symbol)?;
        self.get_payload(url).await
    }

    async fn fetch_delta(
        &self,
        stream: StreamKind,
        symbol: &str,
        since_ms: i64,
    ) -> Result<FeedPayload, FeedError> {
        let url = self.delta_url(stream, symbol, since_ms)?;
        self.get_payload(url).await
    }
}
