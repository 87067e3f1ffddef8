//! HTTP client for the Context7 documentation API

use async_trait::async_trait;
use docbridge_config::DocsConfig;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use super::{DocsError, DocsQuery, DocsResult, DocsSource, SearchResponse};

/// Bodies the service sends instead of a non-2xx status when it has nothing
const EMPTY_BODIES: [&str; 2] = ["No content available", "No context data available"];

const SOURCE_HEADER: &str = "X-Context7-Source";

/// [`DocsSource`] backed by the Context7 HTTP API
#[derive(Debug, Clone)]
pub struct Context7Client {
    http: Client,
    base_url: Url,
    source: String,
}

impl Context7Client {
    pub fn new(config: &DocsConfig) -> DocsResult<Self> {
        // Url::join drops the last path segment unless the base ends in '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| DocsError::InvalidUrl(format!("{}: {}", base, e)))?;

        debug!(
            "Creating docs client for {} with {}s timeout",
            base_url,
            config.timeout.as_secs()
        );
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("docbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DocsError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            source: config.source_header.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn search_url(&self, query: &str) -> DocsResult<Url> {
        let mut url = self.endpoint("v1/search")?;
        url.query_pairs_mut().append_pair("query", query);
        Ok(url)
    }

    pub(crate) fn documentation_url(&self, library_id: &str, query: &DocsQuery) -> DocsResult<Url> {
        let library_id = library_id.trim_start_matches('/');
        let mut url = self.endpoint(&format!("v1/{}", library_id))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("tokens", &query.tokens.to_string());
            if !query.topic.is_empty() {
                pairs.append_pair("topic", &query.topic);
            }
            if !query.folders.is_empty() {
                pairs.append_pair("folders", &query.folders);
            }
            pairs.append_pair("type", "txt");
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> DocsResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DocsError::InvalidUrl(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl DocsSource for Context7Client {
    async fn search(&self, query: &str) -> DocsResult<Option<SearchResponse>> {
        let url = self.search_url(query)?;
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            warn!("Library search failed with status {}", response.status());
            return Ok(None);
        }

        Ok(Some(response.json::<SearchResponse>().await?))
    }

    async fn fetch_documentation(
        &self,
        library_id: &str,
        query: &DocsQuery,
    ) -> DocsResult<Option<String>> {
        let url = self.documentation_url(library_id, query)?;
        let response = self
            .http
            .get(url)
            .header(SOURCE_HEADER, &self.source)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                library_id,
                "Documentation fetch failed with status {}",
                response.status()
            );
            return Ok(None);
        }

        let text = response.text().await?;
        if text.is_empty() || EMPTY_BODIES.contains(&text.as_str()) {
            debug!(library_id, "No documentation available");
            return Ok(None);
        }
        Ok(Some(text))
    }
}
