//! Thin JSON client over the REST content API.

use std::time::Instant;

use metrics::counter;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};
use url::Url;

use crate::application::repos::SourceError;
use crate::config::RemoteSettings;
use crate::infra::error::InfraError;

const USER_AGENT: &str = concat!("inkpost/", env!("CARGO_PKG_VERSION"));
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

pub(super) type Query<'a> = [(&'a str, String)];

#[derive(Clone)]
pub(super) struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(settings: &RemoteSettings) -> Result<Self, InfraError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| InfraError::configuration(format!("http client: {err}")))?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            token: settings.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET` a resource that must exist.
    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &Query<'_>,
    ) -> Result<T, SourceError> {
        let request = self.request(Method::GET, segments, query)?;
        self.send(request).await?.ok_or_else(|| {
            SourceError::rejected(StatusCode::NOT_FOUND.as_u16(), "resource not found")
        })
    }

    /// `GET` a resource, mapping 404 to `None`.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &Query<'_>,
    ) -> Result<Option<T>, SourceError> {
        let request = self.request(Method::GET, segments, query)?;
        self.send(request).await
    }

    /// `POST` a JSON body, authenticated with the bearer token when configured.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, SourceError> {
        let mut request = self.request(Method::POST, segments, &[])?.json(body);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }
        self.send(request).await?.ok_or_else(|| {
            SourceError::rejected(StatusCode::NOT_FOUND.as_u16(), "endpoint not found")
        })
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &Query<'_>,
    ) -> Result<RequestBuilder, SourceError> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            url.set_query(None);
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(self.http.request(method, url))
    }

    /// Join path segments onto the base URL, percent-encoding each and keeping
    /// the trailing slash the API expects.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SourceError::unexpected("API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, SourceError> {
        let (client, request) = request.build_split();
        let request = request.map_err(|err| SourceError::unexpected(err.to_string()))?;
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();

        let response = client.execute(request).await.map_err(|err| {
            counter!("inkpost_remote_request_total", "method" => method.to_string(), "status" => "error")
                .increment(1);
            warn!(method = %method, url = %url, error = %err, "content API unreachable");
            SourceError::transport(err.to_string())
        })?;

        let status = response.status();
        counter!(
            "inkpost_remote_request_total",
            "method" => method.to_string(),
            "status" => status.as_u16().to_string()
        )
        .increment(1);
        debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis(),
            "content API responded"
        );

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| SourceError::transport(err.to_string()))?;

        if !status.is_success() {
            let preview: String = String::from_utf8_lossy(&body)
                .chars()
                .take(ERROR_BODY_PREVIEW_CHARS)
                .collect();
            return Err(SourceError::rejected(status.as_u16(), preview));
        }

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| SourceError::decode(format!("{url}: {err}")))
    }
}
