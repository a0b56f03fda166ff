use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::de::DeserializeOwned;

use super::models::{
    Envelope, Library, Metadata, MetadataList, SectionList, ServerIdentity, Setting, SettingList,
};
use super::MediaServer;
use crate::error::PlexError;

const TOKEN_HEADER: &str = "X-Plex-Token";

/// Thin HTTP client for the few Plex endpoints the audit reads.
#[derive(Debug, Clone)]
pub struct PlexClient {
    http: reqwest::Client,
    base: Url,
}

impl PlexClient {
    /// Build a client without touching the network.
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, PlexError> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|_| PlexError::InvalidUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(PlexError::InvalidUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut token_value = HeaderValue::from_str(token)
            .map_err(|_| PlexError::Parse("token contains invalid header characters".to_string()))?;
        token_value.set_sensitive(true);
        headers.insert(TOKEN_HEADER, token_value);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base })
    }

    /// Build a client and verify the server answers with its identity.
    pub async fn connect(
        base_url: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<(Self, ServerIdentity), PlexError> {
        let client = Self::new(base_url, token, timeout)?;
        let identity: ServerIdentity = client.get("/", &[]).await?;
        Ok((client, identity))
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, PlexError> {
        // Concatenate rather than join so a reverse-proxy path prefix survives.
        let raw = format!("{}{}", self.base.as_str().trim_end_matches('/'), path);
        let mut url = Url::parse(&raw).map_err(|_| PlexError::InvalidUrl(raw.clone()))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlexError> {
        let url = self.url(path, query)?;
        debug!("GET {}", url.path());
        let resp = check_response(self.http.get(url).send().await?).await?;
        let body = resp.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| PlexError::Parse(format!("{}: {}", path, e)))?;
        Ok(envelope.media_container)
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn libraries(&self) -> Result<Vec<Library>, PlexError> {
        let list: SectionList = self.get("/library/sections", &[]).await?;
        Ok(list.directories)
    }

    async fn library_settings(&self, library: &Library) -> Result<Vec<Setting>, PlexError> {
        let path = format!("/library/sections/{}/prefs", library.key);
        let list: SettingList = self.get(&path, &[]).await?;
        Ok(list.settings)
    }

    async fn library_items(&self, library: &Library) -> Result<Vec<Metadata>, PlexError> {
        let path = format!("/library/sections/{}/all", library.key);
        let list: MetadataList = self.get(&path, &[]).await?;
        Ok(list.metadata)
    }

    async fn episodes(&self, show: &Metadata) -> Result<Vec<Metadata>, PlexError> {
        let path = format!("/library/metadata/{}/allLeaves", show.rating_key);
        let list: MetadataList = self.get(&path, &[]).await?;
        Ok(list.metadata)
    }

    async fn album_children(&self, album: &Metadata) -> Result<Vec<Metadata>, PlexError> {
        let path = format!("/library/metadata/{}/children", album.rating_key);
        let list: MetadataList = self.get(&path, &[]).await?;
        Ok(list.metadata)
    }

    async fn item_details(&self, item: &Metadata) -> Result<Metadata, PlexError> {
        let path = format!("/library/metadata/{}", item.rating_key);
        let list: MetadataList = self.get(&path, &[("includeMarkers", "1")]).await?;
        list.metadata
            .into_iter()
            .next()
            .ok_or_else(|| PlexError::Parse(format!("{}: empty metadata response", path)))
    }
}

/// Map non-success statuses to [`PlexError::Api`].
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, PlexError> {
    if !resp.status().is_success() {
        return Err(PlexError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}
