//! HTTP fetcher for the publisher's open-data directory listings.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use lexmirror_core::{Corpus, CorpusTable, Delivery, Freshness};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::io_at;
use crate::{FetchError, Fetcher, RemoteArchive};

/// Lists and downloads archives from each corpus's endpoint.
pub struct HttpFetcher {
    client: reqwest::Client,
    table: CorpusTable,
}

impl HttpFetcher {
    pub fn new(table: CorpusTable) -> Self {
        Self::with_client(reqwest::Client::new(), table)
    }

    pub fn with_client(client: reqwest::Client, table: CorpusTable) -> Self {
        Self { client, table }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn list(&self, corpus: Corpus) -> Result<Vec<RemoteArchive>, FetchError> {
        let config = self.table.get(corpus);
        let endpoint = &config.endpoint;
        info!(corpus = %corpus, url = %endpoint, "listing remote archives");
        let page = self
            .get(endpoint)
            .await?
            .text()
            .await
            .map_err(|e| classify(endpoint, e))?;

        let mut found: BTreeMap<Delivery, RemoteArchive> = BTreeMap::new();
        for href in extract_hrefs(&page) {
            let file_name = href.rsplit('/').next().unwrap_or(&href);
            let Some(delivery) = config.parse_remote(corpus, file_name) else {
                continue;
            };
            found.entry(delivery).or_insert_with(|| RemoteArchive {
                delivery,
                url: join_url(endpoint, file_name),
                file_name: file_name.to_string(),
            });
        }
        debug!(corpus = %corpus, archives = found.len(), "remote listing parsed");
        Ok(found.into_values().collect())
    }

    async fn fetch(
        &self,
        remote: &RemoteArchive,
        local: &Path,
        freshness: Freshness,
    ) -> Result<bool, FetchError> {
        if !freshness.needs_fetch(local, SystemTime::now()) {
            debug!(file = %local.display(), "cached archive is fresh");
            return Ok(false);
        }

        let mut resp = self.get(&remote.url).await?;
        // Write beside the target and rename, so the cache never holds a
        // truncated archive under its final name.
        let part = local.with_file_name(format!(
            "{}.part",
            local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        let mut file = tokio::fs::File::create(&part).await.map_err(io_at(&part))?;
        let mut bytes = 0u64;
        while let Some(chunk) = resp.chunk().await.map_err(|e| classify(&remote.url, e))? {
            file.write_all(&chunk).await.map_err(io_at(&part))?;
            bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(io_at(&part))?;
        file.sync_all().await.map_err(io_at(&part))?;
        drop(file);
        tokio::fs::rename(&part, local).await.map_err(io_at(local))?;

        info!(delivery = %remote.delivery, file = %remote.file_name, bytes, "archive downloaded");
        Ok(true)
    }
}

/// Connection and timeout failures mean the remote is unavailable; anything
/// else is a real error.
fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_connect() || e.is_timeout() {
        FetchError::Unavailable {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        FetchError::Http(e)
    }
}

fn join_url(endpoint: &str, file_name: &str) -> String {
    format!("{}/{file_name}", endpoint.trim_end_matches('/'))
}

/// Targets of every `href` attribute in an HTML page.
pub(crate) fn extract_hrefs(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut hrefs = Vec::new();
    let mut pos = 0;
    while let Some(found) = lower[pos..].find("href=") {
        let start = pos + found + "href=".len();
        let rest = &html[start..];
        let (value, consumed) = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &rest[1..];
                match body.find(q) {
                    Some(end) => (&body[..end], end + 2),
                    None => break,
                }
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                (&rest[..end], end)
            }
        };
        if !value.is_empty() {
            hrefs.push(value.to_string());
        }
        pos = start + consumed.max(1);
    }
    hrefs
}
