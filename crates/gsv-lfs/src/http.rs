//! reqwest-based [`LfsClient`].
//!
//! API calls (batch, locks) go to the configured base URL with the
//! principal's credentials. Transfer calls go to the hrefs handed out in
//! batch responses and carry only the headers attached to those links.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use gsv_store::ObjectStream;
use gsv_types::Principal;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::config::{AuthMethod, LfsConfig};
use crate::endpoint::{endpoints, join, LFS_MEDIA_TYPE};
use crate::error::{LfsError, LfsResult};
use crate::spill::SpillBuffer;
use crate::transport::{ClientFactory, LfsClient, StreamProvider};
use crate::types::{
    BatchReq, BatchRes, CreateLockReq, DeleteLockReq, Link, Links, Lock, LockConflictRes,
    LockRes, LocksRes, Meta, ObjectRes, Ref, VerifyLocksReq, VerifyLocksRes,
};

/// HTTP client for one principal.
pub struct HttpLfsClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthMethod,
    spill_threshold: usize,
}

impl HttpLfsClient {
    pub fn new(config: &LfsConfig, auth: AuthMethod) -> LfsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| LfsError::Http {
                endpoint: config.url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth,
            spill_threshold: config.spill_threshold,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = join(&self.base_url, path);
        let req = self
            .http
            .request(method, &url)
            .header(ACCEPT, LFS_MEDIA_TYPE);
        let req = match &self.auth {
            AuthMethod::Anonymous => req,
            AuthMethod::Bearer(token) => req.bearer_auth(token),
            AuthMethod::Basic { username, password } => req.basic_auth(username, Some(password)),
        };
        (url, req)
    }

    fn transfer(&self, method: Method, link: &Link) -> RequestBuilder {
        link.header
            .iter()
            .fold(self.http.request(method, &link.href), |req, (name, value)| {
                req.header(name.as_str(), value.as_str())
            })
    }

    async fn send(&self, req: RequestBuilder, endpoint: &str) -> LfsResult<Response> {
        let resp = req.send().await.map_err(|source| LfsError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;
        debug!(endpoint, status = resp.status().as_u16(), "LFS response");
        Ok(resp)
    }
}

impl fmt::Debug for HttpLfsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLfsClient")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.display_name())
            .finish()
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response, endpoint: &str) -> LfsResult<T> {
    let body = resp.bytes().await.map_err(|source| LfsError::Http {
        endpoint: endpoint.to_string(),
        source,
    })?;
    serde_json::from_slice(&body).map_err(|e| LfsError::Deserialization {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

async fn api_error(resp: Response, endpoint: &str) -> LfsError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    LfsError::Api {
        endpoint: endpoint.to_string(),
        status,
        body,
    }
}

#[async_trait]
impl LfsClient for HttpLfsClient {
    async fn get_meta(&self, hash: &str) -> LfsResult<Option<ObjectRes>> {
        let (url, req) = self.api(Method::GET, &format!("{}/{hash}", endpoints::OBJECTS));
        let resp = self.send(req, &url).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => read_json(resp, &url).await.map(Some),
            _ => Err(api_error(resp, &url).await),
        }
    }

    async fn post_batch(&self, batch: &BatchReq) -> LfsResult<BatchRes> {
        let (url, req) = self.api(Method::POST, endpoints::BATCH);
        let req = req.header(CONTENT_TYPE, LFS_MEDIA_TYPE).json(batch);
        let resp = self.send(req, &url).await?;
        if !resp.status().is_success() {
            return Err(api_error(resp, &url).await);
        }
        read_json(resp, &url).await
    }

    async fn put_object(
        &self,
        provider: &dyn StreamProvider,
        meta: &Meta,
        links: &Links,
    ) -> LfsResult<bool> {
        let Some(upload) = links.upload() else {
            debug!(oid = %meta.oid, "server already has object; skipping upload");
            return Ok(false);
        };

        let stream = provider.open_stream().await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(stream));
        let req = self
            .transfer(Method::PUT, upload)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, meta.size)
            .body(body);
        let resp = self.send(req, &upload.href).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LfsError::UploadRejected {
                oid: meta.oid.clone(),
                reason: format!("upload returned {status}: {body}"),
            });
        }

        if let Some(verify) = links.verify() {
            let req = self
                .transfer(Method::POST, verify)
                .header(ACCEPT, LFS_MEDIA_TYPE)
                .header(CONTENT_TYPE, LFS_MEDIA_TYPE)
                .json(meta);
            let resp = self.send(req, &verify.href).await?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(LfsError::UploadRejected {
                    oid: meta.oid.clone(),
                    reason: format!("verify returned {status}: {body}"),
                });
            }
        }
        Ok(true)
    }

    async fn get_object(&self, links: &Links) -> LfsResult<ObjectStream> {
        let download = links
            .download()
            .ok_or(LfsError::MissingLink(Links::DOWNLOAD))?;
        let mut resp = self
            .send(self.transfer(Method::GET, download), &download.href)
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp, &download.href).await);
        }

        let mut buffer = SpillBuffer::new(self.spill_threshold);
        while let Some(chunk) = resp.chunk().await.map_err(|source| LfsError::Http {
            endpoint: download.href.clone(),
            source,
        })? {
            buffer.write(&chunk).await?;
        }
        Ok(buffer.finish().await?.into_stream().await?)
    }

    async fn lock(&self, path: &str, reference: Option<&Ref>) -> LfsResult<Lock> {
        let (url, req) = self.api(Method::POST, endpoints::LOCKS);
        let body = CreateLockReq {
            path: path.to_string(),
            reference: reference.cloned(),
        };
        let resp = self
            .send(req.header(CONTENT_TYPE, LFS_MEDIA_TYPE).json(&body), &url)
            .await?;
        match resp.status() {
            StatusCode::CONFLICT => {
                let conflict: LockConflictRes = read_json(resp, &url).await?;
                Err(LfsError::LockConflict {
                    lock: conflict.lock,
                    message: conflict.message,
                })
            }
            s if s.is_success() => Ok(read_json::<LockRes>(resp, &url).await?.lock),
            _ => Err(api_error(resp, &url).await),
        }
    }

    async fn unlock(
        &self,
        id: &str,
        force: bool,
        reference: Option<&Ref>,
    ) -> LfsResult<Option<Lock>> {
        let (url, req) = self.api(Method::POST, &endpoints::unlock(id));
        let body = DeleteLockReq {
            force,
            reference: reference.cloned(),
        };
        let resp = self
            .send(req.header(CONTENT_TYPE, LFS_MEDIA_TYPE).json(&body), &url)
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(read_json::<LockRes>(resp, &url).await?.lock)),
            _ => Err(api_error(resp, &url).await),
        }
    }

    async fn list_locks(
        &self,
        path: Option<&str>,
        id: Option<&str>,
        reference: Option<&Ref>,
    ) -> LfsResult<Vec<Lock>> {
        let mut locks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(path) = path {
                query.push(("path", path));
            }
            if let Some(id) = id {
                query.push(("id", id));
            }
            if let Some(reference) = reference {
                query.push(("refspec", reference.name.as_str()));
            }
            if let Some(cursor) = cursor.as_deref() {
                query.push(("cursor", cursor));
            }

            let (url, req) = self.api(Method::GET, endpoints::LOCKS);
            let resp = self.send(req.query(&query), &url).await?;
            if !resp.status().is_success() {
                return Err(api_error(resp, &url).await);
            }
            let page: LocksRes = read_json(resp, &url).await?;
            locks.extend(page.locks);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(locks),
            }
        }
    }

    async fn verify_locks(&self, reference: Option<&Ref>) -> LfsResult<VerifyLocksRes> {
        let mut result = VerifyLocksRes::default();
        let mut body = VerifyLocksReq {
            reference: reference.cloned(),
            cursor: None,
        };
        loop {
            let (url, req) = self.api(Method::POST, endpoints::LOCKS_VERIFY);
            let resp = self
                .send(req.header(CONTENT_TYPE, LFS_MEDIA_TYPE).json(&body), &url)
                .await?;
            if !resp.status().is_success() {
                return Err(api_error(resp, &url).await);
            }
            let page: VerifyLocksRes = read_json(resp, &url).await?;
            result.ours.extend(page.ours);
            result.theirs.extend(page.theirs);
            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => body.cursor = Some(next),
                None => return Ok(result),
            }
        }
    }
}

/// Builds one [`HttpLfsClient`] per principal and keeps it for reuse.
pub struct HttpClientFactory {
    config: LfsConfig,
    clients: RwLock<HashMap<Principal, Arc<HttpLfsClient>>>,
}

impl HttpClientFactory {
    pub fn new(config: LfsConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LfsConfig {
        &self.config
    }

    /// Number of cached clients.
    pub fn cached(&self) -> usize {
        self.clients.read().expect("lock poisoned").len()
    }
}

impl ClientFactory for HttpClientFactory {
    fn client(&self, principal: &Principal) -> LfsResult<Arc<dyn LfsClient>> {
        if let Some(client) = self.clients.read().expect("lock poisoned").get(principal) {
            return Ok(client.clone());
        }

        let auth = self.config.credentials_for(principal).clone();
        if principal.is_anonymous() || auth.is_authenticated() {
            debug!(principal = %principal, auth = auth.display_name(), "creating LFS client");
        } else {
            warn!(principal = %principal, "no LFS credentials configured; using anonymous access");
        }
        let client = Arc::new(HttpLfsClient::new(&self.config, auth)?);
        let client = self
            .clients
            .write()
            .expect("lock poisoned")
            .entry(principal.clone())
            .or_insert(client)
            .clone();
        Ok(client)
    }

    fn invalidate(&self, principal: &Principal) {
        if self
            .clients
            .write()
            .expect("lock poisoned")
            .remove(principal)
            .is_some()
        {
            debug!(principal = %principal, "dropped cached LFS client");
        }
    }
}
