//! GCS client / GCS客户端
//!
//! Bundles the transport, credentials, retry setting and endpoints shared by
//! every resource and transfer handle created from it.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ClientConfig, CredentialsConfig};
use crate::credentials::{Credentials, RefreshTokenCredentials, ServiceAccountCredentials, StaticToken};
use crate::error::{GcsError, HttpError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::resource::{Bucket, Object, Project};
use crate::retry::RetrySetting;
use crate::storage::{validate_chunk_size, DEFAULT_CHUNK_SIZE};
use crate::utils::quote;

pub const DEFAULT_API_ENDPOINT: &str = "https://www.googleapis.com/storage/v1";
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://www.googleapis.com/upload/storage/v1";

/// Base URLs of the JSON API / API基础地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api: String,
    pub upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: DEFAULT_API_ENDPOINT.to_string(),
            upload: DEFAULT_UPLOAD_ENDPOINT.to_string(),
        }
    }
}

/// Shared GCS client handle / 共享客户端句柄
#[derive(Clone)]
pub struct GcsClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Option<Arc<dyn Credentials>>,
    retry: RetrySetting,
    endpoints: Arc<Endpoints>,
    chunk_size: usize,
}

impl GcsClient {
    /// Client over the default reqwest transport / 使用默认reqwest传输创建客户端
    pub fn new(credentials: Option<Arc<dyn Credentials>>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(None, None)?);
        Ok(Self::with_transport(transport, credentials))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, credentials: Option<Arc<dyn Credentials>>) -> Self {
        Self {
            transport,
            credentials,
            retry: RetrySetting::Default,
            endpoints: Arc::new(Endpoints::default()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build everything from a configuration / 根据配置创建客户端
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let timeout = config.http.timeout_secs.map(Duration::from_secs);
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(timeout, config.http.proxy.as_deref())?);

        let credentials: Option<Arc<dyn Credentials>> = match &config.credentials {
            CredentialsConfig::None => None,
            CredentialsConfig::Token { token } => Some(Arc::new(StaticToken::new(token.clone()))),
            CredentialsConfig::ServiceAccount { key_file, scope } => Some(Arc::new(
                ServiceAccountCredentials::from_file(key_file, *scope, transport.clone())?,
            )),
            CredentialsConfig::RefreshToken {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => Some(Arc::new(
                RefreshTokenCredentials::new(client_id.clone(), client_secret.clone(), refresh_token.clone(), transport.clone())
                    .with_token_uri(token_uri.clone()),
            )),
        };

        let client = Self::with_transport(transport, credentials)
            .with_endpoints(Endpoints {
                api: config.endpoints.api.clone(),
                upload: config.endpoints.upload.clone(),
            })
            .with_chunk_size(config.chunk_size)?;

        tracing::debug!(
            "GCS client configured: api={}, chunk_size={}",
            client.endpoints.api,
            client.chunk_size
        );
        Ok(client)
    }

    pub fn with_retry(mut self, retry: impl Into<RetrySetting>) -> Self {
        self.retry = retry.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        self.chunk_size = validate_chunk_size(chunk_size)?;
        Ok(self)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Arc::new(endpoints);
        self
    }

    pub fn retry(&self) -> &RetrySetting {
        &self.retry
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// `Authorization` header value / 获取授权头
    pub fn authorization(&self) -> Result<String> {
        match &self.credentials {
            Some(credentials) => credentials.authorization(),
            None => Err(GcsError::Incomplete {
                operation: "GCS request",
                attribute: "credentials",
            }),
        }
    }

    /// Authorize and send; statuses are left to the caller / 发送请求（不检查状态码）
    pub fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = request.header("Authorization", self.authorization()?);
        self.transport.send(request)
    }

    /// Authorize, send and require one of `ok` / 发送请求并检查状态码
    pub fn execute(&self, request: HttpRequest, ok: &[u16]) -> Result<HttpResponse> {
        let response = self.send(request)?;
        if ok.contains(&response.status) {
            Ok(response)
        } else {
            Err(HttpError::new(response.status, response.text()).into())
        }
    }

    pub fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/b/{}", self.endpoints.api, quote(bucket))
    }

    pub fn object_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/b/{}/o/{}", self.endpoints.api, quote(bucket), quote(name))
    }

    /// Resumable upload initiation URL / 可恢复上传的初始化地址
    pub fn upload_url(&self, bucket: &str) -> String {
        format!("{}/b/{}/o", self.endpoints.upload, quote(bucket))
    }

    pub fn buckets_url(&self) -> String {
        format!("{}/b", self.endpoints.api)
    }

    pub fn project(&self, project_id: impl Into<String>) -> Project {
        Project::new(self.clone(), project_id)
    }

    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name)
    }

    pub fn object(&self, bucket: impl Into<String>, name: impl Into<String>) -> Object {
        Object::new(self.clone(), bucket, name)
    }
}

impl std::fmt::Debug for GcsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsClient")
            .field("endpoints", &self.endpoints)
            .field("retry", &self.retry)
            .field("chunk_size", &self.chunk_size)
            .field("has_credentials", &self.credentials.is_some())
            .finish()
    }
}
