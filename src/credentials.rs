//! Credentials / 认证凭据
//!
//! Supplies the `Authorization` header value for every GCS request and
//! refreshes OAuth access tokens transparently when they expire.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::Path;
use std::sync::Arc;

use crate::error::{GcsError, Result};
use crate::http::{HttpRequest, HttpTransport, Method};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const AUTH_SCOPE_BASE: &str = "https://www.googleapis.com/auth/";

/// Refresh this long before the server-side expiry / 提前刷新的时间
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Source of the `Authorization` header / Authorization头提供者
pub trait Credentials: Send + Sync {
    /// Full header value, e.g. `Bearer ya29...` / 完整的头部值
    fn authorization(&self) -> Result<String>;
}

/// Access scope requested for the token / 令牌访问范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// Download objects and list bucket contents / 只读
    Reader,
    /// Create, overwrite and delete objects / 读写
    Writer,
    /// Full control including ACLs / 完全控制
    #[default]
    Owner,
    /// Any Google Cloud API / 云平台范围
    Cloud,
}

impl Scope {
    pub fn url(&self) -> String {
        let suffix = match self {
            Scope::Reader => "devstorage.read_only",
            Scope::Writer => "devstorage.read_write",
            Scope::Owner => "devstorage.full_control",
            Scope::Cloud => "cloud-platform",
        };
        format!("{}{}", AUTH_SCOPE_BASE, suffix)
    }
}

/// Fixed, externally managed access token / 外部提供的固定令牌
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Credentials for StaticToken {
    fn authorization(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.token))
    }
}

/// Token refresh response / 令牌刷新响应
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Token endpoint error / 令牌错误
#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    error_description: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Access token cache shared by the OAuth flows / 访问令牌缓存
#[derive(Default)]
struct TokenCache {
    token: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    fn get_or_refresh<F>(&self, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Result<(String, i64)>,
    {
        let mut token = self.token.lock();
        if let Some(ref t) = *token {
            if Utc::now() + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) < t.expires_at {
                return Ok(format!("Bearer {}", t.value));
            }
        }

        let (value, expires_in) = refresh()?;
        tracing::debug!("Access token refreshed, expires in {}s", expires_in);
        let header = format!("Bearer {}", value);
        *token = Some(CachedToken {
            value,
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        });
        Ok(header)
    }
}

fn form_encode(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// POST a token grant and parse the reply / 请求令牌端点
fn request_token(transport: &dyn HttpTransport, token_uri: &str, params: &[(&str, &str)]) -> Result<(String, i64)> {
    let request = HttpRequest::new(Method::Post, token_uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(form_encode(params));

    let response = transport.send(request)?;
    if (200..300).contains(&response.status) {
        let token: TokenResponse = response
            .json()
            .map_err(|e| GcsError::Credentials(format!("invalid token response: {}", e)))?;
        Ok((token.access_token, token.expires_in.unwrap_or(3600)))
    } else {
        let error: TokenError = response.json().unwrap_or_else(|_| TokenError {
            error: format!("HTTP {}", response.status),
            error_description: None,
        });
        Err(GcsError::Credentials(format!(
            "token refresh failed: {}",
            error.error_description.unwrap_or(error.error)
        )))
    }
}

/// OAuth2 refresh-token flow / OAuth refresh_token 授权
pub struct RefreshTokenCredentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token_uri: String,
    transport: Arc<dyn HttpTransport>,
    cache: TokenCache,
}

impl RefreshTokenCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            transport,
            cache: TokenCache::default(),
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }
}

impl Credentials for RefreshTokenCredentials {
    fn authorization(&self) -> Result<String> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(GcsError::Credentials("client_id or client_secret not configured".into()));
        }
        self.cache.get_or_refresh(|| {
            request_token(
                self.transport.as_ref(),
                &self.token_uri,
                &[
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                    ("refresh_token", self.refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ],
            )
        })
    }
}

/// Service account JSON key file / 服务账号密钥文件
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Service account flow: signed JWT assertion / 服务账号JWT授权
pub struct ServiceAccountCredentials {
    key: ServiceAccountKey,
    signing_key: SigningKey<Sha256>,
    scope: Scope,
    transport: Arc<dyn HttpTransport>,
    cache: TokenCache,
}

impl ServiceAccountCredentials {
    /// Load credentials from a JSON key file / 从JSON密钥文件加载
    pub fn from_file(path: impl AsRef<Path>, scope: Scope, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GcsError::Credentials(format!("could not read data from private key file {:?}: {}", path, e))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&content)
            .map_err(|e| GcsError::Credentials(format!("private key file {:?} is not a JSON key: {}", path, e)))?;
        Self::from_key(key, scope, transport)
    }

    pub fn from_key(key: ServiceAccountKey, scope: Scope, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(&key.private_key)
            .map_err(|e| GcsError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            key,
            signing_key: SigningKey::<Sha256>::new(private_key),
            scope,
            transport,
            cache: TokenCache::default(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Build the RS256 JWT assertion / 生成RS256签名的JWT
    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let scope = self.scope.url();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: &scope,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);

        let signing_input = format!("{}.{}", header, claims);
        let signature = self.signing_key.sign(signing_input.as_bytes());
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }
}

impl Credentials for ServiceAccountCredentials {
    fn authorization(&self) -> Result<String> {
        self.cache.get_or_refresh(|| {
            let assertion = self.assertion(Utc::now())?;
            request_token(
                self.transport.as_ref(),
                &self.key.token_uri,
                &[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())],
            )
        })
    }
}
