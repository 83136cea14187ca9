use crate::settings::Settings;
use async_trait::async_trait;
use keefill_protocol::{Credential, CredentialEntry, Secret};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("vault request failed: status={status} body={body}")]
    BadStatus { status: StatusCode, body: String },
    #[error("vault refused: {0}")]
    Rejected(String),
    #[error("vault response parse failed: {0}")]
    Parse(String),
    #[error("invalid vault url: {0}")]
    Url(#[from] url::ParseError),
}

impl VaultError {
    pub fn is_transport(&self) -> bool {
        matches!(self, VaultError::Transport(_))
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultStatus {
    pub locked: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VaultAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct UnlockRequest {
    #[serde(rename = "dbPath")]
    pub db_path: String,
    pub password: Secret,
    pub keyfile: Option<String>,
}

/// HTTP boundary to the locally running vault service.
#[async_trait]
pub trait VaultApi: Send + Sync {
    async fn status(&self) -> Result<VaultStatus, VaultError>;
    async fn unlock(&self, req: &UnlockRequest) -> Result<VaultAck, VaultError>;
    async fn lock(&self) -> Result<VaultAck, VaultError>;
    async fn search(&self, url: &str) -> Result<Vec<CredentialEntry>, VaultError>;
    async fn get_credentials(&self, uuid: &str) -> Result<Credential, VaultError>;
}

struct Endpoints {
    status: Url,
    unlock: Url,
    lock: Url,
    search: Url,
    get_credentials: Url,
}

impl Endpoints {
    fn new(base: &Url) -> Result<Self, url::ParseError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            status: base.join("status")?,
            unlock: base.join("unlock")?,
            lock: base.join("lock")?,
            search: base.join("search")?,
            get_credentials: base.join("get-credentials")?,
        })
    }
}

pub struct HttpVaultClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpVaultClient {
    pub fn new(settings: &Settings) -> Result<Self, VaultError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(settings.accept_invalid_certs);
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoints: Endpoints::new(&settings.vault_url)?,
        })
    }

    pub fn with_base_url(base: &str) -> Result<Self, VaultError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoints: Endpoints::new(&Url::parse(base)?)?,
        })
    }
}

#[derive(Serialize)]
struct SearchBody<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct UuidBody<'a> {
    uuid: &'a str,
}

#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    entries: Vec<CredentialEntry>,
}

#[derive(Deserialize)]
struct CredentialsBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<Secret>,
    #[serde(default)]
    error: Option<String>,
}

/// Reads the body and decodes it; non-2xx bodies still decode when the vault sent JSON.
async fn decode_any<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, VaultError> {
    let status = resp.status();
    let body = resp.text().await?;
    match serde_json::from_str::<T>(&body) {
        Ok(v) => Ok(v),
        Err(_) if !status.is_success() => Err(VaultError::BadStatus { status, body }),
        Err(e) => Err(VaultError::Parse(e.to_string())),
    }
}

async fn decode_ok<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, VaultError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(VaultError::BadStatus { status, body });
    }
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| VaultError::Parse(e.to_string()))
}

#[async_trait]
impl VaultApi for HttpVaultClient {
    async fn status(&self) -> Result<VaultStatus, VaultError> {
        let resp = self.http.get(self.endpoints.status.clone()).send().await?;
        decode_ok(resp).await
    }

    async fn unlock(&self, req: &UnlockRequest) -> Result<VaultAck, VaultError> {
        let resp = self
            .http
            .post(self.endpoints.unlock.clone())
            .json(req)
            .send()
            .await?;
        decode_any(resp).await
    }

    async fn lock(&self) -> Result<VaultAck, VaultError> {
        let resp = self
            .http
            .post(self.endpoints.lock.clone())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        decode_any(resp).await
    }

    async fn search(&self, url: &str) -> Result<Vec<CredentialEntry>, VaultError> {
        let resp = self
            .http
            .post(self.endpoints.search.clone())
            .json(&SearchBody { url })
            .send()
            .await?;
        let reply: SearchReply = decode_ok(resp).await?;
        Ok(reply.entries)
    }

    async fn get_credentials(&self, uuid: &str) -> Result<Credential, VaultError> {
        let resp = self
            .http
            .post(self.endpoints.get_credentials.clone())
            .json(&UuidBody { uuid })
            .send()
            .await?;
        let body: CredentialsBody = decode_ok(resp).await?;
        if !body.success {
            return Err(VaultError::Rejected(
                body.error.unwrap_or_else(|| "credentials unavailable".to_string()),
            ));
        }
        Ok(Credential {
            username: body.username.unwrap_or_default(),
            password: body.password.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path() {
        let e = Endpoints::new(&Url::parse("http://127.0.0.1:5000/api").unwrap()).unwrap();
        assert_eq!(e.status.as_str(), "http://127.0.0.1:5000/api/status");
        assert_eq!(
            e.get_credentials.as_str(),
            "http://127.0.0.1:5000/api/get-credentials"
        );

        let e = Endpoints::new(&Url::parse("https://localhost:5000").unwrap()).unwrap();
        assert_eq!(e.unlock.as_str(), "https://localhost:5000/unlock");
    }

    #[test]
    fn unlock_body_sends_null_keyfile() {
        let req = UnlockRequest {
            db_path: "/vault.kdbx".to_string(),
            password: Secret::new("correct"),
            keyfile: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"dbPath": "/vault.kdbx", "password": "correct", "keyfile": null})
        );
    }
}
