use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret string (vault password, master password). Never printed, wiped on drop.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    TransportUnavailable,
    InvalidInput,
    InvalidRequest,
    Rejected,
    RetrievalFailed,
    Internal,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: Secret,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

const ACTIONS: &[&str] = &[
    "checkStatus",
    "unlock",
    "lock",
    "searchEntries",
    "getCredentials",
    "getConfig",
    "setDbPath",
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    CheckStatus,
    Unlock {
        #[serde(rename = "dbPath", default, skip_serializing_if = "Option::is_none")]
        db_path: Option<String>,
        #[serde(default)]
        password: Secret,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyfile: Option<String>,
    },
    Lock,
    SearchEntries {
        url: String,
    },
    GetCredentials {
        uuid: String,
    },
    GetConfig,
    SetDbPath {
        #[serde(rename = "dbPath")]
        db_path: String,
    },
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::CheckStatus => "checkStatus",
            Request::Unlock { .. } => "unlock",
            Request::Lock => "lock",
            Request::SearchEntries { .. } => "searchEntries",
            Request::GetCredentials { .. } => "getCredentials",
            Request::GetConfig => "getConfig",
            Request::SetDbPath { .. } => "setDbPath",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid message")]
    Malformed,
    #[error("Invalid message")]
    MissingAction,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid fields for action {0}")]
    BadFields(String),
}

/// Validates an untyped message from an arbitrary sender.
pub fn parse_request(raw: &str) -> Result<Request, RequestError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| RequestError::Malformed)?;
    parse_request_value(value)
}

pub fn parse_request_value(value: Value) -> Result<Request, RequestError> {
    let Some(obj) = value.as_object() else {
        return Err(RequestError::Malformed);
    };
    let Some(action) = obj.get("action").and_then(Value::as_str) else {
        return Err(RequestError::MissingAction);
    };
    if !ACTIONS.contains(&action) {
        return Err(RequestError::UnknownAction(action.to_string()));
    }
    let action = action.to_string();
    // serde's message can echo field values, so only the action name is kept.
    serde_json::from_value(value).map_err(|_| RequestError::BadFields(action))
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub is_unlocked: bool,
    pub backend_reachable: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AckReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl AckReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            code: None,
        }
    }

    pub fn failure(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code: Some(code),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntriesReply {
    pub success: bool,
    #[serde(default)]
    pub entries: Vec<CredentialEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl EntriesReply {
    pub fn found(entries: Vec<CredentialEntry>) -> Self {
        Self {
            success: true,
            entries,
            error: None,
            code: None,
        }
    }

    pub fn failure(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            entries: Vec::new(),
            error: Some(error.into()),
            code: Some(code),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialsReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl CredentialsReply {
    pub fn found(credential: Credential) -> Self {
        Self {
            success: true,
            username: Some(credential.username),
            password: Some(credential.password),
            error: None,
            code: None,
        }
    }

    pub fn failure(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            username: None,
            password: None,
            error: Some(error.into()),
            code: Some(code),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigReply {
    #[serde(rename = "dbPath", default)]
    pub db_path: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Status(StatusReply),
    Ack(AckReply),
    Entries(EntriesReply),
    Credentials(CredentialsReply),
    Config(ConfigReply),
}

const UNEXPECTED: &str = "unexpected response";

impl Response {
    pub fn invalid_request(err: &RequestError) -> Self {
        Response::Ack(AckReply::failure(ErrorCode::InvalidRequest, err.to_string()))
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Status(s) => s.backend_reachable,
            Response::Ack(a) => a.success,
            Response::Entries(e) => e.success,
            Response::Credentials(c) => c.success,
            Response::Config(_) => true,
        }
    }

    pub fn into_status(self) -> StatusReply {
        match self {
            Response::Status(s) => s,
            _ => StatusReply::default(),
        }
    }

    pub fn into_ack(self) -> AckReply {
        match self {
            Response::Ack(a) => a,
            _ => AckReply::failure(ErrorCode::Internal, UNEXPECTED),
        }
    }

    pub fn into_entries(self) -> EntriesReply {
        match self {
            Response::Entries(e) => e,
            Response::Ack(a) => EntriesReply {
                success: false,
                entries: Vec::new(),
                error: a.error,
                code: a.code,
            },
            _ => EntriesReply::failure(ErrorCode::Internal, UNEXPECTED),
        }
    }

    pub fn into_credentials(self) -> CredentialsReply {
        match self {
            Response::Credentials(c) => c,
            Response::Ack(a) => CredentialsReply {
                success: false,
                username: None,
                password: None,
                error: a.error,
                code: a.code,
            },
            _ => CredentialsReply::failure(ErrorCode::Internal, UNEXPECTED),
        }
    }

    pub fn into_config(self) -> ConfigReply {
        match self {
            Response::Config(c) => c,
            _ => ConfigReply::default(),
        }
    }
}

/// Fire-and-forget state change pushed to every tab.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    DatabaseUnlocked,
    DatabaseLocked,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("state controller unavailable")]
    Disconnected,
    #[error("state controller dropped the request")]
    NoReply,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn request(&self, request: Request) -> Result<Response, BusError>;
}

#[async_trait]
impl<T: MessageBus + ?Sized> MessageBus for Arc<T> {
    async fn request(&self, request: Request) -> Result<Response, BusError> {
        (**self).request(request).await
    }
}
