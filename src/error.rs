use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`ClientError`], for callers that only need to
/// branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Authentication,
    Authorization,
    Validation,
    InvalidOtp,
    NotAuthenticated,
    Api,
    Decode,
    Storage,
    Config,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {}", .detail.as_deref().unwrap_or("invalid credentials"))]
    Authentication { detail: Option<String> },

    #[error("Authorization failed: {}", .detail.as_deref().unwrap_or("token rejected"))]
    Authorization { detail: Option<String> },

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Invalid OTP: {}", .detail.as_deref().unwrap_or("code mismatch or expired"))]
    InvalidOtp { detail: Option<String> },

    #[error("Not authenticated: no access token present")]
    NotAuthenticated,

    #[error("API error ({status}): {}", .detail.as_deref().unwrap_or("unexpected response"))]
    Api { status: u16, detail: Option<String> },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Builds the tagged error for a non-success backend response.
    ///
    /// This is the only place a backend error body is inspected. `401` maps to
    /// [`ClientError::Authorization`], `400` to [`ClientError::Validation`]
    /// with the field map, anything else to [`ClientError::Api`].
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ClientError::Authorization {
                detail: FieldErrors::from_body(body).detail,
            },
            StatusCode::BAD_REQUEST => ClientError::Validation(FieldErrors::from_body(body)),
            status => {
                let errors = FieldErrors::from_body(body);
                let detail = errors
                    .first_message()
                    .map(str::to_string)
                    .or_else(|| plain_text(body));
                ClientError::Api {
                    status: status.as_u16(),
                    detail,
                }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::Authentication { .. } => ErrorKind::Authentication,
            ClientError::Authorization { .. } => ErrorKind::Authorization,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::InvalidOtp { .. } => ErrorKind::InvalidOtp,
            ClientError::NotAuthenticated => ErrorKind::NotAuthenticated,
            ClientError::Api { .. } => ErrorKind::Api,
            ClientError::Decode(_) => ErrorKind::Decode,
            ClientError::Storage(_) => ErrorKind::Storage,
            ClientError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for the one failure the gateway recovers from.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, ClientError::Authorization { .. })
    }

    /// Field-level messages, when the backend rejected the input.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// The most specific message available for showing to a user.
    pub fn user_message(&self) -> String {
        let specific = match self {
            ClientError::Authentication { detail }
            | ClientError::Authorization { detail }
            | ClientError::InvalidOtp { detail }
            | ClientError::Api { detail, .. } => detail.clone(),
            ClientError::Validation(errors) => errors.first_message().map(str::to_string),
            _ => None,
        };
        specific.unwrap_or_else(|| self.to_string())
    }

    /// Re-tags a token-endpoint rejection as bad credentials.
    pub(crate) fn into_authentication(self) -> Self {
        match self {
            ClientError::Authorization { detail } => ClientError::Authentication { detail },
            other => other,
        }
    }

    /// Re-tags a verify-endpoint rejection as an OTP failure.
    pub(crate) fn into_invalid_otp(self) -> Self {
        match self {
            ClientError::Validation(errors) => ClientError::InvalidOtp {
                detail: errors.first_message().map(str::to_string),
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        ClientError::Config(err.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::Config(format!("invalid URL: {}", err))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

/// Field name to messages, as returned by the backend on rejected input.
///
/// `detail` and `error` keys are kept apart from the per-field map;
/// `non_field_errors` stays in the map under its own name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub detail: Option<String>,
    pub fields: BTreeMap<String, Vec<String>>,
}

const NON_FIELD_ERRORS: &str = "non_field_errors";

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => {
                let mut errors = FieldErrors::new();
                for (key, value) in map {
                    if key == "detail" || key == "error" {
                        if errors.detail.is_none() {
                            errors.detail = messages_of(&value).into_iter().next();
                        }
                        continue;
                    }
                    let messages = messages_of(&value);
                    if !messages.is_empty() {
                        errors.fields.insert(key, messages);
                    }
                }
                errors
            }
            Ok(Value::Array(items)) => {
                let messages: Vec<String> = items.iter().flat_map(messages_of).collect();
                let mut errors = FieldErrors::new();
                if !messages.is_empty() {
                    errors.fields.insert(NON_FIELD_ERRORS.to_string(), messages);
                }
                errors
            }
            Ok(Value::String(text)) => FieldErrors {
                detail: Some(text),
                fields: BTreeMap::new(),
            },
            _ => FieldErrors::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.detail.is_none() && self.fields.is_empty()
    }

    /// Detail, then the first non-field error, then the first field message.
    pub fn first_message(&self) -> Option<&str> {
        self.detail
            .as_deref()
            .or_else(|| {
                self.field(NON_FIELD_ERRORS)
                    .and_then(|m| m.first())
                    .map(String::as_str)
            })
            .or_else(|| {
                self.fields
                    .values()
                    .find_map(|m| m.first())
                    .map(String::as_str)
            })
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(detail) = &self.detail {
            parts.push(detail.clone());
        }
        for (field, messages) in &self.fields {
            parts.push(format!("{}: {}", field, messages.join(", ")));
        }
        if parts.is_empty() {
            write!(f, "request rejected")
        } else {
            write!(f, "{}", parts.join("; "))
        }
    }
}

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(messages_of).collect(),
        Value::Null => Vec::new(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| {
                messages_of(v)
                    .into_iter()
                    .map(move |m| format!("{}: {}", k, m))
            })
            .collect(),
        other => vec![other.to_string()],
    }
}

fn plain_text(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || text.starts_with('<') {
        None
    } else {
        Some(text.chars().take(200).collect())
    }
}
