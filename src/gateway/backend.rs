use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::Result;

/// One backend call, independent of any credential.
///
/// Kept as plain data so the gateway can replay it after a token refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        Ok(self.body(serde_json::to_value(body)?))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::Decode(format!("unexpected response body ({}): {}", self.status, e))
        })
    }

    /// Like [`ApiResponse::json`], but an empty body (e.g. `204`) yields the default.
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.is_empty() {
            Ok(T::default())
        } else {
            self.json()
        }
    }
}

/// HTTP transport to the NGOConnect backend.
///
/// Sends exactly one request per call and turns every non-success response
/// into a tagged [`ClientError`]. It never retries and holds no credentials.
#[derive(Debug, Clone)]
pub struct Backend {
    client: Client,
    base_url: Url,
}

impl Backend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!("{} cannot be used as a base URL", base_url)));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `path` to the base URL, keeping any path prefix the base has.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    pub async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        let url = self.endpoint(&request.path)?;
        let mut builder = self.client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, authenticated = bearer.is_some(), "Sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .to_vec();

        if status.is_success() {
            Ok(ApiResponse { status, body })
        } else {
            debug!(method = %request.method, path = %request.path, status = status.as_u16(), "Request rejected");
            Err(ClientError::from_response(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_joining() {
        let backend = Backend::new("http://localhost:8000").unwrap();
        assert_eq!(
            backend.endpoint("/api/user/token/").unwrap().as_str(),
            "http://localhost:8000/api/user/token/"
        );

        let prefixed = Backend::new("https://example.org/ngo/").unwrap();
        assert_eq!(
            prefixed.endpoint("/api/projects/campaigns/").unwrap().as_str(),
            "https://example.org/ngo/api/projects/campaigns/"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = Backend::new("not a url").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);

        let err = Backend::new("mailto:team@ngoconnect.org").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/api/projects/campaigns/").query("status", "ACTIVE");
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.query, vec![("status".to_string(), "ACTIVE".to_string())]);

        let request = ApiRequest::post("/api/user/token/")
            .json(&json!({"email": "a@b.com"}))
            .unwrap();
        assert_eq!(request.body, Some(json!({"email": "a@b.com"})));
    }

    #[test]
    fn test_empty_response_body() {
        let response = ApiResponse {
            status: StatusCode::NO_CONTENT,
            body: Vec::new(),
        };
        assert!(response.is_empty());
        let value: Option<String> = response.json_or_default().unwrap();
        assert_eq!(value, None);
        assert!(response.json::<Value>().is_err());
    }
}
