use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::error::{Result, SessionError};

/// One outbound call, kept around so it can be replayed after a refresh.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub id: Uuid,
    pub method: Method,
    /// Path relative to the API base URL, or an absolute URL.
    pub target: String,
    pub body: Option<Value>,
    /// Query parameters, encoded by the transport.
    pub query: Vec<(String, String)>,
    retried: bool,
}

impl RequestEnvelope {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            target: target.into(),
            body: None,
            query: Vec::new(),
            retried: false,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn patch(target: impl Into<String>) -> Self {
        Self::new(Method::PATCH, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| SessionError::MalformedResponse(format!("unserializable body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Mark the envelope as already replayed once. A further authorization
    /// failure then ends the request instead of triggering another refresh.
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn retried(mut self) -> Self {
        self.mark_retried();
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// 401 and 403 both mean the token was not accepted.
    pub fn is_auth_failure(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED || self.status == StatusCode::FORBIDDEN
    }

    /// Turn any non-2xx answer into `RequestFailed`.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(SessionError::RequestFailed {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            SessionError::MalformedResponse(format!(
                "unexpected body for status {}: {}",
                self.status, e
            ))
        })
    }
}
